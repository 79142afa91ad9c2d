#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use tokio::time::Instant;
use uuid::Uuid;

use product_events::domain::ProductCreatedEvent;
use product_events::infrastructure::codec;
use product_events::infrastructure::{
    BrokerError, DeadLetterMessage, DeadLetterQueue, DownstreamError, DownstreamService,
    EventPublisher, InsertOutcome, LedgerError, ProcessedEventStore, ProductEventProcessor,
    PublishAck, RetryConfig, RetryController,
};
use product_events::infrastructure::pipeline::Delivery;

pub const DLT_TOPIC: &str = "product-created-events-topic.DLT";

/// Ledger fake backed by a map, with switches for storage failures and for
/// simulating a lost insert race.
pub struct InMemoryLedger {
    records: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
    insert_failures_remaining: AtomicU32,
    exists_failures_remaining: AtomicU32,
    conflict_on_insert: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            insert_failures_remaining: AtomicU32::new(0),
            exists_failures_remaining: AtomicU32::new(0),
            conflict_on_insert: AtomicBool::new(false),
        }
    }

    pub fn fail_next_inserts(&self, count: u32) {
        self.insert_failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_exists(&self, count: u32) {
        self.exists_failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Makes the next insert report a uniqueness conflict even though the
    /// pre-check saw no record, as a concurrent attempt would cause.
    pub fn simulate_insert_race(&self) {
        self.conflict_on_insert.store(true, Ordering::SeqCst);
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.records.lock().unwrap().contains_key(message_id)
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryLedger {
    async fn exists(&self, message_id: &str) -> Result<bool, LedgerError> {
        if self.exists_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.exists_failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(LedgerError::Storage("backend unavailable".to_string()));
        }
        Ok(self.records.lock().unwrap().contains_key(message_id))
    }

    async fn insert_if_absent(
        &self,
        message_id: &str,
        message_key: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<InsertOutcome, LedgerError> {
        if self.insert_failures_remaining.load(Ordering::SeqCst) > 0 {
            self.insert_failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(LedgerError::Storage("backend unavailable".to_string()));
        }
        if self.conflict_on_insert.swap(false, Ordering::SeqCst) {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let mut records = self.records.lock().unwrap();
        if records.contains_key(message_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        records.insert(
            message_id.to_string(),
            (message_key.to_string(), processed_at),
        );
        Ok(InsertOutcome::Inserted)
    }
}

/// Downstream fake that records when each invocation happened and replays a
/// scripted result sequence, defaulting to success once the script runs out.
pub struct ScriptedDownstream {
    invocations: Mutex<Vec<(Instant, Uuid)>>,
    script: Mutex<VecDeque<Result<(), DownstreamError>>>,
}

impl ScriptedDownstream {
    pub fn succeeding() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Result<(), DownstreamError>>) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
        }
    }

    pub fn always_failing(error: DownstreamError) -> Self {
        // Enough scripted failures for any bounded-retry test.
        Self::with_script(vec![Err(error); 16])
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    pub fn invocations(&self) -> Vec<(Instant, Uuid)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownstreamService for ScriptedDownstream {
    async fn invoke(&self, event: &ProductCreatedEvent) -> Result<(), DownstreamError> {
        self.invocations
            .lock()
            .unwrap()
            .push((Instant::now(), event.product_id));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

#[derive(Debug, Clone)]
pub struct PublishedRecord {
    pub topic: String,
    pub key: String,
    pub message_id: String,
    pub payload: Vec<u8>,
}

/// Broker publish fake capturing every acknowledged append.
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishedRecord>>,
    next_offset: AtomicI64,
    fail_publishes: AtomicBool,
    attempted: AtomicU32,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            next_offset: AtomicI64::new(0),
            fail_publishes: AtomicBool::new(false),
            attempted: AtomicU32::new(0),
        }
    }

    pub fn fail_publishes(&self) {
        self.fail_publishes.store(true, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedRecord> {
        self.published.lock().unwrap().clone()
    }

    pub fn publish_attempts(&self) -> u32 {
        self.attempted.load(Ordering::SeqCst)
    }

    pub fn dead_letters(&self) -> Vec<DeadLetterMessage> {
        self.published()
            .iter()
            .filter(|r| r.topic == DLT_TOPIC)
            .map(|r| serde_json::from_slice(&r.payload).expect("dead letter payload is JSON"))
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        message_id: &str,
        payload: &[u8],
    ) -> Result<PublishAck, BrokerError> {
        self.attempted.fetch_add(1, Ordering::SeqCst);
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::Producer("not enough in-sync replicas".to_string()));
        }

        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.published.lock().unwrap().push(PublishedRecord {
            topic: topic.to_string(),
            key: key.to_string(),
            message_id: message_id.to_string(),
            payload: payload.to_vec(),
        });
        Ok(PublishAck {
            partition: 0,
            offset,
        })
    }
}

pub struct TestPipeline {
    pub ledger: Arc<InMemoryLedger>,
    pub downstream: Arc<ScriptedDownstream>,
    pub publisher: Arc<RecordingPublisher>,
    pub processor: ProductEventProcessor,
}

pub fn build_pipeline(downstream: ScriptedDownstream) -> TestPipeline {
    let ledger = Arc::new(InMemoryLedger::new());
    let downstream = Arc::new(downstream);
    let publisher = Arc::new(RecordingPublisher::new());
    let dlq = Arc::new(DeadLetterQueue::new(publisher.clone(), DLT_TOPIC));
    let processor = ProductEventProcessor::new(
        ledger.clone(),
        downstream.clone(),
        dlq,
        RetryController::new(RetryConfig::default()),
    );
    TestPipeline {
        ledger,
        downstream,
        publisher,
        processor,
    }
}

pub fn sample_event() -> ProductCreatedEvent {
    ProductCreatedEvent::new(Uuid::new_v4(), "Samsung".to_string(), dec!(600), 1)
}

pub fn delivery_for(event: &ProductCreatedEvent) -> Delivery {
    Delivery {
        message_id: Some(Uuid::new_v4().to_string()),
        message_key: event.partition_key(),
        payload: codec::encode(event).unwrap(),
    }
}
