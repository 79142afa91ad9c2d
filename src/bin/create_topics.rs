use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::config::ClientConfig;

use product_events::infrastructure::KafkaConfig;

#[tokio::main]
async fn main() {
    let config = KafkaConfig::default();
    let bootstrap_servers = std::env::var("KAFKA_BOOTSTRAP_SERVERS")
        .unwrap_or_else(|_| config.bootstrap_servers.clone());

    let admin_client: AdminClient<_> = ClientConfig::new()
        .set("bootstrap.servers", &bootstrap_servers)
        .create()
        .expect("Failed to create admin client");

    let min_insync = config.min_insync_replicas.to_string();
    let topics = vec![
        NewTopic::new(
            &config.topic,
            config.partitions,
            TopicReplication::Fixed(config.replication_factor),
        )
        .set("min.insync.replicas", &min_insync),
        NewTopic::new(
            &config.dead_letter_topic,
            config.partitions,
            TopicReplication::Fixed(config.replication_factor),
        ),
    ];

    let results = admin_client
        .create_topics(&topics, &AdminOptions::new())
        .await
        .expect("Failed to create topics");

    for result in results {
        match result {
            Ok(topic) => println!("Created topic: {}", topic),
            Err((topic, e)) => println!("Failed to create topic {}: {}", topic, e),
        }
    }
}
