use tokio::sync::watch;
use tracing::info;

/// Broadcasts the shutdown signal to every partition worker. Workers finish
/// their in-flight delivery episode before exiting.
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Trips the signal on SIGINT.
pub async fn listen_for_ctrl_c(signal: ShutdownSignal) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
        signal.trigger();
    }
}
