//! Turns reload ticks into pushes to every connected client

use crate::registry::ClientRegistry;
use reloadwatch_watcher::ReloadTick;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Message telling the browser how many milliseconds to wait before reloading
pub fn reload_message(delay_secs: f64) -> String {
    let millis = (delay_secs * 1000.0).round().max(0.0);
    format!("{millis}")
}

/// Pushes a reload instruction to all clients on every tick
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    message: String,
}

impl Broadcaster {
    pub fn new(registry: Arc<ClientRegistry>, delay_secs: f64) -> Self {
        Self {
            registry,
            message: reload_message(delay_secs),
        }
    }

    /// Notify and drop every registered client
    pub async fn notify(&self, tick: &ReloadTick) {
        debug!("Changed: {:?}", tick.paths);
        let report = self.registry.broadcast(&self.message).await;
        info!(
            "{} path(s) changed, reloaded {} client(s) ({} failed)",
            tick.paths.len(),
            report.notified,
            report.failed
        );
    }

    /// Handle ticks until the coalescer goes away
    pub async fn run(self, mut ticks: mpsc::Receiver<ReloadTick>) {
        while let Some(tick) = ticks.recv().await {
            self.notify(&tick).await;
        }
        debug!("Broadcaster stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::FakeClient;
    use std::path::PathBuf;

    #[test]
    fn test_reload_message() {
        assert_eq!(reload_message(0.0), "0");
        assert_eq!(reload_message(2.5), "2500");
        assert_eq!(reload_message(0.1), "100");
        assert_eq!(reload_message(1.0), "1000");
    }

    #[tokio::test]
    async fn test_tick_reaches_client_with_delay() {
        let registry = Arc::new(ClientRegistry::new());
        let client = FakeClient::new(false);
        let received = Arc::clone(&client.received);
        registry.register(Box::new(client)).await;

        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(Broadcaster::new(Arc::clone(&registry), 2.5).run(rx));

        tx.send(ReloadTick {
            paths: vec![PathBuf::from("./index.html")],
        })
        .await
        .expect("test setup failed");
        drop(tx);
        task.await.expect("broadcaster panicked");

        assert_eq!(
            *received.lock().expect("lock poisoned"),
            vec!["2500".to_string()]
        );
        assert!(registry.is_empty().await);
    }
}
