//! Registry of connected reload clients
//!
//! Clients are kept under stable ids in an ordered map. Registration,
//! removal and the notify-and-drop broadcast all run under the same lock, so a
//! client registering while a broadcast is in progress waits for it to finish
//! and is never part of it.

use async_trait::async_trait;
use reloadwatch_core::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Stable identifier handed out on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// One end of a push channel to a browser
#[async_trait]
pub trait ReloadClient: Send {
    /// Push a text message to the client
    async fn send_text(&mut self, message: &str) -> Result<()>;

    /// Close the connection; errors are irrelevant at this point
    async fn close(&mut self);
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients that received the message
    pub notified: usize,
    /// Clients whose connection failed
    pub failed: usize,
}

/// Upper bound on one client's send or close during a broadcast
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// The set of currently connected clients
pub struct ClientRegistry {
    clients: Mutex<BTreeMap<ClientId, Box<dyn ReloadClient>>>,
    next_id: AtomicU64,
    write_timeout: Duration,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::with_write_timeout(DEFAULT_WRITE_TIMEOUT)
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose broadcasts give up on a client after `write_timeout`
    pub fn with_write_timeout(write_timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
            write_timeout,
        }
    }

    /// Add a client whose handshake has completed
    pub async fn register(&self, client: Box<dyn ReloadClient>) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut clients = self.clients.lock().await;
        clients.insert(id, client);
        debug!("Registered {} ({} connected)", id, clients.len());
        id
    }

    /// Remove a client that went away on its own
    ///
    /// Returns `false` when a broadcast already dropped it.
    pub async fn unregister(&self, id: ClientId) -> bool {
        let removed = self.clients.lock().await.remove(&id).is_some();
        if removed {
            debug!("Unregistered {}", id);
        }
        removed
    }

    /// Number of connected clients
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Send `message` to every client, close each one and leave the registry empty
    ///
    /// A client whose write fails or stalls past the write timeout is logged
    /// and counted as failed; the others are still notified. The lock is held
    /// for the whole operation.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let mut clients = self.clients.lock().await;
        let mut report = BroadcastReport::default();

        for (id, mut client) in std::mem::take(&mut *clients) {
            match timeout(self.write_timeout, client.send_text(message)).await {
                Ok(Ok(())) => report.notified += 1,
                Ok(Err(e)) => {
                    warn!("Failed to notify {}: {}", id, e);
                    report.failed += 1;
                }
                Err(_) => {
                    warn!("Timed out notifying {} after {:?}", id, self.write_timeout);
                    report.failed += 1;
                }
            }
            if timeout(self.write_timeout, client.close()).await.is_err() {
                debug!("Timed out closing {}", id);
            }
        }

        report
    }
}
