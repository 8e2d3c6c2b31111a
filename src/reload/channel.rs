// src/reload/channel.rs

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::reload::ReloadEvent;
use crate::types::AssetKind;

pub type ClientId = u64;

/// Default per-client queue length.
pub const DEFAULT_CLIENT_QUEUE: usize = 16;

struct Client {
    sender: mpsc::Sender<ReloadEvent>,
    /// `None` means every kind.
    kinds: Option<HashSet<AssetKind>>,
}

impl Client {
    fn wants(&self, event: &ReloadEvent) -> bool {
        match (event.kind(), &self.kinds) {
            (None, _) | (_, None) => true,
            (Some(kind), Some(kinds)) => kinds.contains(&kind),
        }
    }
}

/// A connected client's end of the channel.
#[derive(Debug)]
pub struct Subscription {
    pub id: ClientId,
    pub events: mpsc::Receiver<ReloadEvent>,
}

/// Result of one broadcast, mainly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Clients whose queue was full; they miss this event.
    pub dropped: usize,
    /// Clients found disconnected and removed.
    pub removed: usize,
}

/// Registry of connected browsers.
///
/// Broadcasting never waits on a client: each one has a bounded queue, and a
/// full queue only costs that client the event.
pub struct LiveReload {
    clients: Mutex<HashMap<ClientId, Client>>,
    next_id: AtomicU64,
    queue_len: usize,
}

impl std::fmt::Debug for LiveReload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveReload")
            .field("clients", &self.client_count())
            .field("queue_len", &self.queue_len)
            .finish()
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_QUEUE)
    }
}

impl LiveReload {
    pub fn new(queue_len: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_len: queue_len.max(1),
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<ClientId, Client>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a client. `kinds` limits which scoped events it receives;
    /// full reloads always reach it.
    pub fn connect(&self, kinds: Option<HashSet<AssetKind>>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, events) = mpsc::channel(self.queue_len);
        self.clients().insert(id, Client { sender, kinds });
        info!(client = id, "live-reload client connected");
        Subscription { id, events }
    }

    pub fn disconnect(&self, id: ClientId) {
        if self.clients().remove(&id).is_some() {
            info!(client = id, "live-reload client disconnected");
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients().len()
    }

    pub fn broadcast(&self, event: &ReloadEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut clients = self.clients();

        clients.retain(|id, client| {
            if !client.wants(event) {
                return true;
            }
            match client.sender.try_send(event.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(client = *id, "live-reload client queue full; dropping event");
                    report.dropped += 1;
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client = *id, "live-reload client gone; removing");
                    report.removed += 1;
                    false
                }
            }
        });

        debug!(?event, ?report, "broadcast reload event");
        report
    }

    pub fn broadcast_all(&self, events: &[ReloadEvent]) -> BroadcastReport {
        let mut total = BroadcastReport::default();
        for event in events {
            let report = self.broadcast(event);
            total.delivered += report.delivered;
            total.dropped += report.dropped;
            total.removed += report.removed;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn late_clients_get_no_replay() {
        let hub = LiveReload::default();
        hub.broadcast(&ReloadEvent::FullReload);

        let mut sub = hub.connect(None);
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_clients_are_removed() {
        let hub = LiveReload::default();
        let gone = hub.connect(None);
        let mut alive = hub.connect(None);
        drop(gone);

        let report = hub.broadcast(&ReloadEvent::FullReload);
        assert_eq!(report.removed, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(hub.client_count(), 1);
        assert_eq!(alive.events.recv().await, Some(ReloadEvent::FullReload));
    }

    #[tokio::test]
    async fn full_queue_drops_only_for_that_client() {
        let hub = LiveReload::new(1);
        let _slow = hub.connect(None);
        let mut fast = hub.connect(None);

        let first = hub.broadcast(&ReloadEvent::FullReload);
        assert_eq!(first.delivered, 2);
        let _ = fast.events.recv().await;

        let second = hub.broadcast(&ReloadEvent::FullReload);
        assert_eq!(second.delivered, 1);
        assert_eq!(second.dropped, 1);
        assert_eq!(hub.client_count(), 2);
    }

    #[tokio::test]
    async fn scoped_clients_skip_other_kinds() {
        let hub = LiveReload::default();
        let mut js_only = hub.connect(Some(HashSet::from([AssetKind::Js])));

        hub.broadcast(&ReloadEvent::inject(AssetKind::Css, "/css/a.css"));
        assert!(js_only.events.try_recv().is_err());

        hub.broadcast(&ReloadEvent::FullReload);
        assert_eq!(js_only.events.try_recv().ok(), Some(ReloadEvent::FullReload));
    }
}
