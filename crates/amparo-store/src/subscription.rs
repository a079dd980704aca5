use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use amparo_types::models::{Marker, Status};

/// One registered live query. `last` caches the serialized form of the most
/// recently delivered snapshot so unchanged states are not re-sent.
pub(crate) struct Watcher {
    pub city: String,
    pub statuses: Option<Vec<Status>>,
    pub tx: mpsc::UnboundedSender<Vec<Marker>>,
    pub last: Option<String>,
}

pub(crate) type Registry = Mutex<HashMap<u64, Watcher>>;

/// Handle to a live query on the request store.
///
/// The first `recv` yields the snapshot taken at subscribe time; every later
/// one is a fresh full result set after a relevant change. Dispatch happens
/// under the registry lock, so once `close` returns — it removes the watcher
/// under that same lock — no further snapshot can be enqueued. `close` is
/// idempotent and safe to call from the consuming task; dropping the
/// subscription closes it.
pub struct Subscription {
    id: u64,
    registry: Arc<Registry>,
    rx: mpsc::UnboundedReceiver<Vec<Marker>>,
    closed: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        registry: Arc<Registry>,
        rx: mpsc::UnboundedReceiver<Vec<Marker>>,
    ) -> Self {
        Self {
            id,
            registry,
            rx,
            closed: false,
        }
    }

    /// Next snapshot, in delivery order. `None` once closed.
    pub async fn recv(&mut self) -> Option<Vec<Marker>> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Non-blocking variant; `None` when nothing is pending or closed.
    pub fn try_recv(&mut self) -> Option<Vec<Marker>> {
        if self.closed {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.registry
            .lock()
            .expect("watcher registry poisoned")
            .remove(&self.id);
        // Drop anything that was queued before the watcher was removed.
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
