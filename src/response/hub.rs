//! The registry of connected clients and the single broadcast path into their queues.
//!
//! Each connected client owns a `Registration`: the receiving end of a small bounded
//! queue.  The `Hub` keeps only the sending end, keyed by a per-connection id, behind one
//! mutex.  `broadcast` offers a payload to every queue with `try_send`, so a client that
//! stops reading loses messages instead of slowing anyone else down.
mod broadcaster;

pub use broadcaster::{broadcast_channel, BroadcastTx, Broadcaster};

use hashbrown::HashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use uuid::Uuid;

/// An encoded message, shared between every queue it is delivered to
pub type Payload = Arc<str>;

#[derive(Debug)]
pub struct Hub {
    registry: Mutex<HashMap<Uuid, mpsc::Sender<Payload>>>,
    capacity: usize,
    counters: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    registered: AtomicU64,
    deregistered: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    input_dropped: AtomicU64,
}

/// A snapshot of the hub's counters, reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    pub connections: usize,
    pub registered: u64,
    pub deregistered: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub input_dropped: u64,
}

/// The outcome of one `broadcast`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

impl Hub {
    /// Create a hub whose clients may each have up to `capacity` undelivered payloads
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            counters: Counters::default(),
        })
    }

    /// Add a new client.  Its queue exists before it becomes visible to `broadcast`.
    pub fn register(self: &Arc<Self>) -> Registration {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();
        self.lock().insert(id, tx);
        self.counters.registered.fetch_add(1, Ordering::Relaxed);
        log::debug!("Registered client {}", id);
        Registration {
            id,
            rx,
            hub: Arc::clone(self),
        }
    }

    /// Remove a client and release its queue.  Returns `false` if it was already gone.
    pub fn deregister(&self, id: Uuid) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            self.counters.deregistered.fetch_add(1, Ordering::Relaxed);
            log::debug!("Deregistered client {}", id);
        }
        removed
    }

    /// Offer `payload` once to every registered client, dropping it for any client whose
    /// queue is full.
    pub fn broadcast(&self, payload: &Payload) -> Delivery {
        let mut delivery = Delivery::default();
        let registry = self.lock();
        for queue in registry.values() {
            match queue.try_send(Arc::clone(payload)) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => delivery.dropped += 1,
                // the receiver is only dropped after its entry is removed
                Err(TrySendError::Closed(_)) => delivery.dropped += 1,
            }
        }
        drop(registry);

        if delivery.dropped > 0 {
            log::warn!(
                "Dropped a message for {} client(s) that are not keeping up",
                delivery.dropped
            );
        }

        self.counters
            .delivered
            .fetch_add(delivery.delivered as u64, Ordering::Relaxed);
        self.counters
            .dropped
            .fetch_add(delivery.dropped as u64, Ordering::Relaxed);
        delivery
    }

    /// Drop every registration's sending end; their sessions see the queue close.
    pub fn close_all(&self) -> usize {
        let closed: Vec<Uuid> = self.lock().drain().map(|(id, _)| id).collect();
        self.counters
            .deregistered
            .fetch_add(closed.len() as u64, Ordering::Relaxed);
        closed.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> Stats {
        Stats {
            connections: self.len(),
            registered: self.counters.registered.load(Ordering::Relaxed),
            deregistered: self.counters.deregistered.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            input_dropped: self.counters.input_dropped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn count_input_drop(&self) {
        self.counters.input_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn lock(&self) -> MutexGuard<HashMap<Uuid, mpsc::Sender<Payload>>> {
        self.registry.lock().unwrap_or_else(Self::recover)
    }

    fn recover<T>(poisoned: PoisonError<MutexGuard<T>>) -> MutexGuard<T> {
        log::error!("{}", &poisoned);
        poisoned.into_inner()
    }
}

/// One connected client's queue.  Dropping it deregisters the client.
#[derive(Debug)]
pub struct Registration {
    id: Uuid,
    rx: mpsc::Receiver<Payload>,
    hub: Arc<Hub>,
}

impl Registration {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next payload; `None` once the hub has released this client
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Payload> {
        match self.rx.try_recv() {
            Ok(payload) => Some(payload),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.deregister(self.id);
    }
}

#[cfg(test)]
mod test;
