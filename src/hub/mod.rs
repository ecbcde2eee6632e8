//! Fan-out of job events to connected observers.
//!
//! The hub is constructed once at startup and shared by reference. Delivery is best effort:
//! observers whose channel is closed are pruned, observers whose buffer is full miss the event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub mod event;

pub use event::BroadcastEvent;

pub type ObserverId = u64;

/// Receiving side of one subscription
#[derive(Debug)]
pub struct Observer {
    id: ObserverId,
    receiver: mpsc::Receiver<BroadcastEvent>,
}

impl Observer {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next event, or `None` once the hub stopped or this observer was unsubscribed
    pub async fn recv(&mut self) -> Option<BroadcastEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BroadcastEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Shared set of observers
pub struct BroadcastHub {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<BroadcastEvent>>>,
    next_id: AtomicU64,
    buffer: usize,
    stopped: AtomicBool,
}

impl BroadcastHub {
    /// Create a hub where each observer can queue up to `buffer` undelivered events
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            stopped: AtomicBool::new(false),
        }
    }

    fn observers(&self) -> MutexGuard<'_, HashMap<ObserverId, mpsc::Sender<BroadcastEvent>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> Observer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);

        // A stopped hub hands out observers that are already at end-of-stream
        let mut observers = self.observers();
        if !self.is_stopped() {
            observers.insert(id, sender);
            tracing::debug!(observer_id = id, "Observer subscribed");
        }
        drop(observers);

        Observer { id, receiver }
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.observers().remove(&id).is_some();
        if removed {
            tracing::debug!(observer_id = id, "Observer unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every open observer. Returns how many observers received it.
    pub fn broadcast(&self, event: BroadcastEvent) -> usize {
        if self.is_stopped() {
            return 0;
        }

        let mut observers = self.observers();
        let mut delivered = 0;

        observers.retain(|id, sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(observer_id = *id, "Observer buffer full, event skipped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        tracing::debug!(job_id = %event.job_id(), delivered, "Event broadcast");
        delivered
    }

    pub fn observer_count(&self) -> usize {
        self.observers().len()
    }

    /// Close every subscription. Observers still drain events queued before the call.
    pub fn stop(&self) {
        let mut observers = self.observers();
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let closed = observers.len();
        observers.clear();
        drop(observers);

        tracing::info!(observers = closed, "Broadcast hub stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}
