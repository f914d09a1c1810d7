//! Multi-subscriber event channel
//!
//! Every subscriber gets its own bounded crossbeam channel. Publishing never
//! blocks on a slow consumer: when a subscriber's queue is full the event is
//! dropped for that subscriber only, and subscribers whose receiver has been
//! dropped are pruned.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::{Arc, PoisonError, RwLock};

/// Fan-out channel for engine events
pub struct EventBus<T> {
    subscribers: Arc<RwLock<Vec<Sender<T>>>>,
    capacity: usize,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone> EventBus<T> {
    /// Create a bus whose subscribers buffer up to `capacity` events each
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            capacity: capacity.max(1),
        }
    }

    /// Add a subscriber
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Publish to every subscriber, returns how many received the event
    pub fn publish(&self, event: T) -> usize {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Self::fan_out(&mut subscribers, &event)
    }

    /// Publish without ever waiting on the subscriber lock
    ///
    /// Used from the real-time audio thread. If the subscriber list is held
    /// elsewhere at this instant the event is dropped.
    pub fn try_publish(&self, event: T) -> usize {
        match self.subscribers.try_write() {
            Ok(mut subscribers) => Self::fan_out(&mut subscribers, &event),
            Err(_) => 0,
        }
    }

    /// Like `try_publish`, but only if `guard` holds while the list is locked
    ///
    /// A writer that changes the guarded state before calling `publish`
    /// is therefore never overtaken by a stale event.
    pub fn try_publish_if(&self, event: T, guard: impl FnOnce() -> bool) -> usize {
        match self.subscribers.try_write() {
            Ok(mut subscribers) if guard() => Self::fan_out(&mut subscribers, &event),
            _ => 0,
        }
    }

    fn fan_out(subscribers: &mut Vec<Sender<T>>, event: &T) -> usize {
        let mut delivered = 0;
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }
}
