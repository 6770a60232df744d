// src/events/bus.rs

//! In-process publish/subscribe for runtime events.
//!
//! Each subscriber owns an unbounded FIFO channel. The bus has a single
//! producer (the ingestor), so every subscriber observes events in publish
//! order. Subscriptions unregister themselves when dropped, which keeps the
//! subscriber table from growing across many short-lived containers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;

use crate::events::RuntimeEvent;

#[derive(Debug, Default)]
struct BusInner {
    subscribers: DashMap<u64, mpsc::UnboundedSender<RuntimeEvent>>,
    next_id: AtomicU64,
}

/// Cloneable handle to a shared event bus.
#[derive(Debug, Clone, Default)]
pub struct RuntimeEventBus {
    inner: Arc<BusInner>,
}

impl RuntimeEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Events published after this call returns
    /// are delivered to it.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.insert(id, tx);
        trace!(subscription = id, "subscribed to runtime events");
        Subscription {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current subscriber. Returns how many
    /// subscribers received it.
    pub fn publish(&self, event: RuntimeEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.inner.subscribers.iter() {
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            self.inner.subscribers.remove(&id);
        }

        trace!(%event, delivered, "published runtime event");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<RuntimeEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<RuntimeEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.remove(&self.id);
            trace!(subscription = self.id, "unsubscribed from runtime events");
        }
    }
}
