//! Process-wide publish/subscribe channel for [`QueueEvent`]s.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::trace;

use pixdrop_protocol::QueueEvent;

/// Typed event bus.
///
/// Every subscriber gets its own unbounded channel, so a publish is never
/// dropped for a slow reader. Events published before a subscription are
/// not replayed. Closed subscriptions are pruned on the next publish.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<QueueEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Subscription { rx }
    }

    /// Delivers `event` once to every live subscriber and returns how many
    /// received it.
    pub fn publish(&self, event: QueueEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        trace!(item = %event.selection_id(), delivered = subscribers.len(), "event published");
        subscribers.len()
    }

    /// Number of subscriptions still registered.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

/// Receiving end of an [`EventBus`] subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<QueueEvent>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once every bus handle is
    /// gone.
    pub async fn recv(&mut self) -> Option<QueueEvent> {
        self.rx.recv().await
    }

    /// Returns an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<QueueEvent> {
        self.rx.try_recv().ok()
    }

    /// Takes every event delivered so far.
    pub fn drain(&mut self) -> Vec<QueueEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
