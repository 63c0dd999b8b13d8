use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::protocol::PushEvent;

/// Handle returned by `subscribe`, released with `unsubscribe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, UnboundedSender<PushEvent>)>,
    closed: bool,
}

/// Fan-out of push events to subscribers, in receipt order.
#[derive(Clone, Default)]
pub(crate) struct PushEventBus {
    state: Arc<Mutex<BusState>>,
}

impl PushEventBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Once the bus is closed, the returned receiver
    /// yields nothing.
    pub(crate) fn subscribe(&self) -> (SubscriptionId, UnboundedReceiver<PushEvent>) {
        let (tx, rx) = unbounded_channel::<PushEvent>();
        let mut state = self.state.lock().expect("PushEventBus mutex poisoned");
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        if !state.closed {
            state.subscribers.push((id, tx));
        }
        (id, rx)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock().expect("PushEventBus mutex poisoned");
        let before = state.subscribers.len();
        state.subscribers.retain(|(sub_id, _)| *sub_id != id);
        state.subscribers.len() != before
    }

    pub(crate) fn broadcast(&self, event: PushEvent) {
        let mut state = self.state.lock().expect("PushEventBus mutex poisoned");
        state
            .subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    /// Drops every subscriber and refuses new ones.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().expect("PushEventBus mutex poisoned");
        state.closed = true;
        state.subscribers.clear();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .expect("PushEventBus mutex poisoned")
            .subscribers
            .len()
    }
}
