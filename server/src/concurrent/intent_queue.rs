// skystrike/server/src/concurrent/intent_queue.rs
use crossbeam_queue::SegQueue;
use std::sync::Arc;
use tracing::warn;

use crate::core::types::PlayerIntent;

const MAX_QUEUED_INTENTS: usize = 4096;

/// Lock-free inbound queue at the connection-layer boundary. Network threads
/// enqueue decoded intents through cloned `IntentSender`s; the simulation
/// drains the whole queue exactly once at the start of each tick. Nothing
/// inside the tick ever blocks on it.
pub struct IntentQueue {
    queue: Arc<SegQueue<PlayerIntent>>,
}

impl IntentQueue {
    pub fn new() -> Self {
        IntentQueue { queue: Arc::new(SegQueue::new()) }
    }

    pub fn sender(&self) -> IntentSender {
        IntentSender { queue: self.queue.clone() }
    }

    /// Drain everything currently queued, in arrival order.
    pub fn drain(&self) -> Vec<PlayerIntent> {
        let mut intents = Vec::with_capacity(self.queue.len().min(MAX_QUEUED_INTENTS));
        while let Some(intent) = self.queue.pop() {
            intents.push(intent);
        }
        intents
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for IntentQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct IntentSender {
    queue: Arc<SegQueue<PlayerIntent>>,
}

impl IntentSender {
    /// Enqueue a decoded intent for the next tick. Overflow drops the intent
    /// rather than growing without bound; the client self-corrects on its
    /// next key transition.
    pub fn send(&self, intent: PlayerIntent) {
        if self.queue.len() >= MAX_QUEUED_INTENTS {
            warn!("Intent queue full; dropping intent for player {:?}", intent.player());
            return;
        }
        self.queue.push(intent);
    }
}
