// skystrike/server/src/concurrent/event_bus.rs
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

use crate::core::types::GameEvent;

type Handler = Box<dyn FnMut(&GameEvent) + Send>;

/// Gameplay-event fan-out: an explicit, ordered list of handlers drained in a
/// fixed order once per tick. Events are delivered FIFO; handlers run in
/// registration order. A panicking handler is caught, logged with the
/// offending event name, and the remaining handlers still run — one
/// misbehaving game-mode handler must not halt the simulation.
pub struct EventBus {
    handlers: Vec<(String, Handler)>,
    pending: Vec<GameEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus { handlers: Vec::new(), pending: Vec::new() }
    }

    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.handlers.push((name.to_string(), Box::new(handler)));
    }

    pub fn push(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Deliver every pending event to every handler. Returns the number of
    /// events delivered.
    pub fn drain(&mut self) -> usize {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for (name, handler) in self.handlers.iter_mut() {
                let result = catch_unwind(AssertUnwindSafe(|| handler(event)));
                if result.is_err() {
                    error!(
                        "Event handler '{}' panicked while handling '{}'; continuing with remaining handlers",
                        name,
                        event.name()
                    );
                }
            }
        }
        events.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
