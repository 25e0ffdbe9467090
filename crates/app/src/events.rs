use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use quill_core::domain::events::{Event, EventKind};

type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Typed publish/subscribe registry.
///
/// Handlers are registered during wiring; the bus is read-only afterwards.
/// Each delivery runs on its own task.
#[derive(Default, Clone)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F, Fut>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event| Box::pin(handler(event)));
        self.handlers.entry(kind).or_default().push(handler);
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Spawns one task per subscribed handler. Must run inside a tokio runtime.
    pub fn publish(&self, event: Event) {
        let Some(handlers) = self.handlers.get(&event.kind()) else {
            return;
        };
        for handler in handlers {
            tokio::spawn(handler(event.clone()));
        }
    }
}
