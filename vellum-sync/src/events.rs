//! Typed event dispatcher
//!
//! Subscribers register per event kind; every registration returns an opaque
//! [`Subscription`] handle the caller stores and uses to unsubscribe. The
//! registry is owned by the engine and cleared on its shutdown path, so
//! forgotten handles cannot outlive the engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::conflict::SyncConflict;
use crate::logs::SyncLogEntry;
use crate::state::{SyncProgress, SyncStatus};

#[derive(Debug, Clone)]
pub enum SyncEvent {
    Status(SyncStatus),
    Progress(SyncProgress),
    Conflict(SyncConflict),
    Log(SyncLogEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEventKind {
    Status,
    Progress,
    Conflict,
    Log,
}

impl SyncEvent {
    pub fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::Status(_) => SyncEventKind::Status,
            SyncEvent::Progress(_) => SyncEventKind::Progress,
            SyncEvent::Conflict(_) => SyncEventKind::Conflict,
            SyncEvent::Log(_) => SyncEventKind::Log,
        }
    }
}

type Handler = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    handlers: HashMap<SyncEventKind, Vec<(u64, Handler)>>,
}

#[derive(Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
    next_id: AtomicU64,
}

/// Opaque unsubscribe handle returned by [`EventBus::on`].
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: SyncEventKind,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().expect("event registry poisoned");
            if let Some(handlers) = registry.handlers.get_mut(&self.kind) {
                handlers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &self,
        kind: SyncEventKind,
        handler: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut registry = self.registry.lock().expect("event registry poisoned");
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Deliver an event to every handler registered for its kind. Handlers
    /// are cloned out of the registry first, so one may subscribe or
    /// unsubscribe without deadlocking.
    pub fn emit(&self, event: SyncEvent) {
        let handlers: Vec<Handler> = {
            let registry = self.registry.lock().expect("event registry poisoned");
            registry
                .handlers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            handler(&event);
        }
    }

    /// Drop every handler. Part of the engine's disposal path.
    pub fn clear(&self) {
        self.registry
            .lock()
            .expect("event registry poisoned")
            .handlers
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogLevel;
    use chrono::Utc;

    fn log_event(message: &str) -> SyncEvent {
        SyncEvent::Log(SyncLogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            message: message.to_string(),
        })
    }

    #[test]
    fn handlers_receive_only_their_kind() {
        let bus = EventBus::new();
        let log_count = Arc::new(AtomicU64::new(0));
        let status_count = Arc::new(AtomicU64::new(0));

        let log_count_in = log_count.clone();
        let _log_sub = bus.on(SyncEventKind::Log, move |_| {
            log_count_in.fetch_add(1, Ordering::SeqCst);
        });
        let status_count_in = status_count.clone();
        let _status_sub = bus.on(SyncEventKind::Status, move |_| {
            status_count_in.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(log_event("hello"));
        assert_eq!(log_count.load(Ordering::SeqCst), 1);
        assert_eq!(status_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));

        let count_in = count.clone();
        let sub = bus.on(SyncEventKind::Log, move |_| {
            count_in.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(log_event("one"));
        sub.unsubscribe();
        bus.emit(log_event("two"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_drops_all_handlers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU64::new(0));

        let count_in = count.clone();
        let _sub = bus.on(SyncEventKind::Log, move |_| {
            count_in.fetch_add(1, Ordering::SeqCst);
        });

        bus.clear();
        bus.emit(log_event("ignored"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
