//! Single-subscriber event bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use launcher_types::{UpdateEvent, UpdateNotification};

/// The consumer side of the bus.
///
/// Implemented by the UI bridge adapter. Calls are made synchronously from
/// whatever task produced the event; implementations must hand the payload
/// off quickly rather than doing work inline.
pub trait EventSink: Send + Sync {
    /// A named event with an arbitrary JSON payload.
    fn event(&self, name: &str, payload: Value);

    /// A progress notification for an ongoing operation.
    fn notify(&self, notification: UpdateNotification);
}

/// Fan-out point for events produced anywhere in the launcher.
///
/// There is exactly one subscriber. Events emitted before a sink is
/// attached are counted and dropped with a warning, matching how the
/// launcher behaves while the web view is still starting.
pub struct EventBus {
    sink: RwLock<Option<Arc<dyn EventSink>>>,
    events_emitted: AtomicU64,
}

impl EventBus {
    /// Create a bus with no subscriber attached.
    pub fn new() -> EventBus {
        EventBus {
            sink: RwLock::new(None),
            events_emitted: AtomicU64::new(0),
        }
    }

    /// Attach the UI bridge. Replaces any previous subscriber.
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Emit a named event with a serializable payload.
    pub fn emit<P: Serialize>(&self, name: &str, payload: P) {
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(event = name, error = %err, "dropping unserializable event payload");
                return;
            }
        };
        self.emit_value(name, value);
    }

    /// Emit a named event with no payload.
    pub fn emit_named(&self, name: &str) {
        self.emit_value(name, Value::Null);
    }

    /// Emit an update event under its own name.
    pub fn emit_event(&self, event: UpdateEvent) {
        let name = event.name.clone();
        self.emit(&name, event);
    }

    /// Deliver a progress notification.
    pub fn notify(&self, notification: UpdateNotification) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        match &*self.sink.read() {
            Some(sink) => sink.notify(notification),
            None => debug!("progress notification dropped (no subscriber)"),
        }
    }

    /// Total events and notifications emitted since creation.
    pub fn events_emitted(&self) -> u64 {
        self.events_emitted.load(Ordering::Relaxed)
    }

    fn emit_value(&self, name: &str, payload: Value) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        match &*self.sink.read() {
            Some(sink) => {
                debug!(event = name, "emitting event");
                sink.event(name, payload);
            }
            None => warn!(event = name, "event dropped (no subscriber)"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
