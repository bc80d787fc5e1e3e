//! Test doubles for bus consumers.

use parking_lot::Mutex;
use serde_json::Value;

use launcher_types::UpdateNotification;

use crate::bus::EventSink;

/// An [`EventSink`] that records everything it receives.
///
/// Used across the workspace to assert on event ordering and payloads.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, Value)>>,
    notifications: Mutex<Vec<UpdateNotification>>,
}

impl RecordingSink {
    /// An empty recorder.
    pub fn new() -> RecordingSink {
        RecordingSink::default()
    }

    /// All `(name, payload)` events received so far.
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().clone()
    }

    /// Just the event names, in arrival order.
    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    /// All notifications received so far.
    pub fn notifications(&self) -> Vec<UpdateNotification> {
        self.notifications.lock().clone()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
        self.notifications.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn event(&self, name: &str, payload: Value) {
        self.events.lock().push((name.to_string(), payload));
    }

    fn notify(&self, notification: UpdateNotification) {
        self.notifications.lock().push(notification);
    }
}
