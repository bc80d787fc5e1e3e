//! Toast-style notifications.
//!
//! Errors in background activities surface to the user as notifications
//! rather than error views. Delivery to the operating system is an
//! external concern; the default notifier logs, and the UI bridge swaps
//! in its own implementation.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Informational.
    Info,
    /// Something degraded but recovered.
    Warning,
    /// A background activity failed.
    Error,
    /// A long operation finished.
    Success,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short title.
    pub title: String,
    /// Message body.
    pub message: String,
    /// Severity.
    pub kind: NotificationKind,
}

/// Delivery interface for notifications.
pub trait Notifier: Send + Sync {
    /// Show a notification to the user.
    fn send(&self, notification: Notification);
}

struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: Notification) {
        info!(
            title = %notification.title,
            message = %notification.message,
            kind = ?notification.kind,
            "notification"
        );
    }
}

/// Replaceable notification sink.
pub struct Notifications {
    notifier: RwLock<Arc<dyn Notifier>>,
}

impl Notifications {
    /// A sink that logs until a real notifier is installed.
    pub fn new() -> Notifications {
        Notifications {
            notifier: RwLock::new(Arc::new(LogNotifier)),
        }
    }

    /// Install the delivery implementation.
    pub fn set_notifier(&self, notifier: Arc<dyn Notifier>) {
        *self.notifier.write() = notifier;
    }

    /// Send a notification.
    pub fn send(&self, notification: Notification) {
        self.notifier.read().send(notification);
    }

    /// Report a background failure.
    pub fn error(&self, title: &str, message: impl ToString) {
        self.send(Notification {
            title: title.to_string(),
            message: message.to_string(),
            kind: NotificationKind::Error,
        });
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}
