//! Notification surface.
//!
//! Delivery and permission prompting belong to the host environment; the
//! session only decides *when* to notify. Capabilities are resolved once
//! at startup and passed in, rather than probed at every call site.

use tracing::info;

/// What the host environment can do, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_notify: bool,
    pub can_share: bool,
}

impl Capabilities {
    /// A headless environment: no notifications, no share sheet.
    pub fn none() -> Self {
        Self {
            can_notify: false,
            can_share: false,
        }
    }
}

/// Tri-state notification permission, mirroring the usual browser model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not yet asked; the surface may prompt on first use.
    Undecided,
}

/// How a notification was (or was not) delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    /// Delivery unavailable; the surface fell back to a blocking prompt.
    FellBack,
    Suppressed,
}

/// Where "time's up" and chat messages go.
///
/// Implementations must not block the event loop on permission prompts.
pub trait NotifySurface: Send {
    fn permission(&self) -> Permission;

    fn notify(&mut self, message: &str) -> NotifyOutcome;
}

/// Surface that writes notifications to the log and records them.
/// Used by the CLI driver and in tests.
#[derive(Debug, Default)]
pub struct LogNotifySurface {
    delivered: Vec<String>,
}

impl LogNotifySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first.
    pub fn delivered(&self) -> &[String] {
        &self.delivered
    }
}

impl NotifySurface for LogNotifySurface {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&mut self, message: &str) -> NotifyOutcome {
        info!(message, "notification");
        self.delivered.push(message.to_string());
        NotifyOutcome::Delivered
    }
}
