/// Severity level for user-facing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Bridge to the view layer. The core signals navigation and notifications
/// through this trait instead of touching the router or toast system
/// directly; hosts install their own implementation.
pub trait ViewBridge: Send + Sync {
    fn navigate(&self, _path: &str) {}
    fn notify(&self, _title: &str, _description: &str, _severity: Severity) {}
}

/// Bridge that drops all signals. Used by headless hosts and tests.
pub struct NullBridge;

impl ViewBridge for NullBridge {}
