//! Integration points to the host application.
//!
//! The protocol layer never touches these; only the orchestrator's handlers
//! write to the cache, the notification sink, and the refresh broadcast, so
//! the stream plumbing stays free of UI-state coupling.

use std::sync::Arc;
use std::time::Duration;

/// Logical identifier for a cached result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Collection name, e.g. `"reservations"`.
    pub collection: &'static str,
    /// Tenant the result set belongs to.
    pub business_id: String,
}

impl QueryKey {
    /// Key for a tenant's reservation list.
    #[must_use]
    pub fn reservations(business_id: impl Into<String>) -> Self {
        Self {
            collection: "reservations",
            business_id: business_id.into(),
        }
    }
}

/// Local data cache the orchestrator may mark stale.
///
/// Implementations should drop or refetch the result set identified by the
/// key; whether a refetch happens immediately is up to the host (typically
/// only if the result set is actively displayed).
pub trait QueryCache: Send + Sync {
    /// Mark a result set stale.
    fn invalidate(&self, key: &QueryKey);
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Short-lived user-facing message describing what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    /// Icon hint for the host UI.
    pub icon: Option<&'static str>,
    /// Auto-dismiss after this long.
    pub auto_dismiss: Duration,
}

impl Notification {
    /// Build a notification with the given severity and dismiss window.
    #[must_use]
    pub fn new(message: impl Into<String>, severity: Severity, auto_dismiss: Duration) -> Self {
        Self {
            message: message.into(),
            severity,
            icon: None,
            auto_dismiss,
        }
    }

    /// Attach an icon hint.
    #[must_use]
    pub fn with_icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }
}

/// Sink for user-facing notifications.
pub trait NotificationSink: Send + Sync {
    /// Show a notification.
    fn notify(&self, notification: Notification);
}

/// Fire-and-forget signal telling display components that one record needs
/// re-rendering, without a full refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSignal {
    /// The affected reservation.
    pub reservation_id: String,
    /// The field that changed, when known.
    pub change: Option<ChangedField>,
}

/// The field a refresh signal is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangedField {
    /// New attendance count.
    Attendance(u64),
    /// New reservation status.
    Status(String),
}

/// Predicate restricting the client to application paths where the dashboard
/// is mounted. Evaluated once at subscription time.
pub type RouteGuard = Arc<dyn Fn() -> bool + Send + Sync>;
