//! Type-routed business handlers for decoded stream events.
//!
//! The router is the only place with domain knowledge: each handler decides
//! which combination of cache invalidation, refresh broadcast, and user
//! notification a given event produces. Handlers never write back to the
//! stream.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;

use crate::event::{EventType, StreamEvent};
use crate::sinks::{
    ChangedField, Notification, NotificationSink, QueryCache, QueryKey, RefreshSignal, Severity,
};

/// Payload of a `qr-scanned` event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QrScanPayload {
    reservation_id: String,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default)]
    scan_count: u64,
    #[serde(default = "default_increment")]
    increment: u64,
}

const fn default_increment() -> u64 {
    1
}

/// Payload shared by `reservation-created` / `reservation-updated` /
/// `reservation-deleted`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReservationPayload {
    #[serde(default)]
    reservation_id: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
}

/// Payload of a `status-changed` event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusChangedPayload {
    reservation_id: String,
    new_status: String,
}

/// Payload of an `attendance-updated` event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendancePayload {
    reservation_id: String,
    #[serde(default)]
    attendance: u64,
}

/// Maps event types to their side effects.
pub(crate) struct EventRouter {
    business_id: String,
    cache: Option<Arc<dyn QueryCache>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    refresh: broadcast::Sender<RefreshSignal>,
    auto_update_cache: bool,
    show_notifications: bool,
    debug: bool,
}

impl EventRouter {
    pub(crate) fn new(
        business_id: String,
        cache: Option<Arc<dyn QueryCache>>,
        notifier: Option<Arc<dyn NotificationSink>>,
        refresh: broadcast::Sender<RefreshSignal>,
        auto_update_cache: bool,
        show_notifications: bool,
        debug: bool,
    ) -> Self {
        Self {
            business_id,
            cache,
            notifier,
            refresh,
            auto_update_cache,
            show_notifications,
            debug,
        }
    }

    /// Route one decoded record to its handler.
    pub(crate) fn dispatch(&self, event: &StreamEvent) {
        match event.event_type() {
            EventType::QrScanned => self.on_qr_scanned(event),
            EventType::ReservationCreated => self.on_reservation_created(event),
            EventType::ReservationUpdated => self.on_reservation_updated(event),
            EventType::ReservationDeleted => self.on_reservation_deleted(event),
            EventType::StatusChanged => self.on_status_changed(event),
            EventType::AttendanceUpdated => self.on_attendance_updated(event),
            EventType::Connected => {
                // Attempt bookkeeping is reset by the connection owner; no
                // user-facing notification for this one.
                tracing::debug!("Stream subscription acknowledged by server");
            }
            EventType::Heartbeat => {
                // Liveness proof only.
            }
            EventType::Error => self.on_server_error(event),
            EventType::Unknown => {
                if self.debug {
                    tracing::debug!(kind = %event.kind, "Ignoring unknown event type");
                }
            }
        }
    }

    fn on_qr_scanned(&self, event: &StreamEvent) {
        let Some(payload) = self.payload::<QrScanPayload>(event) else {
            return;
        };

        self.invalidate_reservations();
        self.broadcast(RefreshSignal {
            reservation_id: payload.reservation_id,
            change: Some(ChangedField::Attendance(payload.scan_count)),
        });

        let name = payload.customer_name.as_deref().unwrap_or("Guest");
        let message = if payload.increment == 1 {
            format!("{name}: +1 guest checked in")
        } else {
            format!("{name}: +{} guests checked in", payload.increment)
        };
        self.notify(
            Notification::new(message, Severity::Success, Duration::from_millis(3000))
                .with_icon("qr-scan"),
        );
    }

    fn on_reservation_created(&self, event: &StreamEvent) {
        let Some(payload) = self.payload::<ReservationPayload>(event) else {
            return;
        };

        self.invalidate_reservations();

        let name = payload.customer_name.as_deref().unwrap_or("a customer");
        self.notify(
            Notification::new(
                format!("New reservation: {name}"),
                Severity::Success,
                Duration::from_millis(4000),
            )
            .with_icon("reservation"),
        );
    }

    fn on_reservation_updated(&self, event: &StreamEvent) {
        let Some(payload) = self.payload::<ReservationPayload>(event) else {
            return;
        };

        self.invalidate_reservations();
        if let Some(id) = payload.reservation_id {
            self.broadcast(RefreshSignal {
                reservation_id: id,
                change: None,
            });
        }

        // Too noisy for production; surfaced only while debugging.
        if self.debug {
            self.notify(Notification::new(
                "Reservation updated",
                Severity::Info,
                Duration::from_millis(2000),
            ));
        }
    }

    fn on_reservation_deleted(&self, event: &StreamEvent) {
        let Some(_payload) = self.payload::<ReservationPayload>(event) else {
            return;
        };

        self.invalidate_reservations();
        self.notify(Notification::new(
            "Reservation deleted",
            Severity::Error,
            Duration::from_millis(3000),
        ));
    }

    fn on_status_changed(&self, event: &StreamEvent) {
        let Some(payload) = self.payload::<StatusChangedPayload>(event) else {
            return;
        };

        self.invalidate_reservations();
        self.broadcast(RefreshSignal {
            reservation_id: payload.reservation_id,
            change: Some(ChangedField::Status(payload.new_status)),
        });
    }

    fn on_attendance_updated(&self, event: &StreamEvent) {
        let Some(payload) = self.payload::<AttendancePayload>(event) else {
            return;
        };

        self.invalidate_reservations();
        self.broadcast(RefreshSignal {
            reservation_id: payload.reservation_id,
            change: Some(ChangedField::Attendance(payload.attendance)),
        });
    }

    /// The transport dropped the stream involuntarily.
    pub(crate) fn connection_lost(&self) {
        self.notify(Notification::new(
            "Realtime connection lost",
            Severity::Warning,
            Duration::from_millis(3000),
        ));
    }

    fn on_server_error(&self, event: &StreamEvent) {
        tracing::warn!(data = %event.data, "Server reported a stream error");
        self.notify(Notification::new(
            "Realtime connection degraded",
            Severity::Warning,
            Duration::from_millis(3000),
        ));
    }

    /// Deserialize the opaque payload for this handler; a mismatched payload
    /// is logged and skipped, never fatal.
    fn payload<T: for<'de> Deserialize<'de>>(&self, event: &StreamEvent) -> Option<T> {
        match serde_json::from_value(event.data.clone()) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(kind = %event.kind, "Malformed event payload: {e}");
                None
            }
        }
    }

    fn invalidate_reservations(&self) {
        if !self.auto_update_cache {
            return;
        }
        if let Some(cache) = &self.cache {
            cache.invalidate(&QueryKey::reservations(self.business_id.clone()));
        }
    }

    fn broadcast(&self, signal: RefreshSignal) {
        // Fire-and-forget: no receivers is fine.
        let _ = self.refresh.send(signal);
    }

    fn notify(&self, notification: Notification) {
        if !self.show_notifications {
            return;
        }
        if let Some(notifier) = &self.notifier {
            notifier.notify(notification);
        }
    }
}
