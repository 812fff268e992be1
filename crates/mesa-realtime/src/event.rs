//! Event taxonomy and wire types for the reservation stream.

use serde::{Deserialize, Serialize};

/// Event types carried on the stream.
///
/// The wire spelling is the kebab-case string in the `type` field of each
/// message. The taxonomy is extensible server-side; types this client does
/// not know about parse as [`EventType::Unknown`] and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    // Connection lifecycle
    /// Server acknowledged the subscription.
    Connected,
    /// Periodic liveness proof; never produces a side effect.
    Heartbeat,
    /// Server-reported stream error.
    Error,

    // Domain events
    /// A reservation QR code was scanned at the door.
    QrScanned,
    /// A reservation was created.
    ReservationCreated,
    /// A reservation was edited.
    ReservationUpdated,
    /// A reservation was deleted.
    ReservationDeleted,
    /// A reservation changed status (confirmed, seated, cancelled, ...).
    StatusChanged,
    /// The attendance count for a reservation changed.
    AttendanceUpdated,

    /// Anything this client does not recognize.
    Unknown,
}

impl EventType {
    /// Parse a wire type string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "connected" => Self::Connected,
            "heartbeat" => Self::Heartbeat,
            "error" => Self::Error,
            "qr-scanned" => Self::QrScanned,
            "reservation-created" => Self::ReservationCreated,
            "reservation-updated" => Self::ReservationUpdated,
            "reservation-deleted" => Self::ReservationDeleted,
            "status-changed" => Self::StatusChanged,
            "attendance-updated" => Self::AttendanceUpdated,
            _ => Self::Unknown,
        }
    }

    /// Wire spelling for known types.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Heartbeat => "heartbeat",
            Self::Error => "error",
            Self::QrScanned => "qr-scanned",
            Self::ReservationCreated => "reservation-created",
            Self::ReservationUpdated => "reservation-updated",
            Self::ReservationDeleted => "reservation-deleted",
            Self::StatusChanged => "status-changed",
            Self::AttendanceUpdated => "attendance-updated",
            Self::Unknown => "unknown",
        }
    }
}

/// One decoded record from the stream.
///
/// The payload shape depends on `kind` and is interpreted only by the handler
/// registered for that type; the raw type string is kept so unknown types can
/// be logged verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Wire type string, drawn from the event taxonomy.
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Server-side emission timestamp, opaque to this client.
    #[serde(default)]
    pub timestamp: String,
}

impl StreamEvent {
    /// Taxonomy type of this record.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        EventType::parse(&self.kind)
    }
}

/// Connection status of a subscription. Exactly one value at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No live connection and none pending.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The stream is open and delivering events.
    Connected,
    /// A reconnect timer is pending after an involuntary termination.
    Reconnecting,
    /// The last connection attempt failed.
    Error,
}

/// Snapshot published on the status watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncState {
    /// Current connection status.
    pub status: ConnectionStatus,
    /// Human-readable message for the last connection-level failure.
    pub error: Option<String>,
}
