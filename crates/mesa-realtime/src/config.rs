//! Configuration for the realtime sync client.

use std::time::Duration;

/// Default stream endpoint, overridable per deployment.
pub const DEFAULT_STREAM_ENDPOINT: &str = "http://127.0.0.1:3000/api/reservations/stream";

/// Reconnection tunables: staged delay schedule plus an attempt cap.
///
/// The delay for attempt *n* is `delays[min(n, delays.len() - 1)]`, so the
/// backoff grows through the configured stages and then plateaus at the last
/// entry. Once `max_attempts` involuntary terminations have been counted the
/// controller stops scheduling and the subscription reports exhaustion.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// Ordered delay schedule, indexed by attempt number.
    pub delays: Vec<Duration>,
    /// Maximum automatic attempts before giving up (manual reconnect resets).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ],
            max_attempts: 10,
        }
    }
}

/// Options for a realtime subscription.
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// Stream endpoint URL; the business id is appended as a query parameter.
    pub endpoint: String,
    /// Master switch. When false, subscriptions are refused at build time.
    pub enabled: bool,
    /// Gates the chattier per-event logging.
    pub debug: bool,
    /// Reconnection schedule and cap.
    pub reconnect: ReconnectConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STREAM_ENDPOINT.to_string(),
            enabled: true,
            debug: false,
            reconnect: ReconnectConfig::default(),
        }
    }
}
