//! Error types for mesa-realtime.

use thiserror::Error;

/// Result type alias for mesa-realtime operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;

/// Error type for mesa-realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// HTTP transport error while opening or reading the stream.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The stream endpoint answered with a non-success status.
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        body: String,
    },

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The subscription guards refused to open a stream.
    ///
    /// Returned by the builder when the feature is disabled, no business id
    /// was supplied, or the route predicate reports the dashboard is not
    /// mounted.
    #[error("Realtime sync suppressed: {0}")]
    Suppressed(String),

    /// Automatic reconnection gave up after the configured attempt cap.
    #[error("Could not reconnect after {0} attempts")]
    Exhausted(u32),
}
