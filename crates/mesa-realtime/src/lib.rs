//! Realtime reservation-dashboard sync client for the Mesa venue platform.
//!
//! Keeps a tenant's reservation dashboard synchronized with server-side state
//! changes (new reservation, QR scan, check-in, status change) over a
//! credentialed streaming HTTP request, with hand-rolled SSE-style framing,
//! staged reconnection, and type-routed dispatch into local cache and UI side
//! effects.
//!
//! ```no_run
//! use mesa_realtime::RealtimeSync;
//!
//! # async fn demo() -> mesa_realtime::Result<()> {
//! let sync = RealtimeSync::builder("biz-42").subscribe()?;
//! let mut refresh = sync.refresh_signals();
//! while let Ok(signal) = refresh.recv().await {
//!     println!("re-render reservation {}", signal.reservation_id);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(rust_2018_idioms)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod reconnect;
pub mod sinks;

mod connection;
mod handlers;
mod sync;

// Re-exports
pub use crate::config::{DEFAULT_STREAM_ENDPOINT, RealtimeConfig, ReconnectConfig};
pub use crate::decoder::FrameDecoder;
pub use crate::error::{RealtimeError, Result};
pub use crate::event::{ConnectionStatus, EventType, StreamEvent, SyncState};
pub use crate::reconnect::ReconnectController;
pub use crate::sinks::{
    ChangedField, Notification, NotificationSink, QueryCache, QueryKey, RefreshSignal, RouteGuard,
    Severity,
};
pub use crate::sync::{RealtimeSync, RealtimeSyncBuilder};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
