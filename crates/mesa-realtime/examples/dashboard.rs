//! Minimal dashboard wiring: subscribe to one tenant's stream and print
//! every state change, refresh signal, and notification.
//!
//! Usage: `cargo run --example dashboard -- <business-id>`

use std::sync::Arc;

use mesa_realtime::{
    Notification, NotificationSink, QueryCache, QueryKey, RealtimeSync,
};

struct StdoutNotifier;

impl NotificationSink for StdoutNotifier {
    fn notify(&self, n: Notification) {
        println!("[{:?}] {}", n.severity, n.message);
    }
}

struct StdoutCache;

impl QueryCache for StdoutCache {
    fn invalidate(&self, key: &QueryKey) {
        println!("cache stale: {}/{}", key.collection, key.business_id);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let business_id = std::env::args().nth(1).unwrap_or_else(|| "demo".to_string());
    let sync = RealtimeSync::builder(business_id)
        .cache(Arc::new(StdoutCache))
        .notifier(Arc::new(StdoutNotifier))
        .subscribe()?;

    let mut refresh = sync.refresh_signals();
    let mut state = sync.watch_state();
    loop {
        tokio::select! {
            signal = refresh.recv() => match signal {
                Ok(signal) => println!("refresh: {signal:?}"),
                Err(_) => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                println!("status: {:?} ({:?})", snapshot.status, snapshot.error);
            }
        }
    }
    Ok(())
}
