//! Orchestrator behavior tests against a mock stream endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mesa_realtime::{
    ChangedField, ConnectionStatus, Notification, NotificationSink, QueryCache, QueryKey,
    RealtimeConfig, RealtimeError, RealtimeSync, ReconnectConfig, Severity,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingCache(Mutex<Vec<QueryKey>>);

impl RecordingCache {
    fn keys(&self) -> Vec<QueryKey> {
        self.0.lock().unwrap().clone()
    }
}

impl QueryCache for RecordingCache {
    fn invalidate(&self, key: &QueryKey) {
        self.0.lock().unwrap().push(key.clone());
    }
}

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<Notification>>);

impl RecordingNotifier {
    fn notifications(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

fn sse_body(events: &[serde_json::Value]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

fn config(server: &MockServer, delays_ms: &[u64], max_attempts: u32) -> RealtimeConfig {
    RealtimeConfig {
        endpoint: format!("{}/api/reservations/stream", server.uri()),
        enabled: true,
        debug: false,
        reconnect: ReconnectConfig {
            delays: delays_ms.iter().map(|&ms| Duration::from_millis(ms)).collect(),
            max_attempts,
        },
    }
}

async fn wait_for_requests(server: &MockServer, count: usize) {
    for _ in 0..200 {
        let received = server.received_requests().await.unwrap_or_default().len();
        if received >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("mock server never saw {count} requests");
}

#[tokio::test]
async fn delivers_events_to_handlers_in_order() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        serde_json::json!({"type": "connected", "data": {}, "timestamp": "t0"}),
        serde_json::json!({"type": "reservation-created", "data": {"reservationId": "R1", "customerName": "Ana"}, "timestamp": "t1"}),
        serde_json::json!({"type": "status-changed", "data": {"reservationId": "R1", "newStatus": "seated"}, "timestamp": "t2"}),
        serde_json::json!({"type": "status-changed", "data": {"reservationId": "R2", "newStatus": "cancelled"}, "timestamp": "t3"}),
        serde_json::json!({"type": "heartbeat", "data": {}, "timestamp": "t4"}),
    ]);

    Mock::given(method("GET"))
        .and(path("/api/reservations/stream"))
        .and(query_param("businessId", "biz-1"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let cache = Arc::new(RecordingCache::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let sync = RealtimeSync::builder("biz-1")
        .config(config(&server, &[60_000], 1))
        .cache(Arc::clone(&cache) as Arc<dyn QueryCache>)
        .notifier(Arc::clone(&notifier) as Arc<dyn NotificationSink>)
        .subscribe()
        .unwrap();
    let mut refresh = sync.refresh_signals();

    let first = tokio::time::timeout(Duration::from_secs(5), refresh.recv())
        .await
        .expect("timed out waiting for refresh signal")
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), refresh.recv())
        .await
        .expect("timed out waiting for refresh signal")
        .unwrap();

    // Signals arrive in server-emission order.
    assert_eq!(first.reservation_id, "R1");
    assert_eq!(first.change, Some(ChangedField::Status("seated".to_string())));
    assert_eq!(second.reservation_id, "R2");

    // reservation-created + two status changes touched the cache; the
    // connected/heartbeat records did not.
    let keys = cache.keys();
    assert_eq!(keys.len(), 3);
    assert!(keys.iter().all(|k| *k == QueryKey::reservations("biz-1")));

    let created: Vec<Notification> = notifier
        .notifications()
        .into_iter()
        .filter(|n| n.message.contains("New reservation"))
        .collect();
    assert_eq!(created.len(), 1);
    assert!(created[0].message.contains("Ana"));
    assert_eq!(created[0].severity, Severity::Success);
}

#[tokio::test]
async fn heartbeat_only_stream_has_no_domain_side_effects() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        serde_json::json!({"type": "heartbeat", "data": {}, "timestamp": "t1"}),
    ]);

    Mock::given(method("GET"))
        .and(path("/api/reservations/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let cache = Arc::new(RecordingCache::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let sync = RealtimeSync::builder("biz-1")
        .config(config(&server, &[60_000], 1))
        .cache(Arc::clone(&cache) as Arc<dyn QueryCache>)
        .notifier(Arc::clone(&notifier) as Arc<dyn NotificationSink>)
        .subscribe()
        .unwrap();

    // Let the stream be consumed to its end.
    wait_for_requests(&server, 1).await;
    let mut state = sync.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| s.status == ConnectionStatus::Reconnecting),
    )
    .await
    .expect("stream was never consumed")
    .unwrap();

    // Heartbeats prove liveness only: no cache or domain notifications.
    assert!(cache.keys().is_empty());
    assert!(
        notifier
            .notifications()
            .iter()
            .all(|n| n.message.contains("connection lost"))
    );
}

#[tokio::test]
async fn reconnects_until_exhausted_then_manual_reconnect_revives() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/reservations/stream"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let sync = RealtimeSync::builder("biz-1")
        .config(config(&server, &[50, 100], 2))
        .show_notifications(false)
        .subscribe()
        .unwrap();

    let mut state = sync.watch_state();
    let exhausted = tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| {
            s.status == ConnectionStatus::Disconnected
                && s.error.as_deref().is_some_and(|e| e.contains("2 attempts"))
        }),
    )
    .await
    .expect("never reported exhaustion");
    assert!(exhausted.is_ok());
    // `wait_for` hands back a `watch::Ref` read guard; release it before the
    // manual reconnect below, whose state writes would otherwise block on it.
    drop(exhausted);

    // Initial attempt plus two scheduled retries, nothing further.
    wait_for_requests(&server, 3).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    // Manual reconnect resets the counter and opens a fresh connection.
    sync.reconnect();
    wait_for_requests(&server, 4).await;
}

#[tokio::test]
async fn disconnect_cancels_pending_reconnect_timer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/reservations/stream"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sync = RealtimeSync::builder("biz-1")
        .config(config(&server, &[60_000], 5))
        .show_notifications(false)
        .subscribe()
        .unwrap();

    let mut state = sync.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| s.status == ConnectionStatus::Reconnecting),
    )
    .await
    .expect("never started reconnecting")
    .unwrap();

    sync.disconnect();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| s.status == ConnectionStatus::Disconnected),
    )
    .await
    .expect("never disconnected")
    .unwrap();

    // The pending timer is gone; no further connection opens.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    // Disconnect is idempotent.
    sync.disconnect();
    assert_eq!(sync.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn sustained_connections_reset_the_attempt_counter() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        serde_json::json!({"type": "heartbeat", "data": {}, "timestamp": "t"}),
    ]);

    // Two sustained connections, then hard failures.
    Mock::given(method("GET"))
        .and(path("/api/reservations/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/reservations/stream"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sync = RealtimeSync::builder("biz-1")
        .config(config(&server, &[50], 1))
        .show_notifications(false)
        .subscribe()
        .unwrap();

    // With max_attempts = 1, reaching a third request is only possible if
    // each sustained connection reset the counter to zero.
    wait_for_requests(&server, 3).await;

    let mut state = sync.watch_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| {
            s.status == ConnectionStatus::Disconnected
                && s.error.as_deref().is_some_and(|e| e.contains("1 attempts"))
        }),
    )
    .await
    .expect("never exhausted after the failing responses")
    .unwrap();
}

#[tokio::test]
async fn manual_reconnect_cancels_live_connection_first() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        serde_json::json!({"type": "heartbeat", "data": {}, "timestamp": "t"}),
    ]);
    Mock::given(method("GET"))
        .and(path("/api/reservations/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/event-stream")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let sync = RealtimeSync::builder("biz-1")
        .config(config(&server, &[60_000], 1))
        .show_notifications(false)
        .subscribe()
        .unwrap();

    wait_for_requests(&server, 1).await;
    sync.reconnect();
    // The first connection is cancelled and a second one opened; never two
    // live connections at once afterwards.
    wait_for_requests(&server, 2).await;
}

#[test]
fn guard_refusals() {
    let disabled = RealtimeSync::builder("biz-1").enabled(false).subscribe();
    assert!(matches!(disabled, Err(RealtimeError::Suppressed(_))));

    let no_tenant = RealtimeSync::builder("").subscribe();
    assert!(matches!(no_tenant, Err(RealtimeError::Suppressed(_))));

    let off_route = RealtimeSync::builder("biz-1")
        .route_guard(Arc::new(|| false))
        .subscribe();
    assert!(matches!(off_route, Err(RealtimeError::Suppressed(_))));
}
