//! Realtime sync orchestrator.
//!
//! Binds one tenant subscription's lifecycle to the domain handlers: owns at
//! most one live stream connection and one pending reconnect timer, publishes
//! connection status to the UI layer, and exposes manual `reconnect` /
//! `disconnect` controls.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::RealtimeConfig;
use crate::connection::{self, StreamOutcome};
use crate::error::{RealtimeError, Result};
use crate::event::{ConnectionStatus, SyncState};
use crate::handlers::EventRouter;
use crate::reconnect::ReconnectController;
use crate::sinks::{NotificationSink, QueryCache, RefreshSignal, RouteGuard};

/// Control messages from the subscription handle into the driver task.
#[derive(Debug)]
enum Command {
    /// Reset the backoff counter and connect immediately.
    Reconnect,
    /// Tear down the live connection or pending timer; stay idle.
    Disconnect,
}

/// Builder for a tenant subscription.
///
/// Refuses to open a stream unless a business id is supplied, the feature is
/// enabled, and the route guard (when present) reports that the dashboard is
/// mounted.
pub struct RealtimeSyncBuilder {
    business_id: String,
    config: RealtimeConfig,
    cache: Option<Arc<dyn QueryCache>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    route_guard: Option<RouteGuard>,
    enabled: bool,
    show_notifications: bool,
    auto_update_cache: bool,
    http: Option<reqwest::Client>,
}

impl RealtimeSyncBuilder {
    fn new(business_id: impl Into<String>) -> Self {
        Self {
            business_id: business_id.into(),
            config: RealtimeConfig::default(),
            cache: None,
            notifier: None,
            route_guard: None,
            enabled: true,
            show_notifications: true,
            auto_update_cache: true,
            http: None,
        }
    }

    /// Use this configuration instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: RealtimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Cache to invalidate when domain events arrive.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sink for user-facing notifications.
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Predicate restricting the subscription to the dashboard's routes.
    #[must_use]
    pub fn route_guard(mut self, guard: RouteGuard) -> Self {
        self.route_guard = Some(guard);
        self
    }

    /// Per-subscription enable switch (default true).
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether handlers emit user-facing notifications (default true).
    #[must_use]
    pub fn show_notifications(mut self, show: bool) -> Self {
        self.show_notifications = show;
        self
    }

    /// Whether handlers invalidate the local cache (default true).
    #[must_use]
    pub fn auto_update_cache(mut self, update: bool) -> Self {
        self.auto_update_cache = update;
        self
    }

    /// Share an existing HTTP client (must carry a cookie store for
    /// credentialed requests).
    #[must_use]
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Open the subscription and start connecting.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Suppressed`] when a guard refuses the
    /// subscription, or an error if the endpoint URL is invalid or the HTTP
    /// client cannot be built.
    pub fn subscribe(self) -> Result<RealtimeSync> {
        if self.business_id.is_empty() {
            return Err(RealtimeError::Suppressed("no business id".into()));
        }
        if !(self.config.enabled && self.enabled) {
            return Err(RealtimeError::Suppressed("realtime sync is disabled".into()));
        }
        if let Some(guard) = &self.route_guard
            && !guard()
        {
            return Err(RealtimeError::Suppressed(
                "dashboard route is not active".into(),
            ));
        }

        let url = connection::stream_url(&self.config.endpoint, &self.business_id)?;
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder().cookie_store(true).build()?,
        };

        let (state_tx, state_rx) = watch::channel(SyncState::default());
        let (refresh_tx, _) = broadcast::channel(64);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let router = Arc::new(EventRouter::new(
            self.business_id.clone(),
            self.cache,
            self.notifier,
            refresh_tx.clone(),
            self.auto_update_cache,
            self.show_notifications,
            self.config.debug,
        ));

        let driver = Driver {
            http,
            url,
            state_tx,
            router,
            controller: ReconnectController::new(self.config.reconnect.clone()),
            commands: command_rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run());

        Ok(RealtimeSync {
            business_id: self.business_id,
            state_rx,
            refresh_tx,
            commands: command_tx,
            cancel,
            _task: task,
        })
    }
}

/// Handle to an active tenant subscription.
///
/// Dropping the handle tears the subscription down.
pub struct RealtimeSync {
    business_id: String,
    state_rx: watch::Receiver<SyncState>,
    refresh_tx: broadcast::Sender<RefreshSignal>,
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
    _task: tokio::task::JoinHandle<()>,
}

impl RealtimeSync {
    /// Start building a subscription for one tenant.
    pub fn builder(business_id: impl Into<String>) -> RealtimeSyncBuilder {
        RealtimeSyncBuilder::new(business_id)
    }

    /// Tenant this subscription is scoped to.
    #[must_use]
    pub fn business_id(&self) -> &str {
        &self.business_id
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state_rx.borrow().clone()
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.state_rx.borrow().status
    }

    /// Message for the last connection-level failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state_rx.borrow().error.clone()
    }

    /// Whether the stream is currently delivering events.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Watch channel mirroring the state snapshot.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }

    /// Subscribe to record refresh signals.
    #[must_use]
    pub fn refresh_signals(&self) -> broadcast::Receiver<RefreshSignal> {
        self.refresh_tx.subscribe()
    }

    /// Manually reconnect: resets the backoff counter, bypasses the attempt
    /// cap, and connects immediately. Any live connection or pending timer
    /// is cancelled first.
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    /// Disconnect intentionally. Cancels any pending reconnect timer and the
    /// live connection; no automatic reconnection happens afterwards.
    /// Idempotent: disconnecting an already-disconnected subscription is a
    /// no-op.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }
}

impl Drop for RealtimeSync {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a single connection attempt ended, from the driver's point of view.
enum ConnectionEnd {
    /// The caller asked to stop; do not reconnect.
    Intentional,
    /// The caller asked for a fresh connection right away.
    Manual,
    /// Network/server dropped the stream.
    Involuntary {
        message: String,
        /// Whether at least one record was delivered before the drop; a
        /// sustained connection resets the attempt counter.
        sustained: bool,
    },
}

/// Outcome of waiting out a scheduled reconnect delay.
enum TimerEnd {
    Fired,
    Disconnect,
    Reconnect,
    Shutdown,
}

/// Per-subscription driver task. Owns the connection/timer state machine so
/// that only one of either can exist at a time.
struct Driver {
    http: reqwest::Client,
    url: Url,
    state_tx: watch::Sender<SyncState>,
    router: Arc<EventRouter>,
    controller: ReconnectController,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        // Connect as soon as the subscription is created.
        let mut active = true;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            if !active {
                tokio::select! {
                    cmd = self.commands.recv() => match cmd {
                        Some(Command::Reconnect) => {
                            tracing::debug!("Manual reconnect requested");
                            self.controller.reset();
                            active = true;
                        }
                        Some(Command::Disconnect) => {}
                        None => return,
                    },
                    () = self.cancel.cancelled() => return,
                }
                continue;
            }

            match self.connect_once().await {
                ConnectionEnd::Intentional => {
                    self.set_state(ConnectionStatus::Disconnected, None);
                    tracing::debug!("Disconnected");
                    active = false;
                }
                ConnectionEnd::Manual => {
                    self.controller.reset();
                }
                ConnectionEnd::Involuntary { message, sustained } => {
                    self.set_state(ConnectionStatus::Error, Some(message.clone()));
                    self.router.connection_lost();
                    if sustained {
                        self.controller.reset();
                    }
                    match self.controller.next_delay() {
                        Some(delay) => {
                            self.set_state(ConnectionStatus::Reconnecting, Some(message));
                            tracing::debug!(
                                attempt = self.controller.attempts(),
                                max = self.controller.max_attempts(),
                                ?delay,
                                "Scheduling reconnect"
                            );
                            match self.wait_reconnect(delay).await {
                                TimerEnd::Fired => {}
                                TimerEnd::Reconnect => self.controller.reset(),
                                TimerEnd::Disconnect => {
                                    self.set_state(ConnectionStatus::Disconnected, None);
                                    active = false;
                                }
                                TimerEnd::Shutdown => return,
                            }
                        }
                        None => {
                            let max = self.controller.max_attempts();
                            tracing::warn!(max, "Reconnect attempts exhausted");
                            self.set_state(
                                ConnectionStatus::Disconnected,
                                Some(RealtimeError::Exhausted(max).to_string()),
                            );
                            active = false;
                        }
                    }
                }
            }
        }
    }

    /// Run one connection to termination, watching the command channel so a
    /// manual disconnect/reconnect can cancel the in-flight connection.
    async fn connect_once(&mut self) -> ConnectionEnd {
        self.set_state(ConnectionStatus::Connecting, None);

        let conn_cancel = self.cancel.child_token();
        let saw_event = Arc::new(AtomicBool::new(false));

        let on_open = {
            let state_tx = self.state_tx.clone();
            move || {
                state_tx.send_replace(SyncState {
                    status: ConnectionStatus::Connected,
                    error: None,
                });
            }
        };
        let on_event = {
            let router = Arc::clone(&self.router);
            let saw_event = Arc::clone(&saw_event);
            move |event| {
                saw_event.store(true, Ordering::Release);
                router.dispatch(&event);
            }
        };

        let mut conn = pin!(connection::run(
            &self.http,
            self.url.clone(),
            &conn_cancel,
            on_open,
            on_event,
        ));

        let mut intentional = false;
        let mut manual = false;
        let mut commands_closed = false;
        let outcome = loop {
            if commands_closed {
                break (&mut conn).await;
            }
            tokio::select! {
                outcome = &mut conn => break outcome,
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Disconnect) => {
                        intentional = true;
                        conn_cancel.cancel();
                    }
                    Some(Command::Reconnect) => {
                        manual = true;
                        conn_cancel.cancel();
                    }
                    // The handle was dropped; tear down.
                    None => {
                        intentional = true;
                        commands_closed = true;
                        conn_cancel.cancel();
                    }
                },
            }
        };

        if intentional {
            return ConnectionEnd::Intentional;
        }
        if manual {
            return ConnectionEnd::Manual;
        }

        let sustained = saw_event.load(Ordering::Acquire);
        match outcome {
            // The subscription handle was dropped; treat as intentional.
            Ok(StreamOutcome::Cancelled) => ConnectionEnd::Intentional,
            Ok(StreamOutcome::ClosedByServer) => ConnectionEnd::Involuntary {
                message: "Stream closed by server".to_string(),
                sustained,
            },
            Ok(StreamOutcome::ReadError(e)) => ConnectionEnd::Involuntary {
                message: format!("Stream read error: {e}"),
                sustained,
            },
            Err(e) => ConnectionEnd::Involuntary {
                message: e.to_string(),
                sustained,
            },
        }
    }

    /// Wait out a reconnect delay; a command or shutdown cancels the timer.
    async fn wait_reconnect(&mut self, delay: Duration) -> TimerEnd {
        tokio::select! {
            () = tokio::time::sleep(delay) => TimerEnd::Fired,
            cmd = self.commands.recv() => match cmd {
                Some(Command::Disconnect) => TimerEnd::Disconnect,
                Some(Command::Reconnect) => TimerEnd::Reconnect,
                None => TimerEnd::Shutdown,
            },
            () = self.cancel.cancelled() => TimerEnd::Shutdown,
        }
    }

    fn set_state(&self, status: ConnectionStatus, error: Option<String>) {
        self.state_tx.send_replace(SyncState { status, error });
    }
}
