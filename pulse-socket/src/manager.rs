//! Socket connection manager.
//!
//! Owns the session for the real-time channel: transport lifecycle,
//! authentication handshake, automatic reconnection with linear backoff,
//! subscription replay, and event routing to the dispatcher.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use pulse_core::config::SocketConfig;
use pulse_core::constants;
use pulse_core::error::{PulseError, PulseResult};

use crate::dispatcher::{Dispatcher, ListenerId};
use crate::events::{EventKind, ServerFrame};
use crate::registry::{ChannelType, Subscription, SubscriptionRegistry};
use crate::transport::{ClientFrame, Connector, Transport, TransportEvent};

/// Configuration for socket reconnection behavior.
///
/// Delays grow linearly: attempt `n` (1-indexed) waits `base_delay * n`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Base delay between reconnection attempts.
    pub base_delay: Duration,
    /// Maximum number of consecutive attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(constants::SOCKET_RECONNECT_BASE_DELAY_MS),
            max_attempts: constants::SOCKET_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Build a policy from the socket section of the app config.
    pub fn from_config(config: &SocketConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Delay before the given attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Whether the given number of completed attempts exhausts the policy.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

/// Connection state for the socket manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect.
    Disconnected,
    /// Attempting to establish a connection.
    Connecting,
    /// Connected and receiving events.
    Connected,
    /// Connection lost, a retry is scheduled.
    Reconnecting,
    /// Retries exhausted; requires explicit disconnect + connect.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Mutable per-connection state, guarded by one lock.
///
/// The generation counter invalidates stale timer and dial callbacks after
/// a disconnect: every callback re-checks it under the lock before acting.
struct Session {
    transport: Option<Arc<dyn Transport>>,
    connected: bool,
    authenticated: bool,
    reconnect_attempts: u32,
    generation: u64,
    token: Option<String>,
    /// Set while a replay is owed for the current transport; cleared once
    /// the replay runs so it happens exactly once per open.
    pending_replay: bool,
    reconnect_timer: Option<JoinHandle<()>>,
    pump_task: Option<JoinHandle<()>>,
    rooms_waiters: Vec<oneshot::Sender<Vec<String>>>,
}

impl Session {
    fn new() -> Self {
        Self {
            transport: None,
            connected: false,
            authenticated: false,
            reconnect_attempts: 0,
            generation: 0,
            token: None,
            pending_replay: false,
            reconnect_timer: None,
            pump_task: None,
            rooms_waiters: Vec::new(),
        }
    }
}

struct Inner {
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    dispatcher: Dispatcher,
    registry: Mutex<SubscriptionRegistry>,
    session: Mutex<Session>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Socket connection manager.
///
/// The single externally-visible object for the real-time channel,
/// constructed once by the application's composition root. Handles:
/// - Connection lifecycle with an injected [`Connector`]
/// - Authentication handshake once a transport opens
/// - Automatic reconnection with linear backoff (5s, 10s, 15s, ...)
/// - Durable subscriptions replayed against every new transport
/// - Event routing to registered listeners
#[derive(Clone)]
pub struct SocketManager {
    inner: Arc<Inner>,
}

impl SocketManager {
    /// Create a new SocketManager for the given endpoint.
    pub fn new(url: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                connector,
                policy: ReconnectPolicy::default(),
                dispatcher: Dispatcher::new(),
                registry: Mutex::new(SubscriptionRegistry::new()),
                session: Mutex::new(Session::new()),
                state_tx,
            }),
        }
    }

    /// Set a custom reconnection policy. Only valid before `connect`.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.policy = policy,
            None => warn!("with_policy ignored: manager already shared"),
        }
        self
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Whether the transport is currently open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether the session has been server-confirmed as authenticated.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.session.lock().await.authenticated
    }

    /// Number of consecutive reconnection attempts so far.
    pub async fn reconnect_attempts(&self) -> u32 {
        self.inner.session.lock().await.reconnect_attempts
    }

    /// Snapshot of the tracked subscriptions, in insertion order.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.registry.lock().await.iter().cloned().collect()
    }

    /// Update the connection state and notify watchers.
    fn set_state(inner: &Arc<Inner>, new_state: ConnectionState) {
        let prev = *inner.state_tx.borrow();
        if prev != new_state {
            info!("socket state: {prev} -> {new_state}");
            inner.state_tx.send_replace(new_state);
        }
    }

    /// Begin the connection lifecycle.
    ///
    /// If a transport already exists (live or awaiting its retry) this is a
    /// logged no-op. The optional token is sent in the authentication
    /// handshake once the transport opens. Returns once the attempt is
    /// underway; progress is observed via the state watcher and listeners.
    pub async fn connect(&self, token: Option<String>) -> PulseResult<()> {
        let gen = {
            let mut session = self.inner.session.lock().await;
            if session.transport.is_some() {
                debug!("socket already active, ignoring connect");
                return Ok(());
            }
            let state = self.state();
            if state == ConnectionState::Connecting || state == ConnectionState::Reconnecting {
                debug!("connect already in progress ({state}), ignoring");
                return Ok(());
            }
            if state == ConnectionState::Failed {
                debug!("socket in failed state; disconnect() first to reset");
                return Ok(());
            }
            session.token = token;
            session.reconnect_attempts = 0;
            // State changes happen under the session lock so a concurrent
            // disconnect() cannot be overwritten by a stale transition.
            Self::set_state(&self.inner, ConnectionState::Connecting);
            session.generation
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            Self::open_transport(inner, gen).await;
        });
        Ok(())
    }

    /// Tear down the session: cancel any pending reconnect timer, close the
    /// transport, and reset connection state. Idempotent; no timer fires and
    /// no event is dispatched after this returns.
    pub async fn disconnect(&self) {
        {
            let mut session = self.inner.session.lock().await;
            session.generation += 1;
            if let Some(timer) = session.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(pump) = session.pump_task.take() {
                pump.abort();
            }
            if let Some(transport) = session.transport.take() {
                transport.close();
            }
            session.connected = false;
            session.authenticated = false;
            session.pending_replay = false;
            session.reconnect_attempts = 0;
            session.token = None;
            session.rooms_waiters.clear();
            Self::set_state(&self.inner, ConnectionState::Disconnected);
        }
        info!("socket disconnected");
    }

    /// Track a channel subscription and, when connected, subscribe on the
    /// wire immediately. While disconnected the registry mutation alone
    /// takes effect; the wire request is issued on the next successful
    /// (re)connect via replay.
    pub async fn subscribe(&self, channel: ChannelType, target: impl Into<String>) {
        let target = target.into();
        let is_new = self.inner.registry.lock().await.add(channel.clone(), target.clone());
        if !is_new {
            debug!("already subscribed to {channel}:{target}");
            return;
        }

        let session = self.inner.session.lock().await;
        if session.connected {
            if let Some(transport) = &session.transport {
                if let Err(e) = transport.send(ClientFrame::Subscribe {
                    channel: channel.clone(),
                    target: target.clone(),
                }) {
                    warn!("subscribe send failed for {channel}:{target}: {e}");
                }
            }
        } else {
            warn!("socket not connected, subscription {channel}:{target} deferred to next connect");
        }
    }

    /// Remove a channel subscription and, when connected, unsubscribe on
    /// the wire immediately. Idempotent.
    pub async fn unsubscribe(&self, channel: ChannelType, target: impl Into<String>) {
        let target = target.into();
        let removed = self.inner.registry.lock().await.remove(&channel, &target);
        if !removed {
            debug!("not subscribed to {channel}:{target}, nothing to remove");
            return;
        }

        let session = self.inner.session.lock().await;
        if session.connected {
            if let Some(transport) = &session.transport {
                if let Err(e) = transport.send(ClientFrame::Unsubscribe {
                    channel: channel.clone(),
                    target: target.clone(),
                }) {
                    warn!("unsubscribe send failed for {channel}:{target}: {e}");
                }
            }
        } else {
            warn!("socket not connected, unsubscribe {channel}:{target} is registry-only");
        }
    }

    /// Register a listener for an inbound event kind.
    pub fn on<F>(&self, event: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.inner.dispatcher.register(event, handler)
    }

    /// Remove a listener by its handle.
    pub fn off(&self, event: &EventKind, id: ListenerId) -> bool {
        self.inner.dispatcher.unregister(event, id)
    }

    /// Send a liveness probe if connected. No-op otherwise; never queued.
    pub async fn ping(&self) {
        let session = self.inner.session.lock().await;
        if session.connected {
            if let Some(transport) = &session.transport {
                if let Err(e) = transport.send(ClientFrame::Ping) {
                    warn!("ping send failed: {e}");
                }
            }
        } else {
            debug!("socket not connected, ping skipped");
        }
    }

    /// Ask the server which rooms this connection is in.
    ///
    /// Resolves to an empty list immediately when disconnected. Otherwise
    /// waits for the server's `rooms` frame, erroring if none arrives in
    /// time.
    pub async fn get_rooms(&self) -> PulseResult<Vec<String>> {
        let rx = {
            let mut session = self.inner.session.lock().await;
            if !session.connected {
                return Ok(Vec::new());
            }
            let Some(transport) = &session.transport else {
                return Ok(Vec::new());
            };
            if let Err(e) = transport.send(ClientFrame::GetRooms) {
                warn!("get_rooms send failed: {e}");
                return Ok(Vec::new());
            }
            let (tx, rx) = oneshot::channel();
            session.rooms_waiters.push(tx);
            rx
        };

        let timeout = Duration::from_secs(constants::GET_ROOMS_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(rooms)) => Ok(rooms),
            // Waiter dropped: the transport went away mid-request.
            Ok(Err(_)) => Ok(Vec::new()),
            Err(_) => Err(PulseError::Timeout("get_rooms got no answer".into())),
        }
    }

    // --- Internal lifecycle ---

    /// Dial a new transport. On success the event pump takes over; on
    /// failure the retry path is entered.
    fn open_transport(inner: Arc<Inner>, gen: u64) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            debug!("dialing {}", inner.url);
            match inner.connector.connect(&inner.url).await {
                Ok((transport, events)) => {
                    let mut session = inner.session.lock().await;
                    if session.generation != gen {
                        debug!("session reset while dialing, discarding transport");
                        transport.close();
                        return;
                    }
                    session.transport = Some(transport);
                    let pump_inner = Arc::clone(&inner);
                    session.pump_task = Some(tokio::spawn(async move {
                        Self::event_pump(pump_inner, events, gen).await;
                    }));
                }
                Err(e) => {
                    warn!("socket connect failed: {e}");
                    Self::handle_transport_down(inner, gen, format!("connect error: {e}")).await;
                }
            }
        })
    }

    /// Drain one transport's event stream until it dies.
    async fn event_pump(
        inner: Arc<Inner>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        gen: u64,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Opened => {
                    Self::handle_open(&inner, gen).await;
                }
                TransportEvent::Frame(frame) => {
                    Self::handle_frame(&inner, gen, frame).await;
                }
                TransportEvent::Closed { reason } => {
                    warn!("socket closed: {reason}");
                    Self::handle_transport_down(Arc::clone(&inner), gen, reason).await;
                    break;
                }
                TransportEvent::Error { message } => {
                    warn!("socket transport error: {message}");
                    Self::handle_transport_down(Arc::clone(&inner), gen, message).await;
                    break;
                }
            }
        }
    }

    /// The transport reported open: reset the attempt counter, start the
    /// handshake, and replay subscriptions (immediately when no token is in
    /// play, otherwise once the auth exchange answers).
    async fn handle_open(inner: &Arc<Inner>, gen: u64) {
        let mut session = inner.session.lock().await;
        if session.generation != gen {
            return;
        }
        session.connected = true;
        session.reconnect_attempts = 0;
        info!("socket connected");
        Self::set_state(inner, ConnectionState::Connected);

        match session.token.clone() {
            Some(token) => {
                session.pending_replay = true;
                if let Some(transport) = &session.transport {
                    if let Err(e) = transport.send(ClientFrame::Authenticate { token }) {
                        warn!("authenticate send failed: {e}");
                    }
                }
            }
            None => {
                Self::replay_subscriptions(inner, &mut session).await;
            }
        }
    }

    /// Route one inbound frame: update handshake/rooms state, then hand it
    /// to the dispatcher.
    async fn handle_frame(inner: &Arc<Inner>, gen: u64, frame: ServerFrame) {
        match &frame.event {
            EventKind::AuthSuccess => {
                let mut session = inner.session.lock().await;
                if session.generation == gen {
                    session.authenticated = true;
                    info!("socket authenticated");
                    if session.pending_replay {
                        Self::replay_subscriptions(inner, &mut session).await;
                    }
                }
            }
            EventKind::AuthError => {
                // Permissive policy: the transport stays open for public
                // events; only the authenticated flag reflects the failure.
                warn!("socket authentication failed: {}", frame.data);
                let mut session = inner.session.lock().await;
                if session.generation == gen && session.pending_replay {
                    Self::replay_subscriptions(inner, &mut session).await;
                }
            }
            EventKind::Rooms => {
                if let Some(rooms) = frame.as_rooms() {
                    let mut session = inner.session.lock().await;
                    if session.generation == gen {
                        for waiter in session.rooms_waiters.drain(..) {
                            let _ = waiter.send(rooms.clone());
                        }
                    }
                }
            }
            EventKind::Message => {
                debug!("notification frame: {}", frame.data);
            }
            EventKind::SubscribeError => {
                warn!("subscribe rejected by server: {}", frame.data);
            }
            other => {
                debug!("socket event: {}", other.as_str());
            }
        }

        inner.dispatcher.dispatch(&frame.event, &frame.data);
    }

    /// Re-establish every tracked subscription against the current
    /// transport. Runs at most once per transport open.
    async fn replay_subscriptions(inner: &Arc<Inner>, session: &mut Session) {
        session.pending_replay = false;
        let registry = inner.registry.lock().await;
        if registry.is_empty() {
            return;
        }
        if let Some(transport) = &session.transport {
            registry.replay_all(|sub| {
                if let Err(e) = transport.send(ClientFrame::Subscribe {
                    channel: sub.channel.clone(),
                    target: sub.target.clone(),
                }) {
                    warn!("resubscribe send failed for {sub}: {e}");
                }
            });
            info!("replayed {} subscription(s)", registry.len());
        }
    }

    /// The transport is gone (close, transport error, or dial failure):
    /// record the loss and schedule a retry, or give up once the policy is
    /// exhausted. The dead transport object is kept until the retry timer
    /// (or an explicit disconnect) tears it down.
    async fn handle_transport_down(inner: Arc<Inner>, gen: u64, reason: String) {
        let mut session = inner.session.lock().await;
        if session.generation != gen {
            return;
        }
        session.connected = false;
        session.authenticated = false;
        session.pending_replay = false;
        session.rooms_waiters.clear();

        if inner.policy.is_exhausted(session.reconnect_attempts) {
            error!(
                "socket lost ({reason}); max reconnection attempts ({}) reached, giving up",
                inner.policy.max_attempts
            );
            Self::set_state(&inner, ConnectionState::Failed);
            return;
        }

        if let Some(timer) = session.reconnect_timer.take() {
            timer.abort();
        }

        session.reconnect_attempts += 1;
        let attempt = session.reconnect_attempts;
        let delay = inner.policy.delay_for_attempt(attempt);
        Self::set_state(&inner, ConnectionState::Reconnecting);
        warn!(
            "socket lost ({reason}); reconnect attempt {attempt}/{} in {:.1}s",
            inner.policy.max_attempts,
            delay.as_secs_f64()
        );

        let timer_inner = Arc::clone(&inner);
        session.reconnect_timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            Self::retry_connect(timer_inner, gen).await;
        }));
    }

    /// Retry-timer body: verify the session wasn't reset while waiting,
    /// tear down the stale transport, and dial again.
    async fn retry_connect(inner: Arc<Inner>, gen: u64) {
        {
            let mut session = inner.session.lock().await;
            if session.generation != gen {
                debug!("reconnect timer fired after session reset, aborting");
                return;
            }
            session.reconnect_timer = None;
            if let Some(transport) = session.transport.take() {
                transport.close();
            }
            if let Some(pump) = session.pump_task.take() {
                pump.abort();
            }
            Self::set_state(&inner, ConnectionState::Connecting);
        }
        Self::open_transport(inner, gen).await;
    }
}
