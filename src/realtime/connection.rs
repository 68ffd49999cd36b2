//! Connection Manager
//!
//! Owns the one WebSocket session of a roster. Each session runs in its own
//! task that forwards outbound frames and reports inbound frames and the
//! final close back to the manager. Sessions carry an id; a close reported
//! by a session that is no longer current (replaced, or deliberately
//! disconnected) is ignored, so only unintended closes of the live session
//! schedule a reconnect.
//!
//! The public operations are synchronous and only spawn tasks, so they can be
//! called from the reconnect timer and from session tasks alike. They must be
//! called from within a tokio runtime.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::state::{
    ConnectionEvent, ConnectionState, ConnectionStats, TransportError, ABNORMAL_CLOSURE,
    NORMAL_CLOSURE,
};
use crate::config::RealtimeConfig;

/// Close reason used by `reconnect`
pub const MANUAL_RECONNECT_REASON: &str = "Manual reconnect";

/// Close reason used by `shutdown`
pub const SHUTDOWN_REASON: &str = "Roster torn down";

/// Close code reported when the peer closed without a status code
const NO_STATUS_RECEIVED: u16 = 1005;

enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

struct Session {
    id: u64,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Shared {
    state: ConnectionState,
    session: Option<Session>,
    next_session_id: u64,
    reconnect_timer: Option<JoinHandle<()>>,
    /// Identifies the armed timer; bumped whenever a pending reconnect is
    /// cancelled so a timer already past its sleep cannot connect
    timer_token: u64,
    last_error: Option<TransportError>,
}

impl Shared {
    fn cancel_reconnect(&mut self) -> bool {
        self.timer_token += 1;
        match self.reconnect_timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

struct Inner {
    url: String,
    auto_reconnect: bool,
    reconnect_interval: Duration,
    manual_reconnect_delay: Duration,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    shared: Mutex<Shared>,
    shut_down: AtomicBool,
    reconnects_scheduled: AtomicU64,
    sessions_opened: AtomicU64,
    frames_received: AtomicU64,
}

/// Manages the live WebSocket connection
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a manager for `url`; lifecycle signals arrive on the receiver
    ///
    /// Nothing is opened until `connect` is called.
    pub fn new(
        url: impl Into<String>,
        config: &RealtimeConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            url: url.into(),
            auto_reconnect: config.auto_reconnect,
            reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
            manual_reconnect_delay: Duration::from_millis(config.manual_reconnect_delay_ms),
            events,
            shared: Mutex::new(Shared::default()),
            shut_down: AtomicBool::new(false),
            reconnects_scheduled: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Open a session unless one is already open or opening
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Close the session deliberately; never triggers a reconnect
    pub fn disconnect(&self, reason: &str) {
        self.inner.disconnect(reason);
    }

    /// Disconnect, pause briefly, connect again
    pub async fn reconnect(&self) {
        self.inner.disconnect(MANUAL_RECONNECT_REASON);
        tokio::time::sleep(self.inner.manual_reconnect_delay).await;
        self.inner.connect();
    }

    /// Queue a text frame; `false` if no session is open
    pub fn send(&self, payload: impl Into<String>) -> bool {
        let shared = self.inner.shared.lock();
        match (&shared.session, shared.state) {
            (Some(session), ConnectionState::Connected) => session
                .outbound
                .send(Outbound::Text(payload.into()))
                .is_ok(),
            _ => {
                tracing::warn!(state = %shared.state, "Cannot send, live connection is not open");
                false
            }
        }
    }

    /// Reconnect if the session is gone (host became active again)
    pub fn check_alive(&self) {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return;
        }
        let alive = {
            let shared = self.inner.shared.lock();
            shared
                .session
                .as_ref()
                .is_some_and(|session| !session.task.is_finished())
        };
        if !alive {
            tracing::info!("Live connection not alive, reconnecting");
            self.inner.connect();
        }
    }

    /// Close for good: cancel any timer, close the session, refuse new ones
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.disconnect(SHUTDOWN_REASON);
        tracing::debug!(url = %self.inner.url, "Connection manager shut down");
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    pub fn last_error(&self) -> Option<TransportError> {
        self.inner.shared.lock().last_error.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn stats(&self) -> ConnectionStats {
        let shared = self.inner.shared.lock();
        ConnectionStats {
            state: shared.state,
            last_error: shared.last_error.as_ref().map(ToString::to_string),
            reconnects_scheduled: self.inner.reconnects_scheduled.load(Ordering::Relaxed),
            sessions_opened: self.inner.sessions_opened.load(Ordering::Relaxed),
            frames_received: self.inner.frames_received.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    fn emit(&self, event: ConnectionEvent) {
        // Receiver gone means the roster was dropped; nothing to notify
        let _ = self.events.send(event);
    }

    fn connect(self: &Arc<Self>) {
        let mut shared = self.shared.lock();
        self.connect_locked(&mut shared);
    }

    fn connect_locked(self: &Arc<Self>, shared: &mut Shared) {
        if self.shut_down.load(Ordering::SeqCst) {
            tracing::debug!("Connect ignored after shutdown");
            return;
        }
        if let Some(session) = &shared.session {
            if !session.task.is_finished() {
                tracing::debug!(session_id = session.id, "Session already open or opening");
                return;
            }
        }
        shared.cancel_reconnect();

        shared.next_session_id += 1;
        let id = shared.next_session_id;
        shared.state = ConnectionState::Connecting;

        let (outbound, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(Arc::clone(self), id, rx));
        shared.session = Some(Session { id, outbound, task });

        tracing::info!(session_id = id, url = %self.url, "Opening live connection");
    }

    fn disconnect(&self, reason: &str) {
        let mut shared = self.shared.lock();
        if shared.cancel_reconnect() {
            tracing::debug!("Pending reconnect cancelled");
        }
        let session = shared.session.take();
        shared.state = ConnectionState::Disconnected;
        drop(shared);

        let Some(session) = session else {
            tracing::debug!(reason, "Disconnect without an open session");
            return;
        };

        let close = Outbound::Close {
            code: NORMAL_CLOSURE,
            reason: reason.to_string(),
        };
        if session.outbound.send(close).is_err() {
            session.task.abort();
        }

        tracing::info!(session_id = session.id, reason, "Live connection closed deliberately");
        self.emit(ConnectionEvent::Closed {
            code: NORMAL_CLOSURE,
            reason: reason.to_string(),
        });
    }

    /// Mark session `id` open; `false` if it was superseded while opening
    fn opened(&self, id: u64) -> bool {
        let mut shared = self.shared.lock();
        if shared.session.as_ref().map(|s| s.id) != Some(id) {
            return false;
        }
        shared.state = ConnectionState::Connected;
        shared.last_error = None;
        drop(shared);

        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        tracing::info!(session_id = id, url = %self.url, "Live connection open");
        self.emit(ConnectionEvent::Connected);
        true
    }

    fn open_failed(self: &Arc<Self>, id: u64, error: TransportError) {
        {
            let mut shared = self.shared.lock();
            if shared.session.as_ref().map(|s| s.id) != Some(id) {
                return;
            }
            shared.session = None;
            shared.state = ConnectionState::Disconnected;
            shared.last_error = Some(error.clone());
        }

        tracing::warn!(session_id = id, error = %error, "Live connection failed to open");
        self.emit(ConnectionEvent::Error(error.clone()));
        self.emit(ConnectionEvent::Closed {
            code: ABNORMAL_CLOSURE,
            reason: error.to_string(),
        });
        self.schedule_reconnect();
    }

    fn closed(self: &Arc<Self>, id: u64, code: u16, reason: String) {
        {
            let mut shared = self.shared.lock();
            if shared.session.as_ref().map(|s| s.id) != Some(id) {
                tracing::debug!(session_id = id, code, "Close of a superseded session ignored");
                return;
            }
            shared.session = None;
            shared.state = ConnectionState::Disconnected;
        }

        tracing::info!(session_id = id, code, reason = %reason, "Live connection closed");
        self.emit(ConnectionEvent::Closed { code, reason });

        if code != NORMAL_CLOSURE {
            self.schedule_reconnect();
        }
    }

    fn record_error(&self, error: TransportError) {
        tracing::warn!(error = %error, "Live connection error");
        self.shared.lock().last_error = Some(error.clone());
        self.emit(ConnectionEvent::Error(error));
    }

    /// Arm the reconnect timer unless one is already pending
    fn schedule_reconnect(self: &Arc<Self>) {
        if !self.auto_reconnect || self.shut_down.load(Ordering::SeqCst) {
            return;
        }

        let mut shared = self.shared.lock();
        if let Some(timer) = &shared.reconnect_timer {
            if !timer.is_finished() {
                tracing::debug!("Reconnect already pending");
                return;
            }
        }

        shared.state = ConnectionState::Reconnecting;
        shared.timer_token += 1;
        let token = shared.timer_token;
        let delay = self.reconnect_interval;
        let inner = Arc::clone(self);
        shared.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.reconnect_fired(token);
        }));
        drop(shared);

        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
        tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
    }

    /// Timer `token` elapsed; connect unless it was cancelled meanwhile
    fn reconnect_fired(self: &Arc<Self>, token: u64) {
        let mut shared = self.shared.lock();
        if shared.timer_token != token || shared.state != ConnectionState::Reconnecting {
            tracing::debug!(token, "Cancelled reconnect timer ignored");
            return;
        }
        // Drop our own handle so connect_locked does not abort this task
        shared.reconnect_timer = None;
        self.connect_locked(&mut shared);
    }
}

/// Drive one session from open to close
async fn run_session(inner: Arc<Inner>, id: u64, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
    let ws = match connect_async(inner.url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            let error = TransportError::Connect {
                url: inner.url.clone(),
                error: e.to_string(),
            };
            inner.open_failed(id, error);
            return;
        }
    };

    let (mut sink, mut stream) = ws.split();

    if !inner.opened(id) {
        tracing::debug!(session_id = id, "Session superseded while opening");
        let _ = sink.send(Message::Close(Some(close_frame(NORMAL_CLOSURE, "")))).await;
        return;
    }

    let (code, reason) = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        inner.record_error(TransportError::Send(e.to_string()));
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let _ = sink.send(Message::Close(Some(close_frame(code, &reason)))).await;
                    break (code, reason);
                }
                // Manager dropped the session handle without a close request
                None => {
                    let _ = sink.send(Message::Close(Some(close_frame(NORMAL_CLOSURE, "")))).await;
                    break (NORMAL_CLOSURE, String::new());
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    inner.frames_received.fetch_add(1, Ordering::Relaxed);
                    inner.emit(ConnectionEvent::Message(text.to_string()));
                }
                Some(Ok(Message::Close(frame))) => {
                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                        None => (NO_STATUS_RECEIVED, String::new()),
                    };
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::debug!(session_id = id, "Binary frame ignored");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    inner.record_error(TransportError::Dropped(e.to_string()));
                    break (ABNORMAL_CLOSURE, e.to_string());
                }
                None => break (ABNORMAL_CLOSURE, "stream ended".to_string()),
            },
        }
    };

    inner.closed(id, code, reason);
}

fn close_frame(code: u16, reason: &str) -> CloseFrame {
    CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_string().into(),
    }
}
