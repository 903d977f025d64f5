//! The realtime session channel.

use std::sync::{Arc, Mutex, MutexGuard};

use futures_channel::mpsc::UnboundedSender;
use futures_util::StreamExt;
use speakspace_shared::{
    decode_frame, encode_frame, AuthPayload, ChatMessage, ClientEvent, EventKind, OutgoingMessage,
    Participant, ServerEvent, SessionRef, SpeakingTime, WsEnvelope, SOCKET_PATH,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use super::connection::{
    ConnectionState, Connector, ReconnectConfig, TransportError, TransportLink,
    TungsteniteConnector,
};
use super::listeners::{ListenerRegistry, Subscription};
use crate::config::ClientConfig;

/// One logical connection to the realtime broker.
///
/// Clones share the same connection and listeners. Create one per
/// application and pass it to whatever needs to emit or subscribe.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    endpoint: String,
    reconnect: ReconnectConfig,
    connector: Arc<dyn Connector>,
    state: watch::Sender<ConnectionState>,
    link: Mutex<LinkSlot>,
    listeners: Arc<ListenerRegistry>,
}

/// Bookkeeping for the live connection task.
///
/// `epoch` increases on every connect and disconnect; a task only writes
/// state while its epoch is current.
#[derive(Default)]
struct LinkSlot {
    epoch: u64,
    auth: Option<AuthPayload>,
    task: Option<JoinHandle<()>>,
    outbound: Option<UnboundedSender<String>>,
}

impl RealtimeChannel {
    /// Channel speaking WebSocket to the broker named in `config`.
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_connector(
            config.ws_base_url(),
            ReconnectConfig::default(),
            Arc::new(TungsteniteConnector),
        )
    }

    pub fn with_connector(
        endpoint: impl Into<String>,
        reconnect: ReconnectConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ChannelInner {
                endpoint: endpoint.into(),
                reconnect,
                connector,
                state,
                link: Mutex::new(LinkSlot::default()),
                listeners: Arc::new(ListenerRegistry::default()),
            }),
        }
    }

    /// Open the connection, authenticating as `user_id` in `session_id`.
    ///
    /// No-op while a connection is open or being established. Must be called
    /// from within a tokio runtime.
    pub fn connect(&self, user_id: impl Into<String>, session_id: impl Into<String>) {
        let mut slot = self.inner.slot();
        if slot.task.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("Realtime channel already active, ignoring connect");
            return;
        }

        let auth = AuthPayload {
            user_id: user_id.into(),
            session_id: session_id.into(),
        };
        slot.epoch += 1;
        let epoch = slot.epoch;

        let url = match socket_url(&self.inner.endpoint, &auth) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Cannot connect to realtime broker: {}", e);
                slot.task = None;
                self.inner.state.send_replace(ConnectionState::Failed {
                    reason: e.to_string(),
                });
                return;
            }
        };

        tracing::info!(
            "Connecting to realtime broker as {} in session {}",
            auth.user_id,
            auth.session_id
        );
        slot.auth = Some(auth);
        self.inner.state.send_replace(ConnectionState::Connecting);
        slot.task = Some(tokio::spawn(run_connection(
            self.inner.clone(),
            epoch,
            url,
        )));
    }

    /// Close the connection and stop reconnecting. No-op when not connected.
    pub fn disconnect(&self) {
        let mut slot = self.inner.slot();
        let Some(task) = slot.task.take() else {
            return;
        };
        slot.epoch += 1;
        slot.outbound = None;
        task.abort();
        self.inner.state.send_replace(ConnectionState::Disconnected);
        tracing::info!("Disconnected from realtime broker");
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_connected()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Credentials of the most recent `connect`.
    pub fn auth(&self) -> Option<AuthPayload> {
        self.inner.slot().auth.clone()
    }

    pub fn send_message(&self, message: OutgoingMessage) {
        self.emit(ClientEvent::Message(message));
    }

    pub fn join_session(&self, session_id: impl Into<String>) {
        self.emit(ClientEvent::JoinSession(SessionRef {
            session_id: session_id.into(),
        }));
    }

    pub fn leave_session(&self, session_id: impl Into<String>) {
        self.emit(ClientEvent::LeaveSession(SessionRef {
            session_id: session_id.into(),
        }));
    }

    pub fn start_speaking(&self) {
        self.emit(ClientEvent::StartSpeaking);
    }

    pub fn stop_speaking(&self) {
        self.emit(ClientEvent::StopSpeaking);
    }

    pub fn on_message<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        self.inner.listeners.add(EventKind::Message, move |event| {
            if let ServerEvent::Message(message) = event {
                callback(message.clone());
            }
        })
    }

    pub fn on_user_join<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Participant) + Send + Sync + 'static,
    {
        self.inner.listeners.add(EventKind::UserJoined, move |event| {
            if let ServerEvent::UserJoined(participant) = event {
                callback(participant.clone());
            }
        })
    }

    /// The callback receives the id of the user who left.
    pub fn on_user_leave<F>(&self, callback: F) -> Subscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.inner.listeners.add(EventKind::UserLeft, move |event| {
            if let ServerEvent::UserLeft(user_id) = event {
                callback(user_id.clone());
            }
        })
    }

    pub fn on_speaking_time<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SpeakingTime) + Send + Sync + 'static,
    {
        self.inner.listeners.add(EventKind::SpeakingTime, move |event| {
            if let ServerEvent::SpeakingTime(time) = event {
                callback(time.clone());
            }
        })
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.count(kind)
    }

    /// Fire-and-forget. Dropped with a debug log while disconnected.
    fn emit(&self, event: ClientEvent) {
        let name = event.name();
        let frame = match encode_frame(&WsEnvelope::new(event)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode {}: {}", name, e);
                return;
            }
        };

        let slot = self.inner.slot();
        match &slot.outbound {
            Some(tx) if tx.unbounded_send(frame).is_ok() => {
                tracing::debug!("Emitted {}", name);
            }
            _ => tracing::debug!("Dropping {} while disconnected", name),
        }
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ChannelInner {
    fn slot(&self) -> MutexGuard<'_, LinkSlot> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish `state` if `epoch` is still current.
    fn set_state(&self, epoch: u64, state: ConnectionState) -> bool {
        let slot = self.slot();
        if slot.epoch != epoch {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    /// Forward inbound frames to listeners until the link closes.
    async fn pump(&self, epoch: u64, link: TransportLink) {
        let TransportLink {
            outgoing,
            mut incoming,
        } = link;

        {
            let mut slot = self.slot();
            if slot.epoch != epoch {
                return;
            }
            slot.outbound = Some(outgoing);
            self.state.send_replace(ConnectionState::Connected);
        }
        tracing::info!("Connected to realtime broker");

        while let Some(text) = incoming.next().await {
            self.deliver(&text);
        }

        let mut slot = self.slot();
        if slot.epoch == epoch {
            slot.outbound = None;
        }
    }

    fn deliver(&self, text: &str) {
        match decode_frame::<ServerEvent>(text) {
            Ok(envelope) => {
                let kind = envelope.payload.kind();
                let invoked = self.listeners.dispatch(&envelope.payload);
                tracing::trace!("Delivered {} to {} listeners", kind.name(), invoked);
            }
            Err(e) => tracing::warn!("Discarding inbound frame: {}", e),
        }
    }
}

/// Connect, then keep reconnecting with the configured delay until the
/// attempts run out.
async fn run_connection(inner: Arc<ChannelInner>, epoch: u64, url: String) {
    let max_attempts = inner.reconnect.max_attempts;
    let mut attempt = 0u32;

    loop {
        let reason = match inner.connector.open(&url).await {
            Ok(link) => {
                attempt = 0;
                inner.pump(epoch, link).await;
                tracing::warn!("Realtime connection closed");
                "connection closed".to_string()
            }
            Err(e) => {
                tracing::warn!("Realtime connect failed: {}", e);
                e.to_string()
            }
        };

        if attempt >= max_attempts {
            tracing::error!(
                "Giving up on realtime broker after {} reconnect attempts",
                max_attempts
            );
            inner.set_state(epoch, ConnectionState::Failed { reason });
            return;
        }

        attempt += 1;
        if !inner.set_state(epoch, ConnectionState::Reconnecting { attempt }) {
            return;
        }
        let delay = inner.reconnect.delay_for_attempt(attempt);
        tracing::info!(
            "Reconnecting in {:?} (attempt {}/{})",
            delay,
            attempt,
            max_attempts
        );
        tokio::time::sleep(delay).await;
    }
}

/// `<endpoint>/socket?userId=..&sessionId=..`
fn socket_url(endpoint: &str, auth: &AuthPayload) -> Result<String, TransportError> {
    let mut url = Url::parse(endpoint).map_err(|e| TransportError::Endpoint(e.to_string()))?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), SOCKET_PATH);
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("userId", &auth.user_id)
        .append_pair("sessionId", &auth.session_id);
    Ok(url.into())
}
