//! WebSocket session broker.
//!
//! Each session id maps to a broadcast room. A socket is in at most one room
//! at a time; joining another room leaves the current one.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use speakspace_shared::{
    decode_frame, encode_frame, AuthPayload, ChatMessage, ClientEvent, OutgoingMessage,
    Participant, ProblemDetails, ServerEvent, SpeakingTime, WsEnvelope,
};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::ApiProblem;
use crate::state::AppState;

const ROOM_CAPACITY: usize = 100;
/// Messages kept per session for `GET /api/rooms/{id}/messages`.
pub const HISTORY_LIMIT: usize = 200;

type Frame = WsEnvelope<ServerEvent>;

/// Accumulated speaking time for one user in one session.
#[derive(Debug, Default, Clone)]
pub struct SpeakingClock {
    total: Duration,
    started: Option<Instant>,
}

impl SpeakingClock {
    pub fn is_speaking(&self) -> bool {
        self.started.is_some()
    }

    /// Starting an already running clock keeps the original start.
    pub fn start(&mut self, now: Instant) {
        self.started.get_or_insert(now);
    }

    pub fn stop(&mut self, now: Instant) {
        if let Some(started) = self.started.take() {
            self.total += now.saturating_duration_since(started);
        }
    }

    /// Total including the running turn.
    pub fn total(&self, now: Instant) -> Duration {
        match self.started {
            Some(started) => self.total + now.saturating_duration_since(started),
            None => self.total,
        }
    }
}

struct Room {
    tx: broadcast::Sender<Frame>,
    members: HashSet<Uuid>,
}

#[derive(Default)]
struct HubState {
    rooms: HashMap<String, Room>,
    clocks: HashMap<(String, String), SpeakingClock>,
    history: HashMap<String, VecDeque<ChatMessage>>,
}

/// Registry of live session rooms.
#[derive(Clone, Default)]
pub struct SessionHub {
    inner: Arc<RwLock<HubState>>,
}

impl SessionHub {
    /// Add a connection to `session_id`'s room, creating the room if needed.
    pub async fn join(&self, conn_id: Uuid, session_id: &str) -> broadcast::Receiver<Frame> {
        let mut hub = self.inner.write().await;
        let room = hub
            .rooms
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::info!("Opening room {}", session_id);
                Room {
                    tx: broadcast::channel(ROOM_CAPACITY).0,
                    members: HashSet::new(),
                }
            });
        room.members.insert(conn_id);
        room.tx.subscribe()
    }

    /// Remove a connection. The room and its clocks go away with the last member.
    pub async fn leave(&self, conn_id: Uuid, session_id: &str) {
        let mut hub = self.inner.write().await;
        let Some(room) = hub.rooms.get_mut(session_id) else {
            return;
        };
        room.members.remove(&conn_id);
        if room.members.is_empty() {
            hub.rooms.remove(session_id);
            hub.clocks.retain(|(session, _), _| session != session_id);
            tracing::info!("Closed empty room {}", session_id);
        }
    }

    /// Append to the session's history, dropping the oldest past the limit.
    /// History outlives the room.
    pub async fn record_message(&self, message: ChatMessage) {
        let mut hub = self.inner.write().await;
        let log = hub.history.entry(message.session_id.clone()).or_default();
        if log.len() == HISTORY_LIMIT {
            log.pop_front();
        }
        log.push_back(message);
    }

    /// Recorded messages, oldest first.
    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.inner
            .read()
            .await
            .history
            .get(session_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Send to everyone in the room, returning how many receivers got it.
    pub async fn broadcast(&self, session_id: &str, event: ServerEvent) -> usize {
        let hub = self.inner.read().await;
        match hub.rooms.get(session_id) {
            Some(room) => room.tx.send(WsEnvelope::new(event)).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn start_speaking(&self, session_id: &str, user_id: &str) -> SpeakingTime {
        self.update_clock(session_id, user_id, |clock, now| clock.start(now))
            .await
    }

    pub async fn stop_speaking(&self, session_id: &str, user_id: &str) -> SpeakingTime {
        self.update_clock(session_id, user_id, |clock, now| clock.stop(now))
            .await
    }

    async fn update_clock(
        &self,
        session_id: &str,
        user_id: &str,
        update: impl FnOnce(&mut SpeakingClock, Instant),
    ) -> SpeakingTime {
        let now = Instant::now();
        let mut hub = self.inner.write().await;
        let clock = hub
            .clocks
            .entry((session_id.to_string(), user_id.to_string()))
            .or_default();
        update(clock, now);

        SpeakingTime {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            speaking: clock.is_speaking(),
            total_seconds: clock.total(now).as_secs(),
        }
    }

    pub async fn is_speaking(&self, session_id: &str, user_id: &str) -> bool {
        self.inner
            .read()
            .await
            .clocks
            .get(&(session_id.to_string(), user_id.to_string()))
            .is_some_and(SpeakingClock::is_speaking)
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    pub async fn member_count(&self, session_id: &str) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(session_id)
            .map_or(0, |room| room.members.len())
    }
}

/// Both handshake parameters must be present and non-blank.
fn check_handshake(auth: &AuthPayload) -> Result<(), ApiProblem> {
    for (field, value) in [("userId", &auth.user_id), ("sessionId", &auth.session_id)] {
        if value.trim().is_empty() {
            return Err(ProblemDetails::bad_request(format!("{field} is required"))
                .with_instance(speakspace_shared::SOCKET_PATH)
                .into());
        }
    }
    Ok(())
}

/// WebSocket upgrade handler
///
/// The handshake `sessionId` is only logged; rooms are entered with
/// `session:join`.
pub async fn socket_handler(
    State(state): State<AppState>,
    Query(auth): Query<AuthPayload>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiProblem> {
    check_handshake(&auth)?;

    tracing::info!(
        "WebSocket connection for user {} (session {})",
        auth.user_id,
        auth.session_id
    );
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, auth, state.hub)))
}

/// Per-socket room membership.
struct SocketSession {
    conn_id: Uuid,
    user_id: String,
    room: Option<String>,
    relay: Option<JoinHandle<()>>,
}

impl SocketSession {
    async fn handle(
        &mut self,
        event: ClientEvent,
        hub: &SessionHub,
        forward_tx: &mpsc::UnboundedSender<Frame>,
    ) {
        match event {
            ClientEvent::JoinSession(target) => {
                self.leave_room(hub).await;

                let mut room_rx = hub.join(self.conn_id, &target.session_id).await;
                let forward_tx = forward_tx.clone();
                let session_id = target.session_id.clone();
                self.relay = Some(tokio::spawn(async move {
                    loop {
                        match room_rx.recv().await {
                            Ok(frame) => {
                                if forward_tx.send(frame).is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                tracing::warn!("Relay for {} skipped {} frames", session_id, skipped);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }));
                self.room = Some(target.session_id.clone());

                tracing::debug!("User {} joined {}", self.user_id, target.session_id);
                let joined = Participant {
                    user_id: self.user_id.clone(),
                    session_id: target.session_id.clone(),
                };
                hub.broadcast(&target.session_id, ServerEvent::UserJoined(joined))
                    .await;
            }

            ClientEvent::LeaveSession(target) => {
                if self.room.as_deref() == Some(target.session_id.as_str()) {
                    self.leave_room(hub).await;
                } else {
                    tracing::debug!(
                        "User {} left {} without being in it",
                        self.user_id,
                        target.session_id
                    );
                }
            }

            ClientEvent::Message(message) => {
                let Some(session_id) = self.room.clone() else {
                    tracing::debug!("Ignoring message from {} outside a room", self.user_id);
                    return;
                };
                let chat = stamp(message, &self.user_id, &session_id);
                hub.record_message(chat.clone()).await;
                hub.broadcast(&session_id, ServerEvent::Message(chat)).await;
            }

            ClientEvent::StartSpeaking => {
                if let Some(session_id) = self.room.clone() {
                    let time = hub.start_speaking(&session_id, &self.user_id).await;
                    hub.broadcast(&session_id, ServerEvent::SpeakingTime(time))
                        .await;
                }
            }

            ClientEvent::StopSpeaking => {
                if let Some(session_id) = self.room.clone() {
                    let time = hub.stop_speaking(&session_id, &self.user_id).await;
                    hub.broadcast(&session_id, ServerEvent::SpeakingTime(time))
                        .await;
                }
            }
        }
    }

    /// Stop relaying, settle any running clock, then tell the room.
    async fn leave_room(&mut self, hub: &SessionHub) {
        if let Some(relay) = self.relay.take() {
            relay.abort();
        }
        let Some(session_id) = self.room.take() else {
            return;
        };

        if hub.is_speaking(&session_id, &self.user_id).await {
            let time = hub.stop_speaking(&session_id, &self.user_id).await;
            hub.broadcast(&session_id, ServerEvent::SpeakingTime(time))
                .await;
        }
        hub.broadcast(&session_id, ServerEvent::UserLeft(self.user_id.clone()))
            .await;
        hub.leave(self.conn_id, &session_id).await;
        tracing::debug!("User {} left {}", self.user_id, session_id);
    }
}

fn stamp(message: OutgoingMessage, sender_id: &str, session_id: &str) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        sender_id: sender_id.to_string(),
        sender_name: message.sender_name,
        sender_role: message.sender_role,
        content: message.content,
        timestamp: chrono::Utc::now(),
    }
}

async fn handle_socket(socket: WebSocket, auth: AuthPayload, hub: SessionHub) {
    let (mut sender, mut receiver) = socket.split();
    let (forward_tx, mut forward_rx) = mpsc::unbounded_channel::<Frame>();

    // Task to forward room frames to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = forward_rx.recv().await {
            let json = match encode_frame(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Dropping outbound frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = SocketSession {
        conn_id: Uuid::new_v4(),
        user_id: auth.user_id.clone(),
        room: None,
        relay: None,
    };

    // Main receive loop
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match decode_frame::<ClientEvent>(text.as_str()) {
                Ok(envelope) => session.handle(envelope.payload, &hub, &forward_tx).await,
                Err(e) => tracing::warn!("Discarding frame from {}: {}", auth.user_id, e),
            },
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // Cleanup
    session.leave_room(&hub).await;
    send_task.abort();

    tracing::info!("WebSocket connection closed for user: {}", auth.user_id);
}
