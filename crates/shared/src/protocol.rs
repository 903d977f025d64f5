//! Realtime wire protocol shared by the session channel and the broker.
//!
//! Every frame is a JSON [`WsEnvelope`] whose payload is flattened next to the
//! envelope fields:
//!
//! ```json
//! { "id": "…", "event": "session:join", "data": { "sessionId": "s1" }, "ts": "…" }
//! ```
//!
//! Event names are the contract surface, so they live here as constants and
//! are pinned onto the enum variants with `#[serde(rename)]`.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::{ChatMessage, OutgoingMessage, Participant, SessionRef, SpeakingTime};

pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_SESSION_JOIN: &str = "session:join";
pub const EVENT_SESSION_LEAVE: &str = "session:leave";
pub const EVENT_SPEAKING_START: &str = "speaking:start";
pub const EVENT_SPEAKING_STOP: &str = "speaking:stop";
pub const EVENT_USER_JOIN: &str = "user:join";
pub const EVENT_USER_LEAVE: &str = "user:leave";
pub const EVENT_SPEAKING_TIME: &str = "speaking:time";

/// Path the broker accepts WebSocket upgrades on.
pub const SOCKET_PATH: &str = "/socket";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WsEnvelope<T> {
    pub id: String,
    #[serde(flatten)]
    pub payload: T,
    pub ts: DateTime<Utc>,
}

impl<T> WsEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            ts: Utc::now(),
        }
    }
}

/// Events a client emits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "message")]
    Message(OutgoingMessage),
    #[serde(rename = "session:join")]
    JoinSession(SessionRef),
    #[serde(rename = "session:leave")]
    LeaveSession(SessionRef),
    #[serde(rename = "speaking:start")]
    StartSpeaking,
    #[serde(rename = "speaking:stop")]
    StopSpeaking,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Message(_) => EVENT_MESSAGE,
            ClientEvent::JoinSession(_) => EVENT_SESSION_JOIN,
            ClientEvent::LeaveSession(_) => EVENT_SESSION_LEAVE,
            ClientEvent::StartSpeaking => EVENT_SPEAKING_START,
            ClientEvent::StopSpeaking => EVENT_SPEAKING_STOP,
        }
    }
}

/// Events the broker delivers to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message")]
    Message(ChatMessage),
    #[serde(rename = "user:join")]
    UserJoined(Participant),
    /// Carries only the id of the user who left.
    #[serde(rename = "user:leave")]
    UserLeft(String),
    #[serde(rename = "speaking:time")]
    SpeakingTime(SpeakingTime),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Message(_) => EventKind::Message,
            ServerEvent::UserJoined(_) => EventKind::UserJoined,
            ServerEvent::UserLeft(_) => EventKind::UserLeft,
            ServerEvent::SpeakingTime(_) => EventKind::SpeakingTime,
        }
    }
}

/// Discriminant of [`ServerEvent`], used to key subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    UserJoined,
    UserLeft,
    SpeakingTime,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Message => EVENT_MESSAGE,
            EventKind::UserJoined => EVENT_USER_JOIN,
            EventKind::UserLeft => EVENT_USER_LEAVE,
            EventKind::SpeakingTime => EVENT_SPEAKING_TIME,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

pub fn encode_frame<T: Serialize>(envelope: &WsEnvelope<T>) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(ProtocolError::Encode)
}

/// Decode a text frame. Unknown event names and payloads that do not match
/// the event's shape are both rejected here rather than surfacing later.
pub fn decode_frame<T: DeserializeOwned>(text: &str) -> Result<WsEnvelope<T>, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}
