//! Session catalog routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use speakspace_shared::{
    ChatMessage, CreateSessionRequest, PracticeSession, SessionStatus,
    UpdateSessionStatusRequest, UserRole,
};

use crate::error::ApiProblem;
use crate::middleware::actor::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
}

/// List sessions, optionally only those with `?status=`
pub async fn list_sessions(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<PracticeSession>>, ApiProblem> {
    Ok(Json(state.catalog.list(query.status).await))
}

/// Schedule a new session moderated by the caller
pub async fn create_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<PracticeSession>, ApiProblem> {
    user.require_role(UserRole::Moderator, "create sessions")?;

    let session = state.catalog.create(&user.0.id, payload).await?;
    tracing::info!("User {} created session {}", user.0.id, session.id);
    Ok(Json(session))
}

pub async fn get_session(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PracticeSession>, ApiProblem> {
    Ok(Json(state.catalog.get(&id).await?))
}

pub async fn join_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PracticeSession>, ApiProblem> {
    let session = state.catalog.join(&id, &user.0.id).await?;
    tracing::info!(
        "User {} joined session {} ({}/{})",
        user.0.id,
        id,
        session.participants.len(),
        session.max_participants
    );
    Ok(Json(session))
}

pub async fn leave_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PracticeSession>, ApiProblem> {
    let session = state.catalog.leave(&id, &user.0.id).await?;
    tracing::info!("User {} left session {}", user.0.id, id);
    Ok(Json(session))
}

/// Advance a session to its next status
pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSessionStatusRequest>,
) -> Result<Json<PracticeSession>, ApiProblem> {
    let session = state
        .catalog
        .set_status(&id, &user.0.id, payload.status)
        .await?;
    tracing::info!("Session {} is now {}", id, session.status);
    Ok(Json(session))
}

/// Chat recorded by the broker for a room
pub async fn room_messages(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Json<Vec<ChatMessage>> {
    Json(state.hub.history(&id).await)
}
