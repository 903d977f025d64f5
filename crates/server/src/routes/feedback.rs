//! Evaluator feedback routes.

use axum::{extract::State, Json};
use speakspace_shared::{CreateFeedbackRequest, Feedback, FeedbackCategory, UserRole};

use crate::error::ApiProblem;
use crate::middleware::actor::CurrentUser;
use crate::state::AppState;

pub async fn list_categories(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Json<Vec<FeedbackCategory>> {
    Json(state.feedback.categories().to_vec())
}

/// Score a participant of a session. Evaluators only.
pub async fn submit_feedback(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateFeedbackRequest>,
) -> Result<Json<Feedback>, ApiProblem> {
    user.require_role(UserRole::Evaluator, "submit feedback")?;

    let session = state.catalog.get(&payload.session_id).await?;
    let feedback = state.feedback.submit(&user.0.id, &session, payload).await?;
    tracing::info!(
        "Evaluator {} rated {} in session {}",
        feedback.evaluator_id,
        feedback.recipient_id,
        feedback.session_id
    );
    Ok(Json(feedback))
}

pub async fn feedback_given(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<Vec<Feedback>> {
    Json(state.feedback.given(&user.0.id).await)
}

pub async fn feedback_received(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<Vec<Feedback>> {
    Json(state.feedback.received(&user.0.id).await)
}
