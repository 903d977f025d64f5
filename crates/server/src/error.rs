//! Problem responses for the HTTP API.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use speakspace_shared::ProblemDetails;

use crate::catalog::CatalogError;
use crate::feedback::FeedbackError;

/// Handler error rendered as `application/problem+json`.
#[derive(Debug, Clone)]
pub struct ApiProblem(pub ProblemDetails);

impl From<ProblemDetails> for ApiProblem {
    fn from(problem: ProblemDetails) -> Self {
        Self(problem)
    }
}

impl IntoResponse for ApiProblem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.0)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

impl From<CatalogError> for ApiProblem {
    fn from(err: CatalogError) -> Self {
        let detail = err.to_string();
        let problem = match err {
            CatalogError::NotFound(_) => ProblemDetails::not_found(detail),
            CatalogError::NotModerator => ProblemDetails::forbidden(detail),
            CatalogError::AlreadyJoined | CatalogError::Full(_) => ProblemDetails::conflict(detail),
            CatalogError::TitleRequired
            | CatalogError::NoCapacity
            | CatalogError::EndsBeforeStart
            | CatalogError::NotPending(_)
            | CatalogError::NotJoined
            | CatalogError::InvalidTransition { .. } => ProblemDetails::bad_request(detail),
        };
        Self(problem)
    }
}

impl From<FeedbackError> for ApiProblem {
    fn from(err: FeedbackError) -> Self {
        Self(ProblemDetails::bad_request(err.to_string()))
    }
}
