//! Resolves the acting user for catalog and feedback routes.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use speakspace_shared::{ProblemDetails, User, UserRole, HEADER_USER_ID};

use crate::error::ApiProblem;
use crate::state::AppState;

/// Registered user named by the `x-speakspace-user` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// 403 unless the user holds `role`.
    pub fn require_role(&self, role: UserRole, action: &str) -> Result<(), ApiProblem> {
        if self.0.role != role {
            return Err(ProblemDetails::forbidden(format!("only a {role} can {action}")).into());
        }
        Ok(())
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiProblem;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        let user_id = parts
            .headers
            .get(HEADER_USER_ID)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        async move {
            let Some(user_id) = user_id else {
                return Err(
                    ProblemDetails::unauthorized(format!("{HEADER_USER_ID} header is required"))
                        .into(),
                );
            };

            match app_state.users.find_by_id(&user_id).await {
                Some(user) => Ok(CurrentUser(user)),
                None => {
                    tracing::warn!("Request from unknown user {}", user_id);
                    Err(ProblemDetails::unauthorized(format!("unknown user {user_id}")).into())
                }
            }
        }
    }
}
