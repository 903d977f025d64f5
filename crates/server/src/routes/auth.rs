//! Authentication routes (register, login).

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use speakspace_shared::{LoginRequest, ProblemDetails, RegisterRequest, User, UserRole};

use crate::error::ApiProblem;
use crate::state::AppState;
use crate::store::StoreError;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn require(field: &str, value: &str) -> Result<(), ApiProblem> {
    if value.trim().is_empty() {
        return Err(ProblemDetails::bad_request(format!("{field} is required")).into());
    }
    Ok(())
}

/// Register a new user account
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, ApiProblem> {
    tracing::info!("Registering user: {}", payload.email);

    let role: UserRole = payload
        .role
        .parse()
        .map_err(|_| ProblemDetails::invalid_role(&payload.role))?;
    require("name", &payload.name)?;
    require("email", &payload.email)?;
    require("password", &payload.password)?;

    // Hash password
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("Hashing error: {}", e);
            ProblemDetails::internal_error("Failed to secure password")
        })?
        .to_string();

    let user = state
        .users
        .insert(&payload.name, &payload.email, role, password_hash)
        .await
        .map_err(|e| match e {
            StoreError::EmailTaken(_) => ProblemDetails::conflict(e.to_string()),
        })?;

    tracing::info!("Registered user {} as {}", user.id, user.role);
    Ok(Json(user))
}

/// Login to an existing account
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<User>, ApiProblem> {
    tracing::info!("Logging in user: {}", payload.email);

    let stored = state
        .users
        .find_by_email(&payload.email)
        .await
        .ok_or_else(|| ProblemDetails::unauthorized(INVALID_CREDENTIALS))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&stored.password_hash).map_err(|e| {
        tracing::error!("Stored hash for {} is invalid: {}", stored.user.id, e);
        ProblemDetails::internal_error("Stored credentials are unreadable")
    })?;
    Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .map_err(|_| ProblemDetails::unauthorized(INVALID_CREDENTIALS))?;

    Ok(Json(stored.user))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{api_router, state::AppState};

    async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Value, Option<String>) {
        let response = app
            .clone()
            .oneshot(
                Request::post(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap(), content_type)
    }

    fn registration(email: &str, role: &str) -> Value {
        json!({ "name": "Ana", "email": email, "password": "pw", "role": role })
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let app = api_router(AppState::new());

        let (status, user, _) = post(&app, "/api/auth/register", registration("ana@x.com", "evaluator")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["role"], json!("evaluator"));
        assert_eq!(user["email"], json!("ana@x.com"));

        let (status, logged_in, _) = post(
            &app,
            "/api/auth/login",
            json!({ "email": "ANA@x.com", "password": "pw" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logged_in["id"], user["id"]);
    }

    #[tokio::test]
    async fn test_register_rejects_unknown_role() {
        let state = AppState::new();
        let app = api_router(state.clone());

        let (status, problem, content_type) =
            post(&app, "/api/auth/register", registration("ana@x.com", "admin")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/problem+json"));
        assert!(problem["type"].as_str().unwrap().ends_with("/invalid-role"));
        assert_eq!(state.users.len().await, 0);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let app = api_router(AppState::new());
        post(&app, "/api/auth/register", registration("ana@x.com", "moderator")).await;

        let (status, problem, _) =
            post(&app, "/api/auth/register", registration("ana@x.com", "participant")).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(problem["status"], json!(409));
    }

    #[tokio::test]
    async fn test_register_requires_name() {
        let app = api_router(AppState::new());
        let (status, problem, _) = post(
            &app,
            "/api/auth/register",
            json!({ "name": " ", "email": "a@x.com", "password": "pw", "role": "participant" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(problem["detail"], json!("name is required"));
    }

    #[tokio::test]
    async fn test_login_failures_are_unauthorized() {
        let app = api_router(AppState::new());
        post(&app, "/api/auth/register", registration("ana@x.com", "participant")).await;

        let (status, _, _) = post(
            &app,
            "/api/auth/login",
            json!({ "email": "ana@x.com", "password": "wrong" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, problem, _) = post(
            &app,
            "/api/auth/login",
            json!({ "email": "nobody@x.com", "password": "pw" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(problem["detail"], json!("Invalid email or password"));
    }
}
