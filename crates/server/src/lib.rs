//! SpeakSpace Server
//!
//! HTTP API (health, accounts, session catalog, feedback, chat history) and
//! the realtime session broker, each exposed as its own router so they can be
//! served on separate ports. The API and the broker share one [`AppState`].

use axum::{
    routing::{get, post},
    Router,
};
use speakspace_shared::SOCKET_PATH;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod catalog;
pub mod config;
pub mod error;
pub mod feedback;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;
pub mod ws;

pub use config::ServerConfig;
pub use state::AppState;

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Routes served on `PORT`.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/test", get(routes::health::test))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route(
            "/api/sessions",
            get(routes::sessions::list_sessions).post(routes::sessions::create_session),
        )
        .route("/api/sessions/{id}", get(routes::sessions::get_session))
        .route("/api/sessions/{id}/join", post(routes::sessions::join_session))
        .route("/api/sessions/{id}/leave", post(routes::sessions::leave_session))
        .route("/api/sessions/{id}/status", post(routes::sessions::update_status))
        .route("/api/rooms/{id}/messages", get(routes::sessions::room_messages))
        .route("/api/feedback", post(routes::feedback::submit_feedback))
        .route("/api/feedback/categories", get(routes::feedback::list_categories))
        .route("/api/feedback/given", get(routes::feedback::feedback_given))
        .route("/api/feedback/received", get(routes::feedback::feedback_received))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

/// Broker served on `SOCKET_PORT`.
pub fn socket_router(state: AppState) -> Router {
    Router::new()
        .route(SOCKET_PATH, get(ws::socket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}
