//! SpeakSpace Client
//!
//! Client-side core for SpeakSpace practice sessions: who is signed in
//! ([`identity`]) and the live connection to a session room ([`realtime`]).
//! [`AppContext`] ties the two together for a running application.

pub mod api_client;
pub mod app;
pub mod config;
pub mod identity;
pub mod realtime;
pub mod routes;
pub mod storage;

pub use api_client::ApiClient;
pub use app::AppContext;
pub use config::ClientConfig;
pub use identity::{IdentityContext, IdentityError, IdentityTransition};
pub use realtime::{ConnectionState, RealtimeChannel, Subscription};
pub use routes::Route;
