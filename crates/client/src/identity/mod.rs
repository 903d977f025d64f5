//! Identity: who is signed in on this client.
//!
//! [`IdentityContext`] is the single source of truth for the current user.
//! It hydrates from durable storage on construction, delegates credential
//! checks to an [`IdentityProvider`], and reports every sign-in/sign-out as an
//! [`IdentityTransition`] so the caller decides how to navigate.
//!
//! ```rust,ignore
//! let identity = IdentityContext::new(storage, Arc::new(DemoIdentityProvider::new()));
//! let transition = identity.login("moderator@example.com", "pw").await?;
//! router.push(transition.destination());
//! ```

mod context;
mod provider;
mod scope;

use speakspace_shared::ApiError;

use crate::storage::StorageError;

pub use context::{IdentityContext, IdentityTransition, IDENTITY_STORAGE_KEY};
pub use provider::{DemoIdentityProvider, HttpIdentityProvider, IdentityProvider};
pub use scope::{provide_identity, provide_identity_sync, try_use_identity, use_identity};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("`{0}` is not a valid role (expected moderator, participant or evaluator)")]
    InvalidRole(String),
    #[error("a user with email {0} already exists")]
    EmailTaken(String),
    #[error("{0}")]
    Rejected(String),
    #[error("not signed in")]
    NotSignedIn,
    #[error("identity accessed outside of a provider scope")]
    NoProvider,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to persist identity: {0}")]
    Storage(#[from] StorageError),
}
