//! Scoped access to the identity context.
//!
//! Code running inside [`provide_identity`] (or [`provide_identity_sync`]) can
//! reach the context with [`use_identity`] without threading it through every
//! call. Outside such a scope there is no context, and asking for one is a bug:
//! `use_identity` panics rather than pretending nobody is signed in.
//!
//! The scope is task-local: work moved onto another task with `tokio::spawn`
//! must be wrapped in its own `provide_identity`.

use std::future::Future;

use super::{IdentityContext, IdentityError};

tokio::task_local! {
    static IDENTITY: IdentityContext;
}

/// Run `fut` with `identity` available to [`use_identity`].
pub async fn provide_identity<F: Future>(identity: IdentityContext, fut: F) -> F::Output {
    IDENTITY.scope(identity, fut).await
}

/// Synchronous variant of [`provide_identity`].
pub fn provide_identity_sync<R>(identity: IdentityContext, f: impl FnOnce() -> R) -> R {
    IDENTITY.sync_scope(identity, f)
}

pub fn try_use_identity() -> Result<IdentityContext, IdentityError> {
    IDENTITY
        .try_with(|identity| identity.clone())
        .map_err(|_| IdentityError::NoProvider)
}

/// Get the identity context of the enclosing scope.
///
/// # Panics
///
/// Panics when called outside [`provide_identity`] / [`provide_identity_sync`].
pub fn use_identity() -> IdentityContext {
    match try_use_identity() {
        Ok(identity) => identity,
        Err(_) => panic!("use_identity must be used within an identity provider scope"),
    }
}
