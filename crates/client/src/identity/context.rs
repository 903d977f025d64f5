//! The identity context and its state transitions.

use std::fmt;
use std::sync::{Arc, Mutex};

use speakspace_shared::{LoginRequest, RegisterRequest, User};
use tokio::sync::watch;

use super::{IdentityError, IdentityProvider};
use crate::routes::Route;
use crate::storage::{self, Storage};

/// Storage slot holding the serialized current user.
pub const IDENTITY_STORAGE_KEY: &str = "speakspace_user";

/// Outcome of an identity operation. Navigation is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityTransition {
    SignedIn(User),
    SignedOut,
}

impl IdentityTransition {
    pub fn destination(&self) -> Route {
        match self {
            IdentityTransition::SignedIn(_) => Route::Dashboard,
            IdentityTransition::SignedOut => Route::Landing,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            IdentityTransition::SignedIn(user) => Some(user),
            IdentityTransition::SignedOut => None,
        }
    }
}

/// Holder of the signed-in user. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct IdentityContext {
    inner: Arc<Inner>,
}

struct Inner {
    current: watch::Sender<Option<User>>,
    loading: Loading,
    storage: Arc<dyn Storage>,
    provider: Arc<dyn IdentityProvider>,
}

/// Loading flag that stays raised while any request is in flight.
struct Loading {
    flag: watch::Sender<bool>,
    in_flight: Mutex<usize>,
}

impl Loading {
    fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag,
            in_flight: Mutex::new(0),
        }
    }

    fn raise(&self) -> LoadingGuard<'_> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *in_flight += 1;
        if *in_flight == 1 {
            self.flag.send_replace(true);
        }
        LoadingGuard(self)
    }
}

/// Holds one in-flight slot until dropped.
struct LoadingGuard<'a>(&'a Loading);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.0.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.0.flag.send_replace(false);
        }
    }
}

impl IdentityContext {
    /// Create a context, restoring any identity persisted by a previous run.
    pub fn new(storage: Arc<dyn Storage>, provider: Arc<dyn IdentityProvider>) -> Self {
        let restored = hydrate(storage.as_ref());
        let (current, _) = watch::channel(restored);

        Self {
            inner: Arc::new(Inner {
                current,
                loading: Loading::new(),
                storage,
                provider,
            }),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.current.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.current.borrow().is_some()
    }

    /// True while a login or registration is in flight.
    pub fn is_loading(&self) -> bool {
        *self.inner.loading.flag.borrow()
    }

    /// Receiver that observes every identity change.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.inner.current.subscribe()
    }

    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.inner.loading.flag.subscribe()
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityTransition, IdentityError> {
        let _loading = self.inner.loading.raise();
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let user = self.inner.provider.login(&request).await.map_err(|e| {
            tracing::warn!("Login failed for {}: {}", email, e);
            e
        })?;
        self.establish(user)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<IdentityTransition, IdentityError> {
        let _loading = self.inner.loading.raise();
        let request = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: role.to_string(),
        };

        let user = self.inner.provider.register(&request).await.map_err(|e| {
            tracing::warn!("Registration failed for {}: {}", email, e);
            e
        })?;
        self.establish(user)
    }

    /// Clear the persisted and current identity. Safe to call when signed out.
    pub fn logout(&self) -> IdentityTransition {
        if let Err(e) = self.inner.storage.remove(IDENTITY_STORAGE_KEY) {
            tracing::error!("Failed to clear persisted identity: {}", e);
        }
        if let Some(previous) = self.inner.current.send_replace(None) {
            tracing::info!("Signed out {}", previous.email);
        }
        IdentityTransition::SignedOut
    }

    /// Persist first so a storage failure leaves the current identity untouched.
    fn establish(&self, user: User) -> Result<IdentityTransition, IdentityError> {
        storage::save(self.inner.storage.as_ref(), IDENTITY_STORAGE_KEY, &user)?;
        self.inner.current.send_replace(Some(user.clone()));
        tracing::info!("Signed in {} as {}", user.email, user.role);
        Ok(IdentityTransition::SignedIn(user))
    }
}

impl fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityContext")
            .field("current", &*self.inner.current.borrow())
            .field("loading", &*self.inner.loading.flag.borrow())
            .finish_non_exhaustive()
    }
}

fn hydrate(storage: &dyn Storage) -> Option<User> {
    match storage::load::<User>(storage, IDENTITY_STORAGE_KEY) {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Ignoring persisted identity: {}", e);
            None
        }
    }
}
