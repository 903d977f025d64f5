//! Application state shared across request handlers.

use std::sync::Arc;

use crate::catalog::SessionCatalog;
use crate::feedback::FeedbackStore;
use crate::store::UserStore;
use crate::ws::SessionHub;

/// Shared application state
#[derive(Clone, Default)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub catalog: Arc<SessionCatalog>,
    pub feedback: Arc<FeedbackStore>,
    pub hub: SessionHub,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}
