//! Application context: the one identity and the one realtime channel.

use std::sync::Arc;

use speakspace_shared::OutgoingMessage;

use crate::config::ClientConfig;
use crate::identity::{IdentityContext, IdentityError, IdentityProvider, IdentityTransition};
use crate::realtime::{ConnectionState, RealtimeChannel};
use crate::storage::{FileStorage, Storage, StorageError};

/// Everything a running client owns. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: ClientConfig,
    identity: IdentityContext,
    realtime: RealtimeChannel,
}

impl AppContext {
    /// Build file-backed storage, the identity context and the channel.
    pub fn new(
        config: ClientConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, StorageError> {
        let storage: Arc<dyn Storage> = match &config.storage_dir {
            Some(dir) => Arc::new(FileStorage::new(dir)),
            None => Arc::new(FileStorage::in_config_dir()?),
        };
        let identity = IdentityContext::new(storage, provider);
        let realtime = RealtimeChannel::new(&config);
        Ok(Self::from_parts(config, identity, realtime))
    }

    pub fn from_parts(
        config: ClientConfig,
        identity: IdentityContext,
        realtime: RealtimeChannel,
    ) -> Self {
        Self {
            config,
            identity,
            realtime,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    pub fn realtime(&self) -> &RealtimeChannel {
        &self.realtime
    }

    /// Connect as the current user and join `session_id`'s room.
    ///
    /// Waits for the connection to settle and returns the state it settled
    /// in. The join is only emitted once connected.
    pub async fn enter_session(&self, session_id: &str) -> Result<ConnectionState, IdentityError> {
        let user = self
            .identity
            .current_user()
            .ok_or(IdentityError::NotSignedIn)?;

        self.realtime.connect(user.id, session_id);

        let mut state_rx = self.realtime.watch_state();
        let settled = match state_rx
            .wait_for(|s| s.is_connected() || s.is_disconnected())
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => ConnectionState::Disconnected,
        };

        if settled.is_connected() {
            self.realtime.join_session(session_id);
            tracing::info!("Entered session {}", session_id);
        }
        Ok(settled)
    }

    /// Send chat to the current room, signed with the user's name and role.
    pub fn send_chat(&self, content: impl Into<String>) -> Result<(), IdentityError> {
        let user = self
            .identity
            .current_user()
            .ok_or(IdentityError::NotSignedIn)?;

        self.realtime.send_message(OutgoingMessage {
            content: content.into(),
            sender_name: Some(user.name),
            sender_role: Some(user.role),
        });
        Ok(())
    }

    pub fn sign_out(&self) -> IdentityTransition {
        self.realtime.disconnect();
        self.identity.logout()
    }

    pub fn shutdown(&self) {
        self.realtime.disconnect();
    }
}
