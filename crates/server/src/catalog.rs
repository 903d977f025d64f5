//! In-memory catalog of scheduled practice sessions.

use chrono::Utc;
use speakspace_shared::{
    CreateSessionRequest, PracticeSession, SessionStatus, DEFAULT_MAX_PARTICIPANTS,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("title is required")]
    TitleRequired,
    #[error("maxParticipants must be at least 1")]
    NoCapacity,
    #[error("endTime must be after startTime")]
    EndsBeforeStart,
    #[error("session is {0} and no longer accepts participant changes")]
    NotPending(SessionStatus),
    #[error("already a participant in this session")]
    AlreadyJoined,
    #[error("not a participant in this session")]
    NotJoined,
    #[error("session is full ({0} participants)")]
    Full(u32),
    #[error("only the session's moderator can change its status")]
    NotModerator,
    #[error("cannot move a {from} session to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
}

/// Sessions in creation order.
#[derive(Debug, Default)]
pub struct SessionCatalog {
    sessions: RwLock<Vec<PracticeSession>>,
}

impl SessionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(
        &self,
        moderator_id: &str,
        request: CreateSessionRequest,
    ) -> Result<PracticeSession, CatalogError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(CatalogError::TitleRequired);
        }
        let max_participants = request.max_participants.unwrap_or(DEFAULT_MAX_PARTICIPANTS);
        if max_participants == 0 {
            return Err(CatalogError::NoCapacity);
        }
        if let (Some(start), Some(end)) = (request.start_time, request.end_time) {
            if end <= start {
                return Err(CatalogError::EndsBeforeStart);
            }
        }

        let session = PracticeSession {
            id: Uuid::new_v4().simple().to_string(),
            title: title.to_string(),
            description: request.description.trim().to_string(),
            moderator_id: moderator_id.to_string(),
            participants: Vec::new(),
            max_participants,
            start_time: request.start_time,
            end_time: request.end_time,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
        };
        self.sessions.write().await.push(session.clone());
        Ok(session)
    }

    pub async fn list(&self, status: Option<SessionStatus>) -> Vec<PracticeSession> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|s| status.map_or(true, |status| s.status == status))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<PracticeSession, CatalogError> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Add a participant while the session is pending and below its cap.
    pub async fn join(&self, id: &str, user_id: &str) -> Result<PracticeSession, CatalogError> {
        self.update(id, |session| {
            if session.status != SessionStatus::Pending {
                return Err(CatalogError::NotPending(session.status));
            }
            if session.has_participant(user_id) {
                return Err(CatalogError::AlreadyJoined);
            }
            if session.is_full() {
                return Err(CatalogError::Full(session.max_participants));
            }
            session.participants.push(user_id.to_string());
            Ok(())
        })
        .await
    }

    pub async fn leave(&self, id: &str, user_id: &str) -> Result<PracticeSession, CatalogError> {
        self.update(id, |session| {
            if session.status != SessionStatus::Pending {
                return Err(CatalogError::NotPending(session.status));
            }
            if !session.has_participant(user_id) {
                return Err(CatalogError::NotJoined);
            }
            session.participants.retain(|p| p != user_id);
            Ok(())
        })
        .await
    }

    /// Advance the status by one step. Only the session's moderator may.
    pub async fn set_status(
        &self,
        id: &str,
        actor_id: &str,
        status: SessionStatus,
    ) -> Result<PracticeSession, CatalogError> {
        self.update(id, |session| {
            if session.moderator_id != actor_id {
                return Err(CatalogError::NotModerator);
            }
            if session.status.next() != Some(status) {
                return Err(CatalogError::InvalidTransition {
                    from: session.status,
                    to: status,
                });
            }
            session.status = status;
            Ok(())
        })
        .await
    }

    async fn update(
        &self,
        id: &str,
        change: impl FnOnce(&mut PracticeSession) -> Result<(), CatalogError>,
    ) -> Result<PracticeSession, CatalogError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        change(session)?;
        Ok(session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(title: &str, max_participants: Option<u32>) -> CreateSessionRequest {
        CreateSessionRequest {
            title: title.to_string(),
            description: String::new(),
            max_participants,
            start_time: None,
            end_time: None,
        }
    }

    #[tokio::test]
    async fn test_create_validates_request() {
        let catalog = SessionCatalog::new();

        assert_eq!(
            catalog.create("1", request("  ", None)).await,
            Err(CatalogError::TitleRequired)
        );
        assert_eq!(
            catalog.create("1", request("Debate", Some(0))).await,
            Err(CatalogError::NoCapacity)
        );

        let start = Utc::now();
        let backwards = CreateSessionRequest {
            start_time: Some(start),
            end_time: Some(start - Duration::minutes(5)),
            ..request("Debate", None)
        };
        assert_eq!(
            catalog.create("1", backwards).await,
            Err(CatalogError::EndsBeforeStart)
        );

        let session = catalog.create("1", request(" Debate ", None)).await.unwrap();
        assert_eq!(session.title, "Debate");
        assert_eq!(session.max_participants, DEFAULT_MAX_PARTICIPANTS);
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn test_join_enforces_cap() {
        let catalog = SessionCatalog::new();
        let session = catalog.create("1", request("Pair", Some(2))).await.unwrap();

        catalog.join(&session.id, "2").await.unwrap();
        assert_eq!(
            catalog.join(&session.id, "2").await,
            Err(CatalogError::AlreadyJoined)
        );
        let full = catalog.join(&session.id, "3").await.unwrap();
        assert!(full.is_full());
        assert_eq!(
            catalog.join(&session.id, "4").await,
            Err(CatalogError::Full(2))
        );

        // Leaving frees a seat
        catalog.leave(&session.id, "2").await.unwrap();
        let rejoined = catalog.join(&session.id, "4").await.unwrap();
        assert_eq!(rejoined.participants, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_status_moves_forward_for_moderator_only() {
        let catalog = SessionCatalog::new();
        let session = catalog.create("1", request("Panel", None)).await.unwrap();
        catalog.join(&session.id, "2").await.unwrap();

        assert_eq!(
            catalog.set_status(&session.id, "2", SessionStatus::Active).await,
            Err(CatalogError::NotModerator)
        );
        assert_eq!(
            catalog.set_status(&session.id, "1", SessionStatus::Completed).await,
            Err(CatalogError::InvalidTransition {
                from: SessionStatus::Pending,
                to: SessionStatus::Completed,
            })
        );

        catalog
            .set_status(&session.id, "1", SessionStatus::Active)
            .await
            .unwrap();
        assert_eq!(
            catalog.leave(&session.id, "2").await,
            Err(CatalogError::NotPending(SessionStatus::Active))
        );
        assert_eq!(
            catalog.join(&session.id, "3").await,
            Err(CatalogError::NotPending(SessionStatus::Active))
        );
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let catalog = SessionCatalog::new();
        let first = catalog.create("1", request("One", None)).await.unwrap();
        catalog.create("1", request("Two", None)).await.unwrap();
        catalog
            .set_status(&first.id, "1", SessionStatus::Active)
            .await
            .unwrap();

        let titles = |sessions: Vec<PracticeSession>| {
            sessions.into_iter().map(|s| s.title).collect::<Vec<_>>()
        };
        assert_eq!(titles(catalog.list(None).await), vec!["One", "Two"]);
        assert_eq!(
            titles(catalog.list(Some(SessionStatus::Pending)).await),
            vec!["Two"]
        );
        assert_eq!(
            catalog.get("missing").await,
            Err(CatalogError::NotFound("missing".to_string()))
        );
    }
}
