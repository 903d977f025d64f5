//! In-memory user accounts.

use std::collections::HashMap;

use speakspace_shared::{default_avatar_url, User, UserRole};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("a user with email {0} already exists")]
    EmailTaken(String),
}

/// A user together with its argon2 password hash.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Default)]
pub struct UserStore {
    accounts: RwLock<Accounts>,
}

#[derive(Debug, Default)]
struct Accounts {
    by_email: HashMap<String, StoredUser>,
    next_id: u64,
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account. Emails are unique ignoring case.
    pub async fn insert(
        &self,
        name: &str,
        email: &str,
        role: UserRole,
        password_hash: String,
    ) -> Result<User, StoreError> {
        let key = email_key(email);
        let mut accounts = self.accounts.write().await;
        if accounts.by_email.contains_key(&key) {
            return Err(StoreError::EmailTaken(email.to_string()));
        }

        accounts.next_id += 1;
        let user = User {
            id: accounts.next_id.to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            role,
            profile_image: Some(default_avatar_url(name, role)),
        };
        accounts.by_email.insert(
            key,
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<StoredUser> {
        self.accounts
            .read()
            .await
            .by_email
            .get(&email_key(email))
            .cloned()
    }

    pub async fn find_by_id(&self, id: &str) -> Option<User> {
        self.accounts
            .read()
            .await
            .by_email
            .values()
            .find(|stored| stored.user.id == id)
            .map(|stored| stored.user.clone())
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.by_email.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = UserStore::new();
        let a = store
            .insert("Ana", "ana@x.com", UserRole::Evaluator, "h".into())
            .await
            .unwrap();
        let b = store
            .insert("Ben", "ben@x.com", UserRole::Participant, "h".into())
            .await
            .unwrap();

        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
        assert!(a.profile_image.unwrap().contains("F59E0B"));
    }

    #[tokio::test]
    async fn test_email_is_unique_ignoring_case() {
        let store = UserStore::new();
        store
            .insert("Ana", "ana@x.com", UserRole::Moderator, "h".into())
            .await
            .unwrap();

        let err = store
            .insert("Other", "ANA@x.com", UserRole::Participant, "h".into())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::EmailTaken("ANA@x.com".to_string()));
        assert_eq!(store.len().await, 1);
        assert!(store.find_by_email(" Ana@X.com ").await.is_some());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let store = UserStore::new();
        let ana = store
            .insert("Ana", "ana@x.com", UserRole::Moderator, "h".into())
            .await
            .unwrap();

        assert_eq!(store.find_by_id(&ana.id).await, Some(ana));
        assert_eq!(store.find_by_id("42").await, None);
    }
}
