//! Identity providers: the collaborators that actually vouch for a user.

use std::sync::Mutex;

use async_trait::async_trait;
use speakspace_shared::{
    default_avatar_url, ApiError, LoginRequest, ProblemDetails, RegisterRequest, User, UserRole,
};

use super::IdentityError;
use crate::api_client::ApiClient;

/// Validates credentials and returns the identity they belong to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<User, IdentityError>;

    /// Must reject roles outside moderator/participant/evaluator with
    /// [`IdentityError::InvalidRole`].
    async fn register(&self, request: &RegisterRequest) -> Result<User, IdentityError>;
}

/// Provider backed by the SpeakSpace HTTP API.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: ApiClient,
}

impl HttpIdentityProvider {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: ApiClient::new().with_base_url(api_url),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn login(&self, request: &LoginRequest) -> Result<User, IdentityError> {
        self.client
            .post_json("/api/auth/login", request)
            .await
            .map_err(|e| map_api_error(e, &request.email, None))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, IdentityError> {
        self.client
            .post_json("/api/auth/register", request)
            .await
            .map_err(|e| map_api_error(e, &request.email, Some(&request.role)))
    }
}

fn map_api_error(err: ApiError, email: &str, role: Option<&str>) -> IdentityError {
    let ApiError::Http { status, body } = &err else {
        return IdentityError::Api(err);
    };

    match *status {
        401 => IdentityError::InvalidCredentials,
        409 => IdentityError::EmailTaken(email.to_string()),
        400 => {
            let invalid_role = serde_json::from_str::<ProblemDetails>(body)
                .map(|p| p.is_invalid_role())
                .unwrap_or(false);
            match role {
                Some(role) if invalid_role => IdentityError::InvalidRole(role.to_string()),
                _ => IdentityError::Rejected(err.user_message()),
            }
        }
        _ => IdentityError::Api(err),
    }
}

/// In-memory provider for demos and offline use.
///
/// Seeded with one user per role. Login admits any non-empty credentials:
/// known emails resolve to their directory entry, unknown ones become
/// participants. Passwords are not checked.
#[derive(Debug)]
pub struct DemoIdentityProvider {
    users: Mutex<Vec<User>>,
}

impl Default for DemoIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoIdentityProvider {
    pub fn new() -> Self {
        let seed = [
            ("1", "John Moderator", "moderator@example.com", UserRole::Moderator),
            ("2", "Jane Participant", "participant@example.com", UserRole::Participant),
            ("3", "Alex Evaluator", "evaluator@example.com", UserRole::Evaluator),
        ];
        let users = seed
            .into_iter()
            .map(|(id, name, email, role)| User {
                id: id.to_string(),
                name: name.to_string(),
                email: email.to_string(),
                role,
                profile_image: Some(default_avatar_url(name, role)),
            })
            .collect();

        Self {
            users: Mutex::new(users),
        }
    }

    pub fn users(&self) -> Vec<User> {
        self.directory().clone()
    }

    fn directory(&self) -> std::sync::MutexGuard<'_, Vec<User>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn require(field: &str, value: &str) -> Result<(), IdentityError> {
    if value.trim().is_empty() {
        return Err(IdentityError::Rejected(format!("{field} is required")));
    }
    Ok(())
}

#[async_trait]
impl IdentityProvider for DemoIdentityProvider {
    async fn login(&self, request: &LoginRequest) -> Result<User, IdentityError> {
        require("email", &request.email)?;
        require("password", &request.password)?;

        let directory = self.directory();
        if let Some(user) = directory
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(&request.email))
        {
            return Ok(user.clone());
        }

        let name = request
            .email
            .split('@')
            .next()
            .unwrap_or(&request.email)
            .to_string();
        Ok(User {
            id: format!("user-{}", uuid::Uuid::new_v4().simple()),
            profile_image: Some(default_avatar_url(&name, UserRole::Participant)),
            name,
            email: request.email.clone(),
            role: UserRole::Participant,
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, IdentityError> {
        let role: UserRole = request
            .role
            .parse()
            .map_err(|_| IdentityError::InvalidRole(request.role.clone()))?;
        require("name", &request.name)?;
        require("email", &request.email)?;
        require("password", &request.password)?;

        let mut directory = self.directory();
        if directory
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&request.email))
        {
            return Err(IdentityError::EmailTaken(request.email.clone()));
        }

        let user = User {
            id: (directory.len() + 1).to_string(),
            name: request.name.clone(),
            email: request.email.clone(),
            role,
            profile_image: Some(default_avatar_url(&request.name, role)),
        };
        directory.push(user.clone());
        Ok(user)
    }
}
