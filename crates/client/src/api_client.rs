//! HTTP API client for the SpeakSpace backend.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use speakspace_shared::{
    ApiError, ChatMessage, CreateFeedbackRequest, CreateSessionRequest, Feedback,
    FeedbackCategory, HealthResponse, PracticeSession, SessionStatus,
    UpdateSessionStatusRequest, HEADER_USER_ID,
};

/// HTTP client for JSON requests against the API base URL.
///
/// Catalog and feedback calls need [`ApiClient::as_user`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    user_id: Option<String>,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
            user_id: None,
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Act as `user_id` on requests that need a signed-in user.
    pub fn as_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn with_user(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.user_id {
            Some(user_id) => request.header(HEADER_USER_ID, user_id),
            None => request,
        }
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    /// Make a GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let resp = self
            .with_user(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Self::read_json(resp).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let resp = self
            .with_user(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Self::read_json(resp).await
    }

    /// Check that the backend is reachable.
    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        self.get_json("/api/test").await
    }

    pub async fn sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<PracticeSession>, ApiError> {
        match status {
            Some(status) => self.get_json(&format!("/api/sessions?status={status}")).await,
            None => self.get_json("/api/sessions").await,
        }
    }

    pub async fn session(&self, id: &str) -> Result<PracticeSession, ApiError> {
        self.get_json(&format!("/api/sessions/{id}")).await
    }

    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<PracticeSession, ApiError> {
        self.post_json("/api/sessions", request).await
    }

    pub async fn join_session(&self, id: &str) -> Result<PracticeSession, ApiError> {
        self.post_json(&format!("/api/sessions/{id}/join"), &()).await
    }

    pub async fn leave_session(&self, id: &str) -> Result<PracticeSession, ApiError> {
        self.post_json(&format!("/api/sessions/{id}/leave"), &()).await
    }

    pub async fn set_session_status(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<PracticeSession, ApiError> {
        self.post_json(
            &format!("/api/sessions/{id}/status"),
            &UpdateSessionStatusRequest { status },
        )
        .await
    }

    /// Chat the broker recorded for a room, oldest first.
    pub async fn room_messages(&self, room_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.get_json(&format!("/api/rooms/{room_id}/messages")).await
    }

    pub async fn feedback_categories(&self) -> Result<Vec<FeedbackCategory>, ApiError> {
        self.get_json("/api/feedback/categories").await
    }

    pub async fn submit_feedback(
        &self,
        request: &CreateFeedbackRequest,
    ) -> Result<Feedback, ApiError> {
        self.post_json("/api/feedback", request).await
    }

    pub async fn feedback_given(&self) -> Result<Vec<Feedback>, ApiError> {
        self.get_json("/api/feedback/given").await
    }

    pub async fn feedback_received(&self) -> Result<Vec<Feedback>, ApiError> {
        self.get_json("/api/feedback/received").await
    }

    async fn read_json<TRes: DeserializeOwned>(resp: reqwest::Response) -> Result<TRes, ApiError> {
        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new().with_base_url("http://localhost:5000/");
        assert_eq!(client.url("/api/test"), "http://localhost:5000/api/test");
        assert_eq!(client.url("api/test"), "http://localhost:5000/api/test");
        assert_eq!(client.url("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_relative_url_without_base() {
        let client = ApiClient::new();
        assert_eq!(client.url("api/test"), "/api/test");
    }
}
