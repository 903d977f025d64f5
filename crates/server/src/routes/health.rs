//! Connectivity check.

use axum::Json;
use speakspace_shared::HealthResponse;

pub async fn test() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Backend is connected!".to_string(),
    })
}
