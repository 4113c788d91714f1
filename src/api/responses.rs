use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::matches::{MatchResult, SearchOutcome};

/// Envelope for every API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request succeeded
    pub success: bool,
    /// Response payload
    pub data: Option<T>,
    /// Error message, when not successful
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a successful payload
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    // Failures are rendered by `AppError`, so this envelope is always a 200
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Payload of `POST /api/similar`
#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    /// One of `matches`, `no_detections`, `no_region_at_point`, `detector_failed`
    pub outcome: &'static str,
    /// Matches grouped per region, smallest region first
    pub products: Vec<MatchResult>,
    /// Detector error message, when the detector failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<SearchOutcome> for SimilarResponse {
    fn from(outcome: SearchOutcome) -> Self {
        let kind = outcome.kind();
        let detail = match &outcome {
            SearchOutcome::DetectorFailed(message) => Some(message.clone()),
            _ => None,
        };
        Self {
            outcome: kind,
            products: outcome.into_matches(),
            detail,
        }
    }
}
