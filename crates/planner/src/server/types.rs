use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::PlannerError;

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiErrorType {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl From<(StatusCode, &str, Option<String>)> for ApiErrorType {
    fn from((status, error, context): (StatusCode, &str, Option<String>)) -> Self {
        Self {
            status,
            error: error.to_string(),
            context,
        }
    }
}

impl From<PlannerError> for ApiErrorType {
    fn from(err: PlannerError) -> Self {
        let (status, message) = match &err {
            PlannerError::CandidateOutOfRange { .. } => {
                (StatusCode::NOT_FOUND, "Candidate not found")
            }
            PlannerError::InvalidRecord { .. } | PlannerError::ParseError { .. } => {
                (StatusCode::BAD_REQUEST, "Invalid request data")
            }
            PlannerError::GenerationFailed { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Timetable generation failed")
            }
            PlannerError::Network { .. }
            | PlannerError::UnexpectedResponse { .. }
            | PlannerError::StreamIncomplete => {
                (StatusCode::BAD_GATEWAY, "Upstream planner service failed")
            }
            PlannerError::UrlError { .. } | PlannerError::Config { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Server misconfigured")
            }
        };
        Self::from((status, message, Some(err.to_string())))
    }
}

impl IntoResponse for ApiErrorType {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
