//! Endpoints for candidate timetables produced by the external generator.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::course::CourseRecord;
use crate::generation::{CandidateCollector, GenerationEvent, GenerationRequest};
use crate::server::types::ApiErrorType;
use crate::server::util::{grid_json, lookup_session, timetable_json};
use crate::timetable::TimetableGrid;
use crate::types::AppState;

/// POST /sessions/:id/candidates
///
/// Replaces the session's candidates with externally produced course lists.
/// Lists with internal conflicts are rejected and duplicates collapsed.
pub async fn post_candidates(
    Path(id): Path<String>,
    State(s): State<Arc<AppState>>,
    Json(lists): Json<Vec<Vec<CourseRecord>>>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    info!("POST /sessions/{}/candidates ({} lists)", id, lists.len());

    let mut collector =
        CandidateCollector::new(GenerationRequest::default(), s.config.major_marker.clone());
    collector.apply(GenerationEvent::Complete { timetables: lists });
    let rejected = collector.rejected();

    match collector.into_result() {
        Ok(candidates) => {
            let accepted = candidates.len();
            session.lock().await.set_candidates(candidates);
            (
                StatusCode::OK,
                Json(json!({ "accepted": accepted, "rejected": rejected })),
            )
                .into_response()
        }
        Err(e) => ApiErrorType::from(e).into_response(),
    }
}

/// GET /sessions/:id/candidates/:index
///
/// Marks a candidate as previewed and returns it with its grid.
pub async fn get_candidate(
    Path((id, index)): Path<(String, usize)>,
    State(s): State<Arc<AppState>>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let mut session = session.lock().await;

    match session.preview_candidate(index) {
        Ok(candidate) => {
            let grid = TimetableGrid::from_timetable(candidate);
            (
                StatusCode::OK,
                Json(json!({
                    "index": index,
                    "timetable": timetable_json(candidate),
                    "grid": grid_json(&grid),
                })),
            )
                .into_response()
        }
        Err(e) => ApiErrorType::from(e).into_response(),
    }
}

/// POST /sessions/:id/candidates/:index/apply
pub async fn post_apply_candidate(
    Path((id, index)): Path<(String, usize)>,
    State(s): State<Arc<AppState>>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    info!("POST /sessions/{}/candidates/{}/apply", id, index);
    let mut session = session.lock().await;

    match session.apply_candidate(index) {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "outcome": outcome,
                "timetable": timetable_json(session.timetable()),
            })),
        )
            .into_response(),
        Err(e) => ApiErrorType::from(e).into_response(),
    }
}

/// POST /sessions/:id/generate
///
/// Runs the external generator with the session's pins as fixed courses and
/// stores the resulting candidates.
pub async fn post_generate(
    Path(id): Path<String>,
    State(s): State<Arc<AppState>>,
    Json(base): Json<GenerationRequest>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    // The lock is not held while the generator runs
    let request = session.lock().await.generation_request(&base);
    info!(
        "POST /sessions/{}/generate (key {})",
        id,
        request.cache_key(&s.config.major_marker)
    );

    match s.client.generate_cached(&request).await {
        Ok(candidates) => {
            let count = candidates.len();
            session.lock().await.set_candidates(candidates);
            (StatusCode::OK, Json(json!({ "candidates": count }))).into_response()
        }
        Err(e) => {
            error!("Generation failed for session {}: {}", id, e);
            ApiErrorType::from(e).into_response()
        }
    }
}
