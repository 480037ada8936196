//! Endpoints operating on a session's current timetable.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::course::CourseRecord;
use crate::server::types::ApiErrorType;
use crate::server::util::{grid_json, lookup_session, timetable_json};
use crate::types::AppState;

#[derive(Debug, Deserialize)]
pub struct TitleParams {
    #[serde(default)]
    pub title: String,
}

/// POST /sessions
pub async fn post_session(State(s): State<Arc<AppState>>) -> Response {
    let id = s.create_session();
    info!("POST /sessions - created session {}", id);

    (StatusCode::CREATED, Json(json!({ "session_id": id }))).into_response()
}

/// GET /sessions/:id
pub async fn get_session(Path(id): Path<String>, State(s): State<Arc<AppState>>) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let session = session.lock().await;

    let response = json!({
        "session_id": session.id(),
        "created_at": session.created_at(),
        "last_active": session.last_active(),
        "candidate_count": session.candidates().len(),
        "timetable": timetable_json(session.timetable()),
    });
    (StatusCode::OK, Json(response)).into_response()
}

/// DELETE /sessions/:id
pub async fn delete_session(Path(id): Path<String>, State(s): State<Arc<AppState>>) -> Response {
    info!("DELETE /sessions/{}", id);

    if s.remove_session(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        ApiErrorType::from((
            StatusCode::NOT_FOUND,
            "Session not found",
            Some(format!("No session with ID: {}", id)),
        ))
        .into_response()
    }
}

/// POST /sessions/:id/courses
///
/// Adds a course. Answers 409 when it clashes with the current timetable.
pub async fn post_course(
    Path(id): Path<String>,
    State(s): State<Arc<AppState>>,
    Json(record): Json<CourseRecord>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let course = record.into_course();
    let course_id = course.id;
    info!("POST /sessions/{}/courses (course {})", id, course_id);

    let mut session = session.lock().await;
    let added = session.add_course(course);
    let status = if added {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };

    (
        status,
        Json(json!({
            "added": added,
            "course_id": course_id,
            "timetable": timetable_json(session.timetable()),
        })),
    )
        .into_response()
}

/// DELETE /sessions/:id/courses/:course_id
pub async fn delete_course(
    Path((id, course_id)): Path<(String, i64)>,
    State(s): State<Arc<AppState>>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    info!("DELETE /sessions/{}/courses/{}", id, course_id);

    let mut session = session.lock().await;
    let removed = session.remove_course(course_id);

    (
        StatusCode::OK,
        Json(json!({
            "removed": removed,
            "timetable": timetable_json(session.timetable()),
        })),
    )
        .into_response()
}

/// POST /sessions/:id/pins/:course_id
pub async fn post_pin(
    Path((id, course_id)): Path<(String, i64)>,
    State(s): State<Arc<AppState>>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    if session.lock().await.pin(course_id) {
        (StatusCode::OK, Json(json!({ "pinned": course_id }))).into_response()
    } else {
        ApiErrorType::from((
            StatusCode::NOT_FOUND,
            "Course not in timetable",
            Some(format!("No course with ID: {}", course_id)),
        ))
        .into_response()
    }
}

/// DELETE /sessions/:id/pins/:course_id
pub async fn delete_pin(
    Path((id, course_id)): Path<(String, i64)>,
    State(s): State<Arc<AppState>>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let unpinned = session.lock().await.unpin(course_id);

    (StatusCode::OK, Json(json!({ "unpinned": unpinned }))).into_response()
}

/// GET /sessions/:id/grid
pub async fn get_grid(Path(id): Path<String>, State(s): State<Arc<AppState>>) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let grid = session.lock().await.grid();

    (StatusCode::OK, Json(grid_json(&grid))).into_response()
}

/// GET /sessions/:id/save_payload?title=
pub async fn get_save_payload(
    Path(id): Path<String>,
    State(s): State<Arc<AppState>>,
    Query(params): Query<TitleParams>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let payload = session.lock().await.save_payload(params.title);

    (StatusCode::OK, Json(payload)).into_response()
}

/// POST /sessions/:id/save
///
/// Forwards the save projection to the external persistence endpoint.
pub async fn post_save(
    Path(id): Path<String>,
    State(s): State<Arc<AppState>>,
    Json(params): Json<TitleParams>,
) -> Response {
    let session = match lookup_session(&s, &id) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    let payload = session.lock().await.save_payload(params.title);
    info!("POST /sessions/{}/save ('{}')", id, payload.title);

    match s.client.save_timetable(&payload).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "saved": true }))).into_response(),
        Err(e) => {
            error!("Failed to save timetable for session {}: {}", id, e);
            ApiErrorType::from(e).into_response()
        }
    }
}
