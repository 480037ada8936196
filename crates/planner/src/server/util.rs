use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::course::CourseRecord;
use crate::server::types::ApiErrorType;
use crate::timetable::{Timetable, TimetableGrid};
use crate::types::{AppState, SharedSession};

/// Looks up a session, producing a 404 error body if it doesn't exist.
pub fn lookup_session(state: &Arc<AppState>, id: &str) -> Result<SharedSession, ApiErrorType> {
    state.session(id).ok_or_else(|| {
        warn!("Session not found: {}", id);
        ApiErrorType::from((
            StatusCode::NOT_FOUND,
            "Session not found",
            Some(format!("No session with ID: {}", id)),
        ))
    })
}

pub fn timetable_json(timetable: &Timetable) -> Value {
    json!({
        "identity_key": timetable.identity_key(),
        "total_credits": timetable.total_credits(),
        "major_credits": timetable.major_credits(),
        "elective_credits": timetable.elective_credits(),
        "pinned": timetable.pinned_ids().collect::<Vec<_>>(),
        "courses": timetable
            .courses()
            .iter()
            .map(CourseRecord::from)
            .collect::<Vec<_>>(),
    })
}

pub fn grid_json(grid: &TimetableGrid) -> Value {
    json!({
        "hour_range": grid.hour_range(),
        "cells": grid
            .occupied_cells()
            .map(|(slot, entries)| {
                json!({
                    "hour": slot.hour,
                    "day": slot.day,
                    "column": slot.column(),
                    "entries": entries,
                })
            })
            .collect::<Vec<_>>(),
    })
}
