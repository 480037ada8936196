use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::server::endpoints::{candidates, sessions, status};
use crate::types::AppState;

mod endpoints;
mod types;
mod util;

pub use types::ApiErrorType;

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let session_router = Router::new()
        .route(
            "/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/:id/courses", post(sessions::post_course))
        .route(
            "/:id/courses/:course_id",
            axum::routing::delete(sessions::delete_course),
        )
        .route(
            "/:id/pins/:course_id",
            post(sessions::post_pin).delete(sessions::delete_pin),
        )
        .route("/:id/grid", get(sessions::get_grid))
        .route("/:id/save_payload", get(sessions::get_save_payload))
        .route("/:id/save", post(sessions::post_save))
        .route("/:id/candidates", post(candidates::post_candidates))
        .route("/:id/candidates/:index", get(candidates::get_candidate))
        .route(
            "/:id/candidates/:index/apply",
            post(candidates::post_apply_candidate),
        )
        .route("/:id/generate", post(candidates::post_generate));

    Router::new()
        .route("/health", get(status::get_health))
        .route("/cache_stats", get(status::get_cache_stats))
        .route("/sessions", post(sessions::post_session))
        .nest("/sessions", session_router)
        .with_state(app_state)
}
