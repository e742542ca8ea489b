pub mod documents;
pub mod health;
pub mod sessions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};

use crate::state::AppState;

/// Resume batches can be large; axum's default limit is 2 MB.
const UPLOAD_LIMIT_BYTES: usize = 50 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(sessions::handle_create))
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get).delete(sessions::handle_delete),
        )
        // Pending files
        .route(
            "/api/v1/sessions/:id/files/jd",
            post(sessions::handle_upload_jd).delete(sessions::handle_clear_jd),
        )
        .route(
            "/api/v1/sessions/:id/files/cvs",
            post(sessions::handle_upload_cvs),
        )
        .route(
            "/api/v1/sessions/:id/files/cvs/:index",
            delete(sessions::handle_remove_cv),
        )
        // Workflow steps
        .route(
            "/api/v1/sessions/:id/select_jd",
            post(sessions::handle_select_jd),
        )
        .route(
            "/api/v1/sessions/:id/extract_jd",
            post(sessions::handle_extract_jd),
        )
        .route(
            "/api/v1/sessions/:id/extract_resumes",
            post(sessions::handle_extract_resumes),
        )
        .route("/api/v1/sessions/:id/match", post(sessions::handle_match))
        .route("/api/v1/sessions/:id/save_jd", post(sessions::handle_save_jd))
        .route("/api/v1/sessions/:id/back", post(sessions::handle_back))
        .route("/api/v1/sessions/:id/reset", post(sessions::handle_reset))
        // Skill triage
        .route(
            "/api/v1/sessions/:id/skills",
            post(sessions::handle_add_skill),
        )
        .route(
            "/api/v1/sessions/:id/skills/move",
            post(sessions::handle_move_skill),
        )
        .route(
            "/api/v1/sessions/:id/skills/remove",
            post(sessions::handle_remove_skill),
        )
        // Document edits
        .route("/api/v1/sessions/:id/jd", patch(sessions::handle_edit_jd))
        .route(
            "/api/v1/sessions/:id/candidates/:index",
            patch(sessions::handle_edit_candidate),
        )
        // Document management
        .route(
            "/api/v1/sessions/:id/documents",
            get(documents::handle_list_documents),
        )
        .route(
            "/api/v1/sessions/:id/documents/:doc_id/status",
            patch(documents::handle_set_status),
        )
        .route(
            "/api/v1/sessions/:id/analyses",
            get(documents::handle_list_analyses),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .with_state(state)
}
