pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::report::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // HTML flow
        .route("/", get(handlers::handle_index))
        .route("/process_resume", post(handlers::handle_process_resume))
        .route("/upload_jd", get(handlers::handle_upload_jd))
        .route("/process_jd", post(handlers::handle_process_jd))
        .route("/result", get(handlers::handle_result))
        // JSON API
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route("/api/v1/highlight", post(handlers::handle_highlight))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
