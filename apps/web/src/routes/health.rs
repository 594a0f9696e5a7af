use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status and which backends are active.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cvmatch-web",
        "llm": {
            "available": state.llm.is_some(),
            "working_model": state.llm.as_ref().and_then(|llm| llm.working_model()),
        },
        "analyzer": state.analyzer.backend(),
        "aliases": state.aliases.backend(),
        "embeddings": state.similarity.backend(),
        "sessions": state.sessions.backend(),
        "scoring_formula": state.scoring_formula.to_string(),
    }))
}
