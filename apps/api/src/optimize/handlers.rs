use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::document::handlers::UserIdQuery;
use crate::errors::AppError;
use crate::optimize::{apply_suggestion, OptimizationReport, Suggestion};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub job_text: String,
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    pub job_title: String,
    pub company: String,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Serialize)]
pub struct ApplyResponse {
    pub applied: usize,
    pub skipped: usize,
}

/// POST /api/v1/optimize: score the current document against a job description.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<OptimizationReport>, AppError> {
    if req.job_text.trim().is_empty() {
        return Err(AppError::Validation(
            "job_text must not be empty".to_string(),
        ));
    }
    let store = state.sessions.store_for(params.user_id).await;
    let snapshot = store.snapshot();
    let report = state.optimizer.analyze(&snapshot, &req.job_text).await?;
    Ok(Json(report))
}

/// POST /api/v1/optimize/apply: apply accepted suggestions through the
/// store's normal operations, stamping job-specific provenance.
pub async fn handle_apply(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<ApplyRequest>,
) -> Result<Json<ApplyResponse>, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    let mut applied = 0;
    let mut skipped = 0;
    for suggestion in &req.suggestions {
        if apply_suggestion(&store, suggestion, &req.job_title, &req.company) {
            applied += 1;
        } else {
            skipped += 1;
        }
    }
    Ok(Json(ApplyResponse { applied, skipped }))
}
