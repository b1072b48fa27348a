use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::document::handlers::UserIdQuery;
use crate::errors::AppError;
use crate::models::version::CvVersionRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateVersionRequest {
    pub title: String,
}

/// GET /api/v1/versions
pub async fn handle_list_versions(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<CvVersionRow>>, AppError> {
    let versions = state.versions.list(params.user_id).await?;
    Ok(Json(versions))
}

/// POST /api/v1/versions: snapshot the current document as a new active version.
pub async fn handle_create_version(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<CvVersionRow>), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    let store = state.sessions.store_for(params.user_id).await;
    let cv = store.snapshot();
    let row = state
        .versions
        .create(params.user_id, &cv, &cv.template_id, req.title.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// POST /api/v1/versions/:id/activate
/// Switching and reloading are deliberately two steps; the client follows
/// up with POST /api/v1/cv/load once it is ready to swap the document.
pub async fn handle_activate_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<CvVersionRow>, AppError> {
    let row = state.versions.switch_active(params.user_id, id).await?;
    Ok(Json(row))
}

/// POST /api/v1/versions/:id/duplicate
pub async fn handle_duplicate_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<(StatusCode, Json<CvVersionRow>), AppError> {
    let row = state.versions.duplicate(params.user_id, id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// DELETE /api/v1/versions/:id
pub async fn handle_delete_version(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    state.versions.delete(params.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
