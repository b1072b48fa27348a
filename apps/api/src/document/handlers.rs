//! HTTP handlers for the document API. Each handler resolves the caller's
//! session store and routes through the store's normal operations; nothing
//! here mutates the document directly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::document::reconciler::SaveReport;
use crate::document::status::SaveStatus;
use crate::errors::AppError;
use crate::models::cv::{
    CertificationEntry, Cv, EducationEntry, EntryId, ExtracurricularEntry, PersonalInfoPatch,
    ProjectEntry, SectionKind, SectionSetting, SkillEntry, WorkExperienceEntry,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct AddEntryResponse {
    pub id: EntryId,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: SaveStatus,
}

#[derive(Deserialize)]
pub struct TemplateBody {
    pub template_id: String,
}

#[derive(Deserialize)]
pub struct BulletBody {
    pub text: String,
}

fn parse_patch<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))
}

/// GET /api/v1/cv
pub async fn handle_get_cv(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Cv>, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    Ok(Json(store.snapshot()))
}

/// PUT /api/v1/cv/personal
pub async fn handle_update_personal(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(patch): Json<PersonalInfoPatch>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    store.update_personal_info(patch);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/cv/template
pub async fn handle_set_template(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(body): Json<TemplateBody>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    store.set_template(body.template_id);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/cv/sections
pub async fn handle_update_section_order(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(sections): Json<Vec<SectionSetting>>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    store.update_section_order(sections);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/cv/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    store.reset();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/cv/load: refresh the in-memory document from storage,
/// e.g. after switching the active version.
pub async fn handle_load(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Cv>, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    store.load().await;
    Ok(Json(store.snapshot()))
}

/// POST /api/v1/cv/save: immediate save, bypassing the debounce.
pub async fn handle_save(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<SaveReport>, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    let report = store.save_now().await?;
    Ok(Json(report))
}

/// GET /api/v1/cv/status
pub async fn handle_save_status(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    Ok(Json(StatusResponse {
        status: store.status(),
    }))
}

// ── per-section entry operations ────────────────────────────────────────

/// POST /api/v1/cv/:section/entries
pub async fn handle_add_entry(
    State(state): State<AppState>,
    Path(section): Path<SectionKind>,
    Query(params): Query<UserIdQuery>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<AddEntryResponse>), AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    let id = match section {
        SectionKind::Education => store.add_entry::<EducationEntry>(parse_patch(body)?),
        SectionKind::WorkExperience => store.add_entry::<WorkExperienceEntry>(parse_patch(body)?),
        SectionKind::Skills => store.add_entry::<SkillEntry>(parse_patch(body)?),
        SectionKind::Projects => store.add_entry::<ProjectEntry>(parse_patch(body)?),
        SectionKind::Certifications => store.add_entry::<CertificationEntry>(parse_patch(body)?),
        SectionKind::Extracurricular => {
            store.add_entry::<ExtracurricularEntry>(parse_patch(body)?)
        }
    };
    Ok((StatusCode::CREATED, Json(AddEntryResponse { id })))
}

/// PATCH /api/v1/cv/:section/entries/:id
pub async fn handle_update_entry(
    State(state): State<AppState>,
    Path((section, id)): Path<(SectionKind, EntryId)>,
    Query(params): Query<UserIdQuery>,
    Json(body): Json<Value>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    let found = match section {
        SectionKind::Education => store.update_entry::<EducationEntry>(id, parse_patch(body)?),
        SectionKind::WorkExperience => {
            store.update_entry::<WorkExperienceEntry>(id, parse_patch(body)?)
        }
        SectionKind::Skills => store.update_entry::<SkillEntry>(id, parse_patch(body)?),
        SectionKind::Projects => store.update_entry::<ProjectEntry>(id, parse_patch(body)?),
        SectionKind::Certifications => {
            store.update_entry::<CertificationEntry>(id, parse_patch(body)?)
        }
        SectionKind::Extracurricular => {
            store.update_entry::<ExtracurricularEntry>(id, parse_patch(body)?)
        }
    };
    if found {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("entry {id}")))
    }
}

/// DELETE /api/v1/cv/:section/entries/:id
/// Idempotent: deleting an already-deleted entry is still 204.
pub async fn handle_remove_entry(
    State(state): State<AppState>,
    Path((section, id)): Path<(SectionKind, EntryId)>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    match section {
        SectionKind::Education => store.remove_entry::<EducationEntry>(id),
        SectionKind::WorkExperience => store.remove_entry::<WorkExperienceEntry>(id),
        SectionKind::Skills => store.remove_entry::<SkillEntry>(id),
        SectionKind::Projects => store.remove_entry::<ProjectEntry>(id),
        SectionKind::Certifications => store.remove_entry::<CertificationEntry>(id),
        SectionKind::Extracurricular => store.remove_entry::<ExtracurricularEntry>(id),
    };
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/cv/:section/reorder. The body is the full id permutation;
/// the store validates and applies it atomically under the document lock.
pub async fn handle_reorder_entries(
    State(state): State<AppState>,
    Path(section): Path<SectionKind>,
    Query(params): Query<UserIdQuery>,
    Json(ids): Json<Vec<EntryId>>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    match section {
        SectionKind::Education => store.reorder_entries_by_ids::<EducationEntry>(&ids)?,
        SectionKind::WorkExperience => store.reorder_entries_by_ids::<WorkExperienceEntry>(&ids)?,
        SectionKind::Skills => store.reorder_entries_by_ids::<SkillEntry>(&ids)?,
        SectionKind::Projects => store.reorder_entries_by_ids::<ProjectEntry>(&ids)?,
        SectionKind::Certifications => store.reorder_entries_by_ids::<CertificationEntry>(&ids)?,
        SectionKind::Extracurricular => store.reorder_entries_by_ids::<ExtracurricularEntry>(&ids)?,
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── nested bullet-point operations ──────────────────────────────────────

/// POST /api/v1/cv/experience/:id/bullets
pub async fn handle_add_bullet(
    State(state): State<AppState>,
    Path(experience): Path<EntryId>,
    Query(params): Query<UserIdQuery>,
    Json(body): Json<BulletBody>,
) -> Result<(StatusCode, Json<AddEntryResponse>), AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    match store.add_bullet(experience, body.text) {
        Some(id) => Ok((StatusCode::CREATED, Json(AddEntryResponse { id }))),
        None => Err(AppError::NotFound(format!("experience {experience}"))),
    }
}

/// PATCH /api/v1/cv/experience/:id/bullets/:bullet_id
pub async fn handle_update_bullet(
    State(state): State<AppState>,
    Path((experience, bullet)): Path<(EntryId, EntryId)>,
    Query(params): Query<UserIdQuery>,
    Json(body): Json<BulletBody>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    if store.update_bullet(experience, bullet, body.text) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("bullet {bullet}")))
    }
}

/// DELETE /api/v1/cv/experience/:id/bullets/:bullet_id
pub async fn handle_remove_bullet(
    State(state): State<AppState>,
    Path((experience, bullet)): Path<(EntryId, EntryId)>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    store.remove_bullet(experience, bullet);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/cv/experience/:id/bullets/reorder
pub async fn handle_reorder_bullets(
    State(state): State<AppState>,
    Path(experience): Path<EntryId>,
    Query(params): Query<UserIdQuery>,
    Json(ids): Json<Vec<EntryId>>,
) -> Result<StatusCode, AppError> {
    let store = state.sessions.store_for(params.user_id).await;
    match store.reorder_bullets_by_ids(experience, &ids) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(AppError::NotFound(format!("experience {experience}"))),
        Err(e) => Err(e.into()),
    }
}
