use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::cv::Cv;

/// A named, independently stored snapshot of the full CV document.
/// At most one row per user carries `is_active = true`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvVersionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cv_data: Json<Cv>,
    pub template: String,
    pub title: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
