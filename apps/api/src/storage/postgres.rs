//! Postgres-backed version record store. Activation-shaped writes run inside
//! a single transaction, so a mid-way failure rolls back to the previously
//! active record instead of leaving zero active rows.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::cv::Cv;
use crate::models::version::CvVersionRow;
use crate::storage::{NewVersion, RemoteError, RemoteStore};

pub struct PgRemoteStore {
    pool: PgPool,
}

impl PgRemoteStore {
    pub fn new(pool: PgPool) -> Self {
        PgRemoteStore { pool }
    }
}

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn fetch_active(&self, user: Uuid) -> Result<Option<CvVersionRow>, RemoteError> {
        Ok(sqlx::query_as::<_, CvVersionRow>(
            "SELECT * FROM cv_versions WHERE user_id = $1 AND is_active",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn fetch_version(
        &self,
        user: Uuid,
        id: Uuid,
    ) -> Result<Option<CvVersionRow>, RemoteError> {
        Ok(sqlx::query_as::<_, CvVersionRow>(
            "SELECT * FROM cv_versions WHERE user_id = $1 AND id = $2",
        )
        .bind(user)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_versions(&self, user: Uuid) -> Result<Vec<CvVersionRow>, RemoteError> {
        Ok(sqlx::query_as::<_, CvVersionRow>(
            "SELECT * FROM cv_versions WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_version(
        &self,
        user: Uuid,
        new: NewVersion<'_>,
    ) -> Result<CvVersionRow, RemoteError> {
        let mut tx = self.pool.begin().await?;

        if new.active {
            sqlx::query(
                "UPDATE cv_versions SET is_active = false, updated_at = now()
                 WHERE user_id = $1 AND is_active",
            )
            .bind(user)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, CvVersionRow>(
            r#"
            INSERT INTO cv_versions (id, user_id, cv_data, template, title, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user)
        .bind(Json(new.cv_data))
        .bind(new.template)
        .bind(new.title)
        .bind(new.active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn update_version(
        &self,
        user: Uuid,
        id: Uuid,
        cv_data: &Cv,
        template: &str,
        title: &str,
    ) -> Result<Option<CvVersionRow>, RemoteError> {
        Ok(sqlx::query_as::<_, CvVersionRow>(
            r#"
            UPDATE cv_versions
            SET cv_data = $3, template = $4, title = $5, updated_at = now()
            WHERE user_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(user)
        .bind(id)
        .bind(Json(cv_data))
        .bind(template)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn set_active(&self, user: Uuid, id: Uuid) -> Result<Option<CvVersionRow>, RemoteError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM cv_versions WHERE user_id = $1 AND id = $2 FOR UPDATE")
                .bind(user)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            // Unknown target: roll back without touching the current active row.
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "UPDATE cv_versions SET is_active = false, updated_at = now()
             WHERE user_id = $1 AND is_active AND id <> $2",
        )
        .bind(user)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, CvVersionRow>(
            r#"
            UPDATE cv_versions SET is_active = true, updated_at = now()
            WHERE user_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(user)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn delete_version(&self, user: Uuid, id: Uuid) -> Result<bool, RemoteError> {
        let result = sqlx::query("DELETE FROM cv_versions WHERE user_id = $1 AND id = $2")
            .bind(user)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
