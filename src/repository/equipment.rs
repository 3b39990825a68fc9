//! Equipment repository: rows, locks and status writes

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{enums::EquipmentStatus, equipment::Equipment, monitor::StatusCount},
};

#[derive(Clone, Copy, Default)]
pub struct EquipmentRepository;

impl EquipmentRepository {
    /// List all equipment
    pub async fn list(&self, conn: &mut PgConnection) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    /// Get equipment by ID
    pub async fn get(&self, conn: &mut PgConnection, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Lock equipment rows in id order. Fails with NotFound when one is missing.
    pub async fn lock(&self, conn: &mut PgConnection, ids: &[i32]) -> AppResult<Vec<Equipment>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, Equipment>(
            "SELECT * FROM equipment WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        if let Some(missing) = ids.iter().find(|id| !rows.iter().any(|r| r.id == **id)) {
            return Err(AppError::NotFound(format!("Equipment {} not found", missing)));
        }
        Ok(rows)
    }

    /// Write a status and bump the version. Returns the new version.
    pub async fn write_status(
        &self,
        conn: &mut PgConnection,
        id: i32,
        status: EquipmentStatus,
    ) -> AppResult<i64> {
        let version: i64 = sqlx::query_scalar(
            r#"
            UPDATE equipment
            SET status = $2, status_version = status_version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING status_version
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        Ok(version)
    }

    /// Optimistic write: applies only if nobody wrote since `expected_version`
    /// was read. `None` keeps the stored status but still claims the row.
    pub async fn write_status_if_version(
        &self,
        conn: &mut PgConnection,
        id: i32,
        expected_version: i64,
        status: Option<EquipmentStatus>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE equipment
            SET status = COALESCE($3, status), status_version = status_version + 1,
                updated_at = NOW()
            WHERE id = $1 AND status_version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(status)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Count equipment per stored status
    pub async fn status_counts(&self, conn: &mut PgConnection) -> AppResult<Vec<StatusCount>> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM equipment GROUP BY status ORDER BY status",
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }
}
