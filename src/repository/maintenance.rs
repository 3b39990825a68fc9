//! Equipment maintenance records

use chrono::NaiveDate;
use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::MaintenanceStatus,
        equipment::{CreateMaintenance, MaintenanceRecord},
    },
};

#[derive(Clone, Copy, Default)]
pub struct MaintenanceRepository;

impl MaintenanceRepository {
    /// Open and in-progress records of one equipment
    pub async fn pending_for_equipment(
        &self,
        conn: &mut PgConnection,
        equipment_id: i32,
    ) -> AppResult<Vec<MaintenanceRecord>> {
        let rows = sqlx::query_as::<_, MaintenanceRecord>(
            r#"
            SELECT * FROM equipment_maintenance
            WHERE equipment_id = $1 AND status IN ($2, $3)
            ORDER BY scheduled_date NULLS FIRST, id
            "#,
        )
        .bind(equipment_id)
        .bind(MaintenanceStatus::Open)
        .bind(MaintenanceStatus::InProgress)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    pub async fn create(
        &self,
        conn: &mut PgConnection,
        equipment_id: i32,
        data: &CreateMaintenance,
        today: NaiveDate,
    ) -> AppResult<MaintenanceRecord> {
        let (status, started_at) = if data.start_now {
            (MaintenanceStatus::InProgress, Some(today))
        } else {
            (MaintenanceStatus::Open, None)
        };

        let row = sqlx::query_as::<_, MaintenanceRecord>(
            r#"
            INSERT INTO equipment_maintenance
                (equipment_id, title, status, scheduled_date, started_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(equipment_id)
        .bind(data.title.as_deref().unwrap_or("Maintenance"))
        .bind(status)
        .bind(data.scheduled_date)
        .bind(started_at)
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Get one record and lock it
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<MaintenanceRecord> {
        sqlx::query_as::<_, MaintenanceRecord>(
            "SELECT * FROM equipment_maintenance WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Maintenance record {} not found", id)))
    }

    /// Close a record as completed or cancelled
    pub async fn close(
        &self,
        conn: &mut PgConnection,
        id: i32,
        status: MaintenanceStatus,
        date: NaiveDate,
    ) -> AppResult<MaintenanceRecord> {
        let row = sqlx::query_as::<_, MaintenanceRecord>(
            r#"
            UPDATE equipment_maintenance
            SET status = $2, completed_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(date)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }
}
