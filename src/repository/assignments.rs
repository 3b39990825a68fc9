//! Equipment and employee assignment ledgers
//!
//! An entry is open while `status = 'active'`. Closing sets `completed` and
//! the end date; nothing reopens a completed entry.

use chrono::NaiveDate;
use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{
        assignment::{
            EmployeeAssignment, EquipmentAssignment, NewEmployeeAssignment, NewEquipmentAssignment,
        },
        enums::AssignmentStatus,
    },
};

#[derive(Clone, Copy, Default)]
pub struct AssignmentsRepository;

impl AssignmentsRepository {
    // -----------------------------------------------------------------------
    // Equipment ledger
    // -----------------------------------------------------------------------

    /// Open entries of one equipment, earliest first
    pub async fn open_for_equipment(
        &self,
        conn: &mut PgConnection,
        equipment_id: i32,
    ) -> AppResult<Vec<EquipmentAssignment>> {
        let rows = sqlx::query_as::<_, EquipmentAssignment>(
            r#"
            SELECT * FROM equipment_rental_history
            WHERE equipment_id = $1 AND status = $2
            ORDER BY start_date, id
            "#,
        )
        .bind(equipment_id)
        .bind(AssignmentStatus::Active)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Open entries of several equipment, in any context
    pub async fn open_for_equipment_ids(
        &self,
        conn: &mut PgConnection,
        equipment_ids: &[i32],
    ) -> AppResult<Vec<EquipmentAssignment>> {
        if equipment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EquipmentAssignment>(
            r#"
            SELECT * FROM equipment_rental_history
            WHERE equipment_id = ANY($1) AND status = $2
            ORDER BY equipment_id, start_date, id
            "#,
        )
        .bind(equipment_ids)
        .bind(AssignmentStatus::Active)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Open equipment entries bound to a rental
    pub async fn open_equipment_for_rental(
        &self,
        conn: &mut PgConnection,
        rental_id: i32,
    ) -> AppResult<Vec<EquipmentAssignment>> {
        let rows = sqlx::query_as::<_, EquipmentAssignment>(
            r#"
            SELECT * FROM equipment_rental_history
            WHERE rental_id = $1 AND status = $2
            ORDER BY equipment_id, start_date, id
            "#,
        )
        .bind(rental_id)
        .bind(AssignmentStatus::Active)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Full history of one equipment, newest first
    pub async fn history_for_equipment(
        &self,
        conn: &mut PgConnection,
        equipment_id: i32,
    ) -> AppResult<Vec<EquipmentAssignment>> {
        let rows = sqlx::query_as::<_, EquipmentAssignment>(
            r#"
            SELECT * FROM equipment_rental_history
            WHERE equipment_id = $1
            ORDER BY start_date DESC, id DESC
            "#,
        )
        .bind(equipment_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Get one equipment entry and lock it
    pub async fn lock_equipment_entry(
        &self,
        conn: &mut PgConnection,
        id: i32,
    ) -> AppResult<EquipmentAssignment> {
        sqlx::query_as::<_, EquipmentAssignment>(
            "SELECT * FROM equipment_rental_history WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Assignment {} not found", id)))
    }

    pub async fn create_equipment_entry(
        &self,
        conn: &mut PgConnection,
        data: &NewEquipmentAssignment,
    ) -> AppResult<EquipmentAssignment> {
        let row = sqlx::query_as::<_, EquipmentAssignment>(
            r#"
            INSERT INTO equipment_rental_history
                (equipment_id, assignment_type, rental_id, project_id, employee_id,
                 start_date, end_date, status, daily_rate, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(data.equipment_id)
        .bind(data.context.assignment_type())
        .bind(data.context.rental_id())
        .bind(data.context.project_id())
        .bind(data.employee_id)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(AssignmentStatus::Active)
        .bind(data.daily_rate)
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Move an open entry's window
    pub async fn refresh_equipment_entry(
        &self,
        conn: &mut PgConnection,
        id: i32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE equipment_rental_history
            SET start_date = $2, end_date = $3, updated_at = NOW()
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(id)
        .bind(start_date)
        .bind(end_date)
        .bind(AssignmentStatus::Active)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Close open equipment entries on `end_date`. Already closed entries are left alone.
    pub async fn close_equipment_entries(
        &self,
        conn: &mut PgConnection,
        ids: &[i32],
        end_date: NaiveDate,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE equipment_rental_history
            SET status = $2, end_date = GREATEST($3, start_date), updated_at = NOW()
            WHERE id = ANY($1) AND status = $4
            "#,
        )
        .bind(ids)
        .bind(AssignmentStatus::Completed)
        .bind(end_date)
        .bind(AssignmentStatus::Active)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_equipment_entries(&self, conn: &mut PgConnection, ids: &[i32]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM equipment_rental_history WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Employee ledger
    // -----------------------------------------------------------------------

    /// Open employee entries bound to a rental
    pub async fn open_employee_for_rental(
        &self,
        conn: &mut PgConnection,
        rental_id: i32,
    ) -> AppResult<Vec<EmployeeAssignment>> {
        let rows = sqlx::query_as::<_, EmployeeAssignment>(
            r#"
            SELECT * FROM employee_assignments
            WHERE rental_id = $1 AND status = $2
            ORDER BY employee_id, start_date, id
            "#,
        )
        .bind(rental_id)
        .bind(AssignmentStatus::Active)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Open employee entries moving with the given equipment entries
    pub async fn open_employee_for_equipment_entries(
        &self,
        conn: &mut PgConnection,
        equipment_assignment_ids: &[i32],
    ) -> AppResult<Vec<EmployeeAssignment>> {
        if equipment_assignment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EmployeeAssignment>(
            r#"
            SELECT * FROM employee_assignments
            WHERE equipment_assignment_id = ANY($1) AND status = $2
            ORDER BY id
            "#,
        )
        .bind(equipment_assignment_ids)
        .bind(AssignmentStatus::Active)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Full history of one employee, newest first
    pub async fn history_for_employee(
        &self,
        conn: &mut PgConnection,
        employee_id: i32,
    ) -> AppResult<Vec<EmployeeAssignment>> {
        let rows = sqlx::query_as::<_, EmployeeAssignment>(
            r#"
            SELECT * FROM employee_assignments
            WHERE employee_id = $1
            ORDER BY start_date DESC, id DESC
            "#,
        )
        .bind(employee_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    pub async fn create_employee_entry(
        &self,
        conn: &mut PgConnection,
        data: &NewEmployeeAssignment,
    ) -> AppResult<EmployeeAssignment> {
        let row = sqlx::query_as::<_, EmployeeAssignment>(
            r#"
            INSERT INTO employee_assignments
                (employee_id, assignment_type, rental_id, project_id, equipment_assignment_id,
                 name, start_date, end_date, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(data.employee_id)
        .bind(data.context.assignment_type())
        .bind(data.context.rental_id())
        .bind(data.context.project_id())
        .bind(data.equipment_assignment_id)
        .bind(&data.name)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(AssignmentStatus::Active)
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    pub async fn refresh_employee_entry(
        &self,
        conn: &mut PgConnection,
        id: i32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE employee_assignments
            SET start_date = $2, end_date = $3, updated_at = NOW()
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(id)
        .bind(start_date)
        .bind(end_date)
        .bind(AssignmentStatus::Active)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn close_employee_entries(
        &self,
        conn: &mut PgConnection,
        ids: &[i32],
        end_date: NaiveDate,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE employee_assignments
            SET status = $2, end_date = GREATEST($3, start_date), updated_at = NOW()
            WHERE id = ANY($1) AND status = $4
            "#,
        )
        .bind(ids)
        .bind(AssignmentStatus::Completed)
        .bind(end_date)
        .bind(AssignmentStatus::Active)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_employee_entries(&self, conn: &mut PgConnection, ids: &[i32]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM employee_assignments WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
