//! Rentals repository for database operations

use chrono::{Datelike, NaiveDate};
use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{RentalItemStatus, RentalStatus},
        rental::{CreateRental, CreateRentalItem, Rental, RentalItem, RentalTotals, UpdateRental},
    },
};

#[derive(Clone, Copy, Default)]
pub struct RentalsRepository;

impl RentalsRepository {
    /// List rentals, newest first. The status filter matches legacy literals too.
    pub async fn list(
        &self,
        conn: &mut PgConnection,
        status: Option<RentalStatus>,
    ) -> AppResult<Vec<Rental>> {
        let rows = sqlx::query_as::<_, Rental>(
            r#"
            SELECT * FROM rentals
            WHERE ($1::text[] IS NULL OR lower(trim(status)) = ANY($1))
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(status.map(|s| s.db_slugs().iter().map(|slug| slug.to_string()).collect::<Vec<String>>()))
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Get rental by ID
    pub async fn get_by_id(&self, conn: &mut PgConnection, id: i32) -> AppResult<Rental> {
        sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", id)))
    }

    /// Get rental by ID and lock the row for the rest of the transaction
    pub async fn lock(&self, conn: &mut PgConnection, id: i32) -> AppResult<Rental> {
        sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", id)))
    }

    /// Items of a rental in creation order
    pub async fn items(&self, conn: &mut PgConnection, rental_id: i32) -> AppResult<Vec<RentalItem>> {
        let rows = sqlx::query_as::<_, RentalItem>(
            "SELECT * FROM rental_items WHERE rental_id = $1 ORDER BY created_at, id",
        )
        .bind(rental_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Next `RENT-<year>-<seq>` number for the given year
    pub async fn next_rental_number(&self, conn: &mut PgConnection, today: NaiveDate) -> AppResult<String> {
        let prefix = format!("RENT-{}-", today.year());
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rentals WHERE rental_number LIKE $1 || '%'",
        )
        .bind(&prefix)
        .fetch_one(&mut *conn)
        .await?;
        Ok(format!("{}{:03}", prefix, count + 1))
    }

    /// Insert a rental in quotation state
    pub async fn create(
        &self,
        conn: &mut PgConnection,
        rental_number: &str,
        data: &CreateRental,
    ) -> AppResult<Rental> {
        let row = sqlx::query_as::<_, Rental>(
            r#"
            INSERT INTO rentals (rental_number, customer_name, status, start_date,
                                 expected_end_date, discount, tax_percent, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(rental_number)
        .bind(&data.customer_name)
        .bind(RentalStatus::Quotation)
        .bind(data.start_date)
        .bind(data.expected_end_date)
        .bind(data.discount.unwrap_or_default())
        .bind(data.tax_percent.unwrap_or_default())
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Rental number {} already exists", rental_number))
            }
            other => AppError::Database(other),
        })?;
        Ok(row)
    }

    /// Overwrite the fields present in `data`
    pub async fn update_details(
        &self,
        conn: &mut PgConnection,
        id: i32,
        data: &UpdateRental,
    ) -> AppResult<Rental> {
        let row = sqlx::query_as::<_, Rental>(
            r#"
            UPDATE rentals
            SET customer_name = COALESCE($2, customer_name),
                start_date = COALESCE($3, start_date),
                expected_end_date = COALESCE($4, expected_end_date),
                discount = COALESCE($5, discount),
                tax_percent = COALESCE($6, tax_percent),
                notes = COALESCE($7, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.customer_name)
        .bind(data.start_date)
        .bind(data.expected_end_date)
        .bind(data.discount)
        .bind(data.tax_percent)
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Insert a line item
    pub async fn create_item(
        &self,
        conn: &mut PgConnection,
        rental_id: i32,
        data: &CreateRentalItem,
    ) -> AppResult<RentalItem> {
        let row = sqlx::query_as::<_, RentalItem>(
            r#"
            INSERT INTO rental_items (rental_id, equipment_id, equipment_name, operator_id,
                                      unit_price, total_price, rate_type, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(rental_id)
        .bind(data.equipment_id)
        .bind(&data.equipment_name)
        .bind(data.operator_id)
        .bind(data.unit_price)
        .bind(data.total_price.unwrap_or(data.unit_price))
        .bind(data.rate_type.as_deref().unwrap_or("daily"))
        .bind(RentalItemStatus::Active)
        .bind(&data.notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Set a plain status (used for quotation transitions)
    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: i32,
        status: RentalStatus,
    ) -> AppResult<Rental> {
        let row = sqlx::query_as::<_, Rental>(
            "UPDATE rentals SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Move to active and clear the completion fields
    pub async fn mark_active(
        &self,
        conn: &mut PgConnection,
        id: i32,
        start_date: NaiveDate,
    ) -> AppResult<Rental> {
        let row = sqlx::query_as::<_, Rental>(
            r#"
            UPDATE rentals
            SET status = $2, start_date = $3, actual_end_date = NULL, completed_at = NULL,
                completed_by = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(RentalStatus::Active)
        .bind(start_date)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    /// Move to completed on `date`
    pub async fn mark_completed(
        &self,
        conn: &mut PgConnection,
        id: i32,
        date: NaiveDate,
        completed_by: Option<i32>,
    ) -> AppResult<Rental> {
        let row = sqlx::query_as::<_, Rental>(
            r#"
            UPDATE rentals
            SET status = $2, actual_end_date = $3, completed_at = $3, completed_by = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(RentalStatus::Completed)
        .bind(date)
        .bind(completed_by)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    pub async fn set_totals(
        &self,
        conn: &mut PgConnection,
        id: i32,
        totals: &RentalTotals,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE rentals
            SET subtotal = $2, tax_amount = $3, total_amount = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total_amount)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Bring completed items back to active
    pub async fn reactivate_items(&self, conn: &mut PgConnection, ids: &[i32]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE rental_items
            SET status = $2, completed_date = NULL, updated_at = NOW()
            WHERE id = ANY($1) AND status = $3
            "#,
        )
        .bind(ids)
        .bind(RentalItemStatus::Active)
        .bind(RentalItemStatus::Completed)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Complete still-active items on `date`
    pub async fn complete_items(
        &self,
        conn: &mut PgConnection,
        ids: &[i32],
        date: NaiveDate,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE rental_items
            SET status = $2, completed_date = $3, updated_at = NOW()
            WHERE id = ANY($1) AND status = $4
            "#,
        )
        .bind(ids)
        .bind(RentalItemStatus::Completed)
        .bind(date)
        .bind(RentalItemStatus::Active)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_item(&self, conn: &mut PgConnection, item_id: i32) -> AppResult<RentalItem> {
        sqlx::query_as::<_, RentalItem>("SELECT * FROM rental_items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental item {} not found", item_id)))
    }

    pub async fn delete_items(&self, conn: &mut PgConnection, ids: &[i32]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM rental_items WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
