//! Repository layer for database operations
//!
//! Methods that take a `&mut PgConnection` are meant to run inside a caller's
//! transaction (`&mut tx`) or on a pooled connection for plain reads.

pub mod assignments;
pub mod equipment;
pub mod maintenance;
pub mod rentals;

use sqlx::{Pool, Postgres, Transaction};

use crate::error::AppResult;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub rentals: rentals::RentalsRepository,
    pub assignments: assignments::AssignmentsRepository,
    pub equipment: equipment::EquipmentRepository,
    pub maintenance: maintenance::MaintenanceRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            rentals: rentals::RentalsRepository,
            assignments: assignments::AssignmentsRepository,
            equipment: equipment::EquipmentRepository,
            maintenance: maintenance::MaintenanceRepository,
            pool,
        }
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Check the database answers
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
