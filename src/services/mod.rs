//! Business logic services

pub mod assignments;
pub mod equipment_status;
pub mod lifecycle;
pub mod maintenance;
pub mod monitor;
pub mod rentals;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::repository::Repository;

/// Calendar day used for ledger boundaries
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub rentals: rentals::RentalsService,
    pub assignments: assignments::AssignmentsService,
    pub maintenance: maintenance::MaintenanceService,
    pub monitor: monitor::MonitorService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository) -> Self {
        let store = Arc::new(monitor::PgStatusStore::new(repository.clone()));
        Self {
            rentals: rentals::RentalsService::new(repository.clone()),
            assignments: assignments::AssignmentsService::new(repository.clone()),
            maintenance: maintenance::MaintenanceService::new(repository.clone()),
            monitor: monitor::MonitorService::new(store),
            repository,
        }
    }

    /// Database readiness
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        self.repository.ping().await
    }
}
