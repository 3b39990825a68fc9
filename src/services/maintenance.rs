//! Maintenance records; every change recomputes the equipment status

use validator::Validate;

use super::{equipment_status, today};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::MaintenanceStatus,
        equipment::{CompleteMaintenance, CreateMaintenance, MaintenanceOutcome},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct MaintenanceService {
    repository: Repository,
}

impl MaintenanceService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Open a maintenance record
    pub async fn open(&self, equipment_id: i32, data: CreateMaintenance) -> AppResult<MaintenanceOutcome> {
        data.validate()?;
        let today = today();
        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        repo.equipment.lock(&mut tx, &[equipment_id]).await?;
        let maintenance = repo.maintenance.create(&mut tx, equipment_id, &data, today).await?;
        let equipment_status =
            equipment_status::recompute_one_in(repo, &mut tx, equipment_id, today).await?;
        tx.commit().await?;

        tracing::info!(
            equipment_id,
            maintenance_id = maintenance.id,
            scheduled_date = ?maintenance.scheduled_date,
            "Maintenance opened"
        );
        Ok(MaintenanceOutcome {
            maintenance,
            equipment_status,
        })
    }

    /// Complete or cancel a maintenance record
    pub async fn complete(&self, id: i32, data: CompleteMaintenance) -> AppResult<MaintenanceOutcome> {
        let today = today();
        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        let record = repo.maintenance.lock(&mut tx, id).await?;
        if !record.status.is_pending() {
            return Err(AppError::InvalidState(format!(
                "Maintenance record {} is already {}",
                id, record.status
            )));
        }

        let status = if data.cancel {
            MaintenanceStatus::Cancelled
        } else {
            MaintenanceStatus::Completed
        };
        let date = data.completed_at.unwrap_or(today);

        repo.equipment.lock(&mut tx, &[record.equipment_id]).await?;
        let maintenance = repo.maintenance.close(&mut tx, id, status, date).await?;
        let equipment_status =
            equipment_status::recompute_one_in(repo, &mut tx, record.equipment_id, today).await?;
        tx.commit().await?;

        tracing::info!(
            equipment_id = maintenance.equipment_id,
            maintenance_id = id,
            status = %status,
            "Maintenance closed"
        );
        Ok(MaintenanceOutcome {
            maintenance,
            equipment_status,
        })
    }
}
