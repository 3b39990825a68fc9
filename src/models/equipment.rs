//! Equipment and maintenance models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::{EquipmentStatus, MaintenanceStatus};

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub model_number: Option<String>,
    /// Stored display status. Kept as raw text so that a corrupt value can be
    /// reported and repaired instead of failing the whole row.
    pub status: String,
    /// Bumped on every status write
    pub status_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// Parsed stored status, `None` when the column holds an unknown value
    pub fn stored_status(&self) -> Option<EquipmentStatus> {
        self.status.parse().ok()
    }
}

/// Equipment maintenance record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MaintenanceRecord {
    pub id: i32,
    pub equipment_id: i32,
    pub title: String,
    pub status: MaintenanceStatus,
    /// Not before this day; `None` means immediately
    pub scheduled_date: Option<NaiveDate>,
    pub started_at: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaintenanceRecord {
    /// Whether this record puts the equipment under maintenance on `day`
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.status.is_pending() && self.scheduled_date.map_or(true, |d| d <= day)
    }
}

/// Open a maintenance record
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMaintenance {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    /// Start work immediately (`in_progress`) instead of `open`
    #[serde(default)]
    pub start_now: bool,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Close a maintenance record
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteMaintenance {
    /// Defaults to today
    pub completed_at: Option<NaiveDate>,
    /// Mark as cancelled instead of completed
    #[serde(default)]
    pub cancel: bool,
}

/// Result of a maintenance change, with the recomputed equipment status
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaintenanceOutcome {
    pub maintenance: MaintenanceRecord,
    pub equipment_status: Option<EquipmentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: MaintenanceStatus, scheduled: Option<NaiveDate>) -> MaintenanceRecord {
        let now = Utc::now();
        MaintenanceRecord {
            id: 1,
            equipment_id: 7,
            title: "Hydraulics".into(),
            status,
            scheduled_date: scheduled,
            started_at: None,
            completed_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_covers_unscheduled_and_past_dates() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        assert!(record(MaintenanceStatus::Open, None).covers(today));
        assert!(record(MaintenanceStatus::InProgress, Some(today)).covers(today));
        assert!(!record(MaintenanceStatus::Open, today.succ_opt()).covers(today));
    }

    #[test]
    fn test_closed_records_never_cover() {
        let today = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        assert!(!record(MaintenanceStatus::Completed, None).covers(today));
        assert!(!record(MaintenanceStatus::Cancelled, None).covers(today));
    }
}
