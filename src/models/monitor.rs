//! Status monitor reports

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{
    assignment::EquipmentAssignment,
    enums::EquipmentStatus,
    equipment::MaintenanceRecord,
};

/// Why an equipment row was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueReason {
    /// Stored as rented/assigned with no open entry behind it
    StaleAssignment,
    /// Open entry exists but the stored status does not reflect it
    MissingAssignment,
    /// Stored as maintenance with no pending record covering today
    OrphanedMaintenance,
    /// Pending maintenance covers today but the stored status differs
    MissingMaintenance,
    /// Stored status is not a known value
    UnrecognizedStatus,
    /// Several open entries for the same context
    DuplicateActiveEntries,
    /// Open entries in different contexts (double booking)
    ConflictingAssignments,
    /// Sources are inconsistent and no status could be derived
    ResolutionFailure,
    /// Row changed between read and write, left for the next sweep
    ConcurrentUpdate,
    /// Reading or writing this row failed
    CorrectionFailed,
}

/// One flagged equipment row
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusIssue {
    pub equipment_id: i32,
    pub equipment_name: String,
    /// Raw stored value
    pub current_status: String,
    pub expected_status: Option<EquipmentStatus>,
    pub reason: IssueReason,
    pub details: Option<String>,
}

/// Result of a reconciliation sweep
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FixReport {
    pub checked: usize,
    pub fixed: usize,
    pub issues: Vec<StatusIssue>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Equipment count per stored status
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Stored status counts
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusSummary {
    pub total: i64,
    pub counts: Vec<StatusCount>,
}

/// Detailed view of one equipment's status sources
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentStatusView {
    pub equipment_id: i32,
    pub stored_status: String,
    pub derived_status: Option<EquipmentStatus>,
    pub as_of: NaiveDate,
    pub open_entries: Vec<EquipmentAssignment>,
    pub pending_maintenance: Vec<MaintenanceRecord>,
    pub issues: Vec<StatusIssue>,
}
