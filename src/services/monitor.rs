//! Equipment status reconciliation
//!
//! Re-derives every equipment's status from its ledger and maintenance
//! records and corrects rows that drifted. Each correction is its own
//! transaction guarded by `status_version`, so a sweep never blocks live
//! rental operations and never overwrites a status they just wrote.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use super::equipment_status::{resolve, Resolution};
use crate::{
    error::{AppError, AppResult},
    models::{
        assignment::EquipmentAssignment,
        enums::EquipmentStatus,
        equipment::{Equipment, MaintenanceRecord},
        monitor::{EquipmentStatusView, FixReport, IssueReason, StatusCount, StatusIssue, StatusSummary},
    },
    repository::Repository,
};

/// Inputs of the resolver for one equipment
#[derive(Debug, Clone, Default)]
pub struct StatusSources {
    pub entries: Vec<EquipmentAssignment>,
    pub maintenance: Vec<MaintenanceRecord>,
}

/// One optimistic write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub equipment_id: i32,
    pub expected_version: i64,
    /// `None` leaves the stored status as is
    pub new_status: Option<EquipmentStatus>,
    /// Redundant open entries to close
    pub close_entries: Vec<i32>,
    pub close_date: NaiveDate,
}

/// Storage used by the monitor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn list_equipment(&self) -> AppResult<Vec<Equipment>>;

    async fn get_equipment(&self, equipment_id: i32) -> AppResult<Equipment>;

    async fn load_sources(&self, equipment_id: i32) -> AppResult<StatusSources>;

    /// Apply a correction in one transaction. Returns `false` when the row
    /// changed since it was read; nothing is written in that case.
    async fn apply_correction(&self, correction: &Correction) -> AppResult<bool>;

    async fn status_counts(&self) -> AppResult<Vec<StatusCount>>;
}

/// Postgres-backed store
pub struct PgStatusStore {
    repository: Repository,
}

impl PgStatusStore {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn list_equipment(&self) -> AppResult<Vec<Equipment>> {
        let mut conn = self.repository.pool.acquire().await?;
        self.repository.equipment.list(&mut conn).await
    }

    async fn get_equipment(&self, equipment_id: i32) -> AppResult<Equipment> {
        let mut conn = self.repository.pool.acquire().await?;
        self.repository.equipment.get(&mut conn, equipment_id).await
    }

    async fn load_sources(&self, equipment_id: i32) -> AppResult<StatusSources> {
        let mut conn = self.repository.pool.acquire().await?;
        let entries = self
            .repository
            .assignments
            .open_for_equipment(&mut conn, equipment_id)
            .await?;
        let maintenance = self
            .repository
            .maintenance
            .pending_for_equipment(&mut conn, equipment_id)
            .await?;
        Ok(StatusSources { entries, maintenance })
    }

    async fn apply_correction(&self, correction: &Correction) -> AppResult<bool> {
        let mut tx = self.repository.begin().await?;
        let claimed = self
            .repository
            .equipment
            .write_status_if_version(
                &mut tx,
                correction.equipment_id,
                correction.expected_version,
                correction.new_status,
            )
            .await?;
        if !claimed {
            return Ok(false);
        }
        self.repository
            .assignments
            .close_equipment_entries(&mut tx, &correction.close_entries, correction.close_date)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn status_counts(&self) -> AppResult<Vec<StatusCount>> {
        let mut conn = self.repository.pool.acquire().await?;
        self.repository.equipment.status_counts(&mut conn).await
    }
}

/// What the monitor found for one equipment
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub derived: Option<EquipmentStatus>,
    pub issues: Vec<StatusIssue>,
    pub correction: Option<Correction>,
}

fn issue(equipment: &Equipment, expected: Option<EquipmentStatus>, reason: IssueReason, details: Option<String>) -> StatusIssue {
    StatusIssue {
        equipment_id: equipment.id,
        equipment_name: equipment.name.clone(),
        current_status: equipment.status.clone(),
        expected_status: expected,
        reason,
        details,
    }
}

fn mismatch_reason(stored: Option<EquipmentStatus>, derived: EquipmentStatus) -> IssueReason {
    match (stored, derived) {
        (None, _) => IssueReason::UnrecognizedStatus,
        (_, EquipmentStatus::Maintenance) => IssueReason::MissingMaintenance,
        (Some(EquipmentStatus::Maintenance), _) => IssueReason::OrphanedMaintenance,
        (Some(s), EquipmentStatus::Available) if s.is_committed() => IssueReason::StaleAssignment,
        _ => IssueReason::MissingAssignment,
    }
}

/// Compare stored status with the resolver's answer
pub fn evaluate(equipment: &Equipment, sources: &StatusSources, today: NaiveDate) -> Evaluation {
    let Resolution {
        status,
        redundant_entries,
        conflicting,
    } = match resolve(&sources.entries, &sources.maintenance, today) {
        Ok(resolution) => resolution,
        Err(e) => {
            return Evaluation {
                derived: None,
                issues: vec![issue(equipment, None, IssueReason::ResolutionFailure, Some(e.to_string()))],
                correction: None,
            }
        }
    };

    let stored = equipment.stored_status();
    let mut issues = Vec::new();

    if conflicting {
        let contexts: Vec<String> = sources
            .entries
            .iter()
            .filter(|e| e.is_open())
            .filter_map(|e| e.context().map(|c| format!("{} (entry {})", c, e.id)))
            .collect();
        issues.push(issue(
            equipment,
            Some(status),
            IssueReason::ConflictingAssignments,
            Some(contexts.join(", ")),
        ));
    }

    if !redundant_entries.is_empty() {
        issues.push(issue(
            equipment,
            Some(status),
            IssueReason::DuplicateActiveEntries,
            Some(format!("closing entries {:?}", redundant_entries)),
        ));
    }

    let status_differs = stored != Some(status);
    if status_differs {
        issues.push(issue(equipment, Some(status), mismatch_reason(stored, status), None));
    }

    let correction = (status_differs || !redundant_entries.is_empty()).then(|| Correction {
        equipment_id: equipment.id,
        expected_version: equipment.status_version,
        new_status: status_differs.then_some(status),
        close_entries: redundant_entries,
        close_date: today,
    });

    Evaluation {
        derived: Some(status),
        issues,
        correction,
    }
}

#[derive(Clone)]
pub struct MonitorService {
    store: Arc<dyn StatusStore>,
    sweep_lock: Arc<Mutex<()>>,
}

impl MonitorService {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self {
            store,
            sweep_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Check every equipment and fix drift. Fails with Conflict when a sweep
    /// is already running.
    pub async fn check_and_fix_equipment_status(&self, today: NaiveDate) -> AppResult<FixReport> {
        let _guard = self
            .sweep_lock
            .try_lock()
            .map_err(|_| AppError::Conflict("An equipment status sweep is already running".to_string()))?;
        self.sweep(today, true).await
    }

    /// Scheduled sweep. Returns `None` when the previous one is still running.
    pub async fn run_scheduled(&self, today: NaiveDate) -> AppResult<Option<FixReport>> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            tracing::info!("Equipment status sweep still running, skipping this tick");
            return Ok(None);
        };
        self.sweep(today, true).await.map(Some)
    }

    /// What the next fix pass would change, without writing
    pub async fn get_equipment_with_issues(&self, today: NaiveDate) -> AppResult<Vec<StatusIssue>> {
        Ok(self.sweep(today, false).await?.issues)
    }

    /// Count of equipment per stored status
    pub async fn get_equipment_status_summary(&self) -> AppResult<StatusSummary> {
        let counts = self.store.status_counts().await?;
        Ok(StatusSummary {
            total: counts.iter().map(|c| c.count).sum(),
            counts,
        })
    }

    /// Stored and derived status of one equipment with its sources
    pub async fn inspect(&self, equipment_id: i32, today: NaiveDate) -> AppResult<EquipmentStatusView> {
        let equipment = self.store.get_equipment(equipment_id).await?;
        let sources = self.store.load_sources(equipment_id).await?;
        let evaluation = evaluate(&equipment, &sources, today);
        Ok(EquipmentStatusView {
            equipment_id,
            stored_status: equipment.status,
            derived_status: evaluation.derived,
            as_of: today,
            open_entries: sources.entries,
            pending_maintenance: sources.maintenance,
            issues: evaluation.issues,
        })
    }

    async fn sweep(&self, today: NaiveDate, fix: bool) -> AppResult<FixReport> {
        let started_at = Utc::now();
        let equipment = self.store.list_equipment().await?;

        let mut report = FixReport {
            checked: equipment.len(),
            started_at: Some(started_at),
            ..FixReport::default()
        };

        for item in &equipment {
            let sources = match self.store.load_sources(item.id).await {
                Ok(sources) => sources,
                Err(e) => {
                    tracing::error!(equipment_id = item.id, error = %e, "Could not load status sources");
                    report
                        .issues
                        .push(issue(item, None, IssueReason::CorrectionFailed, Some(e.to_string())));
                    continue;
                }
            };

            let evaluation = evaluate(item, &sources, today);
            for found in &evaluation.issues {
                if found.reason == IssueReason::ResolutionFailure {
                    tracing::error!(
                        equipment_id = item.id,
                        details = ?found.details,
                        "Equipment status could not be resolved"
                    );
                }
            }
            report.issues.extend(evaluation.issues);

            let Some(correction) = evaluation.correction.filter(|_| fix) else {
                continue;
            };

            match self.store.apply_correction(&correction).await {
                Ok(true) => {
                    report.fixed += 1;
                    tracing::warn!(
                        equipment_id = item.id,
                        from = %item.status,
                        to = ?correction.new_status,
                        closed_entries = ?correction.close_entries,
                        "Equipment status drift corrected"
                    );
                }
                Ok(false) => {
                    tracing::info!(equipment_id = item.id, "Equipment changed during sweep, left for next run");
                    report.issues.push(issue(
                        item,
                        evaluation.derived,
                        IssueReason::ConcurrentUpdate,
                        None,
                    ));
                }
                Err(e) => {
                    tracing::error!(equipment_id = item.id, error = %e, "Equipment status correction failed");
                    report.issues.push(issue(
                        item,
                        evaluation.derived,
                        IssueReason::CorrectionFailed,
                        Some(e.to_string()),
                    ));
                }
            }
        }

        report.finished_at = Some(Utc::now());
        tracing::info!(
            checked = report.checked,
            fixed = report.fixed,
            issues = report.issues.len(),
            fix,
            "Equipment status sweep finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{AssignmentStatus, AssignmentType, MaintenanceStatus};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn equipment(id: i32, status: &str) -> Equipment {
        let now = Utc::now();
        Equipment {
            id,
            name: format!("Excavator {}", id),
            model_number: None,
            status: status.to_string(),
            status_version: 4,
            created_at: now,
            updated_at: now,
        }
    }

    fn rental_entry(id: i32, equipment_id: i32, rental_id: i32) -> EquipmentAssignment {
        let now = Utc::now();
        EquipmentAssignment {
            id,
            equipment_id,
            assignment_type: AssignmentType::Rental,
            rental_id: Some(rental_id),
            project_id: None,
            employee_id: None,
            start_date: day(1),
            end_date: None,
            status: AssignmentStatus::Active,
            daily_rate: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn maintenance(equipment_id: i32) -> MaintenanceRecord {
        let now = Utc::now();
        MaintenanceRecord {
            id: 1,
            equipment_id,
            title: "Track repair".into(),
            status: MaintenanceStatus::Open,
            scheduled_date: None,
            started_at: None,
            completed_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_evaluate_reasons() {
        let empty = StatusSources::default();
        let rented = StatusSources {
            entries: vec![rental_entry(1, 1, 5)],
            maintenance: vec![],
        };
        let serviced = StatusSources {
            entries: vec![],
            maintenance: vec![maintenance(1)],
        };

        let reason = |e: Evaluation| e.issues[0].reason;
        assert_eq!(reason(evaluate(&equipment(1, "rented"), &empty, day(2))), IssueReason::StaleAssignment);
        assert_eq!(reason(evaluate(&equipment(1, "available"), &rented, day(2))), IssueReason::MissingAssignment);
        assert_eq!(reason(evaluate(&equipment(1, "maintenance"), &empty, day(2))), IssueReason::OrphanedMaintenance);
        assert_eq!(reason(evaluate(&equipment(1, "rented"), &serviced, day(2))), IssueReason::MissingMaintenance);
        assert_eq!(reason(evaluate(&equipment(1, "broken"), &empty, day(2))), IssueReason::UnrecognizedStatus);
    }

    #[test]
    fn test_evaluate_agreeing_row_needs_nothing() {
        let sources = StatusSources {
            entries: vec![rental_entry(1, 1, 5)],
            maintenance: vec![],
        };
        let evaluation = evaluate(&equipment(1, "rented"), &sources, day(2));
        assert!(evaluation.issues.is_empty());
        assert!(evaluation.correction.is_none());
    }

    #[test]
    fn test_evaluate_closes_duplicates_without_status_change() {
        let sources = StatusSources {
            entries: vec![rental_entry(1, 1, 5), rental_entry(2, 1, 5)],
            maintenance: vec![],
        };
        let evaluation = evaluate(&equipment(1, "rented"), &sources, day(2));
        assert_eq!(evaluation.issues.len(), 1);
        assert_eq!(evaluation.issues[0].reason, IssueReason::DuplicateActiveEntries);
        let correction = evaluation.correction.unwrap();
        assert_eq!(correction.new_status, None);
        assert_eq!(correction.close_entries, vec![2]);
        assert_eq!(correction.expected_version, 4);
    }

    #[test]
    fn test_evaluate_reports_conflicts_without_closing() {
        let sources = StatusSources {
            entries: vec![rental_entry(1, 1, 5), rental_entry(2, 1, 6)],
            maintenance: vec![],
        };
        let evaluation = evaluate(&equipment(1, "rented"), &sources, day(2));
        assert_eq!(evaluation.issues[0].reason, IssueReason::ConflictingAssignments);
        assert!(evaluation.correction.is_none());
    }

    #[tokio::test]
    async fn test_sweep_fixes_drift() {
        let mut store = MockStatusStore::new();
        store
            .expect_list_equipment()
            .returning(|| Ok(vec![equipment(1, "rented"), equipment(2, "available")]));
        store
            .expect_load_sources()
            .returning(|_| Ok(StatusSources::default()));
        store
            .expect_apply_correction()
            .withf(|c| c.equipment_id == 1 && c.new_status == Some(EquipmentStatus::Available))
            .times(1)
            .returning(|_| Ok(true));

        let monitor = MonitorService::new(Arc::new(store));
        let report = monitor.check_and_fix_equipment_status(day(2)).await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.fixed, 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].reason, IssueReason::StaleAssignment);
        assert_eq!(report.issues[0].expected_status, Some(EquipmentStatus::Available));
    }

    #[tokio::test]
    async fn test_sweep_continues_after_failure() {
        let mut store = MockStatusStore::new();
        store
            .expect_list_equipment()
            .returning(|| Ok(vec![equipment(1, "available"), equipment(2, "assigned")]));
        store.expect_load_sources().returning(|id| {
            if id == 1 {
                Err(AppError::Internal("decode failure".to_string()))
            } else {
                Ok(StatusSources::default())
            }
        });
        store
            .expect_apply_correction()
            .times(1)
            .returning(|_| Ok(true));

        let monitor = MonitorService::new(Arc::new(store));
        let report = monitor.check_and_fix_equipment_status(day(2)).await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.fixed, 1);
        let reasons: Vec<IssueReason> = report.issues.iter().map(|i| i.reason).collect();
        assert_eq!(reasons, vec![IssueReason::CorrectionFailed, IssueReason::StaleAssignment]);
    }

    #[tokio::test]
    async fn test_lost_optimistic_write_is_reported() {
        let mut store = MockStatusStore::new();
        store
            .expect_list_equipment()
            .returning(|| Ok(vec![equipment(1, "rented")]));
        store
            .expect_load_sources()
            .returning(|_| Ok(StatusSources::default()));
        store.expect_apply_correction().returning(|_| Ok(false));

        let monitor = MonitorService::new(Arc::new(store));
        let report = monitor.check_and_fix_equipment_status(day(2)).await.unwrap();
        assert_eq!(report.fixed, 0);
        assert!(report
            .issues
            .iter()
            .any(|i| i.reason == IssueReason::ConcurrentUpdate));
    }

    #[tokio::test]
    async fn test_preview_never_writes() {
        let mut store = MockStatusStore::new();
        store
            .expect_list_equipment()
            .returning(|| Ok(vec![equipment(1, "maintenance")]));
        store
            .expect_load_sources()
            .returning(|_| Ok(StatusSources::default()));
        store.expect_apply_correction().times(0);

        let monitor = MonitorService::new(Arc::new(store));
        let issues = monitor.get_equipment_with_issues(day(2)).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].reason, IssueReason::OrphanedMaintenance);
    }

    #[tokio::test]
    async fn test_list_failure_aborts_sweep() {
        let mut store = MockStatusStore::new();
        store
            .expect_list_equipment()
            .returning(|| Err(AppError::Internal("pool closed".to_string())));

        let monitor = MonitorService::new(Arc::new(store));
        assert!(monitor.check_and_fix_equipment_status(day(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_overlapping_sweeps_are_rejected() {
        let store = MockStatusStore::new();
        let monitor = MonitorService::new(Arc::new(store));

        let _running = monitor.sweep_lock.lock().await;
        assert!(matches!(
            monitor.check_and_fix_equipment_status(day(2)).await,
            Err(AppError::Conflict(_))
        ));
        assert!(monitor.run_scheduled(day(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_summary_totals_counts() {
        let mut store = MockStatusStore::new();
        store.expect_status_counts().returning(|| {
            Ok(vec![
                StatusCount { status: "available".into(), count: 7 },
                StatusCount { status: "rented".into(), count: 3 },
            ])
        });

        let monitor = MonitorService::new(Arc::new(store));
        let summary = monitor.get_equipment_status_summary().await.unwrap();
        assert_eq!(summary.total, 10);
        assert_eq!(summary.counts.len(), 2);
    }
}
