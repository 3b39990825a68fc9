//! Equipment status derivation
//!
//! The stored `equipment.status` column is a cache of [`resolve`] over the
//! equipment's open ledger entries and pending maintenance records. Every
//! write to that column goes through this module or the monitor.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sqlx::PgConnection;
use thiserror::Error;

use crate::{
    error::AppResult,
    models::{
        assignment::{AssignmentContext, EquipmentAssignment},
        enums::{AssignmentType, EquipmentStatus},
        equipment::MaintenanceRecord,
    },
    repository::Repository,
};

/// Source data for one equipment is inconsistent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("entry {entry_id} is a rental assignment without a rental")]
    RentalEntryWithoutRental { entry_id: i32 },

    #[error("entry {entry_id} is a project assignment without a project")]
    ProjectEntryWithoutProject { entry_id: i32 },

    #[error("entry {entry_id} ends ({end}) before it starts ({start})")]
    InvertedDates {
        entry_id: i32,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// Resolver output for one equipment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: EquipmentStatus,
    /// Open entries sharing a context with an earlier one, to be closed
    pub redundant_entries: Vec<i32>,
    /// Open entries exist in more than one context
    pub conflicting: bool,
}

/// Derive the display status from open ledger entries and maintenance records.
///
/// Maintenance covering `today` wins over any open entry. Otherwise an open
/// rental entry means `rented`, any other open entry means `assigned`.
/// Closed entries in `entries` are ignored.
pub fn resolve(
    entries: &[EquipmentAssignment],
    maintenance: &[MaintenanceRecord],
    today: NaiveDate,
) -> Result<Resolution, ResolutionError> {
    let mut by_context: BTreeMap<AssignmentContext, Vec<&EquipmentAssignment>> = BTreeMap::new();

    for entry in entries.iter().filter(|e| e.is_open()) {
        if let Some(end) = entry.end_date {
            if end < entry.start_date {
                return Err(ResolutionError::InvertedDates {
                    entry_id: entry.id,
                    start: entry.start_date,
                    end,
                });
            }
        }
        let context = entry.context().ok_or_else(|| match entry.assignment_type {
            AssignmentType::Project => ResolutionError::ProjectEntryWithoutProject { entry_id: entry.id },
            _ => ResolutionError::RentalEntryWithoutRental { entry_id: entry.id },
        })?;
        by_context.entry(context).or_default().push(entry);
    }

    let mut redundant_entries = Vec::new();
    for group in by_context.values_mut() {
        group.sort_by_key(|e| (e.start_date, e.id));
        redundant_entries.extend(group.iter().skip(1).map(|e| e.id));
    }
    redundant_entries.sort_unstable();

    let under_maintenance = maintenance.iter().any(|m| m.covers(today));
    let status = if under_maintenance {
        EquipmentStatus::Maintenance
    } else if by_context.keys().any(|c| matches!(c, AssignmentContext::Rental(_))) {
        EquipmentStatus::Rented
    } else if !by_context.is_empty() {
        EquipmentStatus::Assigned
    } else {
        EquipmentStatus::Available
    };

    Ok(Resolution {
        status,
        redundant_entries,
        conflicting: by_context.len() > 1,
    })
}

/// A status written by [`recompute_in`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub equipment_id: i32,
    pub previous: String,
    pub status: EquipmentStatus,
}

/// Recompute and store the status of each equipment inside the caller's
/// transaction. The equipment rows must already be locked by the caller.
///
/// An equipment whose sources cannot be resolved keeps its stored status and
/// is left for the monitor; database errors abort the whole operation.
pub async fn recompute_in(
    repository: &Repository,
    conn: &mut PgConnection,
    equipment_ids: &[i32],
    today: NaiveDate,
) -> AppResult<Vec<StatusChange>> {
    let mut ids = equipment_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut changes = Vec::with_capacity(ids.len());
    for equipment_id in ids {
        let equipment = repository.equipment.get(&mut *conn, equipment_id).await?;
        let entries = repository.assignments.open_for_equipment(&mut *conn, equipment_id).await?;
        let maintenance = repository.maintenance.pending_for_equipment(&mut *conn, equipment_id).await?;

        let resolution = match resolve(&entries, &maintenance, today) {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(equipment_id, error = %e, "Status not recomputed, left for the monitor");
                continue;
            }
        };

        repository
            .equipment
            .write_status(&mut *conn, equipment_id, resolution.status)
            .await?;

        if equipment.status != resolution.status.as_str() {
            tracing::debug!(
                equipment_id,
                from = %equipment.status,
                to = %resolution.status,
                "Equipment status updated"
            );
        }
        changes.push(StatusChange {
            equipment_id,
            previous: equipment.status,
            status: resolution.status,
        });
    }
    Ok(changes)
}

/// Recompute inside a caller's transaction and return the single status
pub async fn recompute_one_in(
    repository: &Repository,
    conn: &mut PgConnection,
    equipment_id: i32,
    today: NaiveDate,
) -> AppResult<Option<EquipmentStatus>> {
    let changes = recompute_in(repository, conn, &[equipment_id], today).await?;
    Ok(changes.first().map(|c| c.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{AssignmentStatus, MaintenanceStatus};
    use chrono::Utc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn entry(
        id: i32,
        assignment_type: AssignmentType,
        rental_id: Option<i32>,
        start: NaiveDate,
    ) -> EquipmentAssignment {
        let now = Utc::now();
        EquipmentAssignment {
            id,
            equipment_id: 10,
            assignment_type,
            rental_id,
            project_id: None,
            employee_id: None,
            start_date: start,
            end_date: None,
            status: AssignmentStatus::Active,
            daily_rate: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn maintenance(status: MaintenanceStatus, scheduled: Option<NaiveDate>) -> MaintenanceRecord {
        let now = Utc::now();
        MaintenanceRecord {
            id: 1,
            equipment_id: 10,
            title: "Service".into(),
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
    fn test_no_entries_is_available() {
        let resolution = resolve(&[], &[], day(1)).unwrap();
        assert_eq!(resolution.status, EquipmentStatus::Available);
        assert!(resolution.redundant_entries.is_empty());
        assert!(!resolution.conflicting);
    }

    #[test]
    fn test_open_rental_entry_is_rented() {
        let entries = vec![entry(1, AssignmentType::Rental, Some(5), day(1))];
        assert_eq!(resolve(&entries, &[], day(2)).unwrap().status, EquipmentStatus::Rented);
    }

    #[test]
    fn test_manual_entry_is_assigned() {
        let mut manual = entry(1, AssignmentType::Manual, None, day(1));
        manual.employee_id = Some(4);
        assert_eq!(resolve(&[manual], &[], day(2)).unwrap().status, EquipmentStatus::Assigned);
    }

    #[test]
    fn test_closed_entries_are_ignored() {
        let mut closed = entry(1, AssignmentType::Rental, Some(5), day(1));
        closed.status = AssignmentStatus::Completed;
        closed.end_date = Some(day(3));
        assert_eq!(resolve(&[closed], &[], day(4)).unwrap().status, EquipmentStatus::Available);
    }

    #[test]
    fn test_maintenance_overrides_open_rental() {
        let entries = vec![entry(1, AssignmentType::Rental, Some(5), day(1))];
        let records = vec![maintenance(MaintenanceStatus::InProgress, None)];
        let resolution = resolve(&entries, &records, day(2)).unwrap();
        assert_eq!(resolution.status, EquipmentStatus::Maintenance);
    }

    #[test]
    fn test_future_maintenance_does_not_cover_today() {
        let entries = vec![entry(1, AssignmentType::Rental, Some(5), day(1))];
        let records = vec![maintenance(MaintenanceStatus::Open, Some(day(20)))];
        assert_eq!(resolve(&entries, &records, day(2)).unwrap().status, EquipmentStatus::Rented);
        assert_eq!(
            resolve(&entries, &records, day(20)).unwrap().status,
            EquipmentStatus::Maintenance
        );
    }

    #[test]
    fn test_duplicates_keep_earliest_entry() {
        let entries = vec![
            entry(7, AssignmentType::Rental, Some(5), day(3)),
            entry(3, AssignmentType::Rental, Some(5), day(1)),
            entry(9, AssignmentType::Rental, Some(5), day(1)),
        ];
        let resolution = resolve(&entries, &[], day(4)).unwrap();
        assert_eq!(resolution.redundant_entries, vec![7, 9]);
        assert!(!resolution.conflicting);
    }

    #[test]
    fn test_different_contexts_are_conflicting() {
        let entries = vec![
            entry(1, AssignmentType::Rental, Some(5), day(1)),
            entry(2, AssignmentType::Rental, Some(6), day(2)),
        ];
        let resolution = resolve(&entries, &[], day(3)).unwrap();
        assert!(resolution.conflicting);
        assert!(resolution.redundant_entries.is_empty());
        assert_eq!(resolution.status, EquipmentStatus::Rented);
    }

    #[test]
    fn test_rental_entry_without_rental_fails() {
        let entries = vec![entry(4, AssignmentType::Rental, None, day(1))];
        assert_eq!(
            resolve(&entries, &[], day(2)),
            Err(ResolutionError::RentalEntryWithoutRental { entry_id: 4 })
        );
    }

    #[test]
    fn test_inverted_dates_fail() {
        let mut bad = entry(4, AssignmentType::Rental, Some(5), day(10));
        bad.end_date = Some(day(2));
        assert!(matches!(
            resolve(&[bad], &[], day(11)),
            Err(ResolutionError::InvertedDates { entry_id: 4, .. })
        ));
    }
}
