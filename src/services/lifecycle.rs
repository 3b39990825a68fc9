//! Rental lifecycle planning
//!
//! Pure functions that turn the current rows of a rental into the list of
//! writes an operation needs. The rental service loads the rows inside its
//! transaction, asks for a plan and applies it; keeping the decisions here
//! makes them testable without a database.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{
        assignment::{
            AssignmentContext, EmployeeAssignment, EquipmentAssignment, NewEmployeeAssignment,
            NewEquipmentAssignment,
        },
        enums::RentalStatus,
        rental::{CreateRentalItem, Rental, RentalItem, RentalTotals, UpdateRental},
    },
};

/// Ensure-or-update step for one ledger entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp<N> {
    Create(N),
    Refresh {
        entry_id: i32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPlan {
    /// Whether the rental moves into `active` (as opposed to a resync)
    pub transition: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Completed items brought back to active
    pub reactivate_items: Vec<i32>,
    pub equipment_ops: Vec<LedgerOp<NewEquipmentAssignment>>,
    pub employee_ops: Vec<LedgerOp<NewEmployeeAssignment>>,
    /// Extra open entries for the same (resource, rental), closed on `start_date`
    pub close_equipment_entries: Vec<i32>,
    pub close_employee_entries: Vec<i32>,
    pub equipment_ids: Vec<i32>,
}

impl ActivationPlan {
    pub fn created<N>(ops: &[LedgerOp<N>]) -> usize {
        ops.iter().filter(|op| matches!(op, LedgerOp::Create(_))).count()
    }

    pub fn refreshed<N>(ops: &[LedgerOp<N>]) -> usize {
        ops.iter().filter(|op| matches!(op, LedgerOp::Refresh { .. })).count()
    }
}

/// Plan an activation.
///
/// `open_equipment` holds every open entry of the equipment named by the
/// rental's items, in any context. `open_employee` holds the open employee
/// entries of this rental.
pub fn plan_activation(
    rental: &Rental,
    items: &[RentalItem],
    open_equipment: &[EquipmentAssignment],
    open_employee: &[EmployeeAssignment],
    today: NaiveDate,
) -> AppResult<ActivationPlan> {
    let transition = rental.status != RentalStatus::Active;
    let start_date = rental.start_date.or_today(today);
    let end_date = rental.expected_end_date;

    if let Some(end) = end_date {
        if end < start_date {
            return Err(AppError::Validation(format!(
                "Expected end date {} is before start date {}",
                end, start_date
            )));
        }
    }

    let reactivate_items: Vec<i32> = if transition {
        items.iter().filter(|i| !i.is_active()).map(|i| i.id).collect()
    } else {
        Vec::new()
    };
    let live_items: Vec<&RentalItem> = items
        .iter()
        .filter(|i| i.is_active() || reactivate_items.contains(&i.id))
        .collect();

    let context = AssignmentContext::Rental(rental.id);
    let mut equipment_ops = Vec::new();
    let mut close_equipment_entries = Vec::new();
    let mut equipment_ids = BTreeSet::new();

    for item in &live_items {
        if !equipment_ids.insert(item.equipment_id) {
            // A second item for the same equipment shares the first one's entry
            continue;
        }

        if let Some(other) = open_equipment.iter().find(|e| {
            e.equipment_id == item.equipment_id && e.is_open() && e.rental_id != Some(rental.id)
        }) {
            return Err(AppError::Conflict(format!(
                "Equipment {} already has open assignment {} ({})",
                item.equipment_id,
                other.id,
                other
                    .context()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| other.assignment_type.to_string())
            )));
        }

        let mut mine: Vec<&EquipmentAssignment> = open_equipment
            .iter()
            .filter(|e| e.equipment_id == item.equipment_id && e.is_open() && e.rental_id == Some(rental.id))
            .collect();
        mine.sort_by_key(|e| (e.start_date, e.id));

        match mine.split_first() {
            Some((kept, extra)) => {
                if kept.start_date != start_date || kept.end_date != end_date {
                    equipment_ops.push(LedgerOp::Refresh {
                        entry_id: kept.id,
                        start_date,
                        end_date,
                    });
                }
                close_equipment_entries.extend(extra.iter().map(|e| e.id));
            }
            None => equipment_ops.push(LedgerOp::Create(NewEquipmentAssignment {
                equipment_id: item.equipment_id,
                context,
                employee_id: item.operator_id,
                start_date,
                end_date,
                daily_rate: Some(item.unit_price),
                notes: None,
            })),
        }
    }

    let mut employee_ops = Vec::new();
    let mut close_employee_entries = Vec::new();
    let mut operators = BTreeSet::new();

    for item in &live_items {
        let Some(operator_id) = item.operator_id else {
            continue;
        };
        if !operators.insert(operator_id) {
            continue;
        }

        let mut mine: Vec<&EmployeeAssignment> = open_employee
            .iter()
            .filter(|e| e.employee_id == operator_id && e.is_open() && e.rental_id == Some(rental.id))
            .collect();
        mine.sort_by_key(|e| (e.start_date, e.id));

        match mine.split_first() {
            Some((kept, extra)) => {
                if kept.start_date != start_date || kept.end_date != end_date {
                    employee_ops.push(LedgerOp::Refresh {
                        entry_id: kept.id,
                        start_date,
                        end_date,
                    });
                }
                close_employee_entries.extend(extra.iter().map(|e| e.id));
            }
            None => employee_ops.push(LedgerOp::Create(NewEmployeeAssignment {
                employee_id: operator_id,
                context,
                equipment_assignment_id: None,
                name: Some(format!("Rental {}", rental.rental_number)),
                start_date,
                end_date,
                notes: None,
            })),
        }
    }

    Ok(ActivationPlan {
        transition,
        start_date,
        end_date,
        reactivate_items,
        equipment_ops,
        employee_ops,
        close_equipment_entries,
        close_employee_entries,
        equipment_ids: equipment_ids.into_iter().collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPlan {
    pub completion_date: NaiveDate,
    pub items: Vec<i32>,
    pub equipment_entries: Vec<i32>,
    pub employee_entries: Vec<i32>,
    /// Every equipment whose status must be recomputed
    pub equipment_ids: Vec<i32>,
}

/// Plan a completion. Only an active rental can be completed.
pub fn plan_completion(
    rental: &Rental,
    items: &[RentalItem],
    open_equipment: &[EquipmentAssignment],
    open_employee: &[EmployeeAssignment],
    today: NaiveDate,
) -> AppResult<CompletionPlan> {
    if rental.status != RentalStatus::Active {
        return Err(AppError::InvalidState(
            "Rental must be active before completion".to_string(),
        ));
    }

    let equipment_entries: Vec<&EquipmentAssignment> = open_equipment
        .iter()
        .filter(|e| e.is_open() && e.rental_id == Some(rental.id))
        .collect();

    let equipment_ids: BTreeSet<i32> = items
        .iter()
        .map(|i| i.equipment_id)
        .chain(equipment_entries.iter().map(|e| e.equipment_id))
        .collect();

    Ok(CompletionPlan {
        completion_date: today,
        items: items.iter().filter(|i| i.is_active()).map(|i| i.id).collect(),
        equipment_entries: equipment_entries.iter().map(|e| e.id).collect(),
        employee_entries: open_employee
            .iter()
            .filter(|e| e.is_open() && e.rental_id == Some(rental.id))
            .map(|e| e.id)
            .collect(),
        equipment_ids: equipment_ids.into_iter().collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnPlan {
    pub return_date: NaiveDate,
    pub equipment_entries: Vec<i32>,
    pub employee_entries: Vec<i32>,
}

/// Plan an early return of one item.
///
/// The operator's entry is closed only when no other active item of the
/// rental is run by the same operator.
pub fn plan_return(
    rental: &Rental,
    items: &[RentalItem],
    item_id: i32,
    open_equipment: &[EquipmentAssignment],
    open_employee: &[EmployeeAssignment],
    return_date: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<ReturnPlan> {
    let item = items
        .iter()
        .find(|i| i.id == item_id && i.rental_id == rental.id)
        .ok_or_else(|| {
            AppError::NotFound(format!("Item {} not found in rental {}", item_id, rental.id))
        })?;

    if !item.is_active() {
        return Err(AppError::InvalidState(format!(
            "Rental item {} is already completed",
            item.id
        )));
    }

    let return_date = return_date.unwrap_or(today);

    let equipment_entries: Vec<&EquipmentAssignment> = open_equipment
        .iter()
        .filter(|e| {
            e.is_open() && e.rental_id == Some(rental.id) && e.equipment_id == item.equipment_id
        })
        .collect();

    // A second active item on the same equipment keeps the entry open
    let equipment_still_used = items
        .iter()
        .any(|i| i.id != item.id && i.is_active() && i.equipment_id == item.equipment_id);
    let equipment_entries: Vec<&EquipmentAssignment> = if equipment_still_used {
        Vec::new()
    } else {
        equipment_entries
    };

    if let Some(entry) = equipment_entries.iter().find(|e| e.start_date > return_date) {
        return Err(AppError::Validation(format!(
            "Return date {} is before assignment start {}",
            return_date, entry.start_date
        )));
    }

    let employee_entries = match item.operator_id {
        Some(operator_id)
            if !items.iter().any(|i| {
                i.id != item.id && i.is_active() && i.operator_id == Some(operator_id)
            }) =>
        {
            open_employee
                .iter()
                .filter(|e| {
                    e.is_open() && e.rental_id == Some(rental.id) && e.employee_id == operator_id
                })
                .map(|e| e.id)
                .collect()
        }
        _ => Vec::new(),
    };

    Ok(ReturnPlan {
        return_date,
        equipment_entries: equipment_entries.iter().map(|e| e.id).collect(),
        employee_entries,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupPlan {
    pub items: Vec<i32>,
    pub equipment_entries: Vec<i32>,
    pub employee_entries: Vec<i32>,
    pub equipment_ids: Vec<i32>,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.equipment_entries.is_empty() && self.employee_entries.is_empty()
    }
}

/// Group items and open entries of one rental by resource, keep the first
/// created of each group and list the rest for removal.
pub fn plan_duplicate_cleanup(
    rental_id: i32,
    items: &[RentalItem],
    open_equipment: &[EquipmentAssignment],
    open_employee: &[EmployeeAssignment],
) -> CleanupPlan {
    fn extras<T, K: Ord, S: Ord>(
        rows: Vec<&T>,
        key: impl Fn(&T) -> K,
        order: impl Fn(&T) -> S,
        id: impl Fn(&T) -> i32,
    ) -> Vec<i32> {
        let mut groups: BTreeMap<K, Vec<&T>> = BTreeMap::new();
        for row in rows {
            groups.entry(key(row)).or_default().push(row);
        }
        let mut out: Vec<i32> = groups
            .into_values()
            .flat_map(|mut group| {
                group.sort_by_key(|r| order(*r));
                group.into_iter().skip(1).map(&id).collect::<Vec<_>>()
            })
            .collect();
        out.sort_unstable();
        out
    }

    let items_removed = extras(
        items.iter().filter(|i| i.rental_id == rental_id).collect(),
        |i| i.equipment_id,
        |i| (i.created_at, i.id),
        |i| i.id,
    );
    let equipment_entries = extras(
        open_equipment
            .iter()
            .filter(|e| e.is_open() && e.rental_id == Some(rental_id))
            .collect(),
        |e| e.equipment_id,
        |e| (e.start_date, e.id),
        |e| e.id,
    );
    let employee_entries = extras(
        open_employee
            .iter()
            .filter(|e| e.is_open() && e.rental_id == Some(rental_id))
            .collect(),
        |e| e.employee_id,
        |e| (e.start_date, e.id),
        |e| e.id,
    );

    let removed_entries: HashSet<i32> = equipment_entries.iter().copied().collect();
    let equipment_ids: BTreeSet<i32> = items
        .iter()
        .filter(|i| items_removed.contains(&i.id))
        .map(|i| i.equipment_id)
        .chain(
            open_equipment
                .iter()
                .filter(|e| removed_entries.contains(&e.id))
                .map(|e| e.equipment_id),
        )
        .collect();

    CleanupPlan {
        items: items_removed,
        equipment_entries,
        employee_entries,
        equipment_ids: equipment_ids.into_iter().collect(),
    }
}

/// Rental amounts from its items, rounded to cents
pub fn compute_totals(items: &[RentalItem], discount: Decimal, tax_percent: Decimal) -> RentalTotals {
    let subtotal: Decimal = items.iter().map(|i| i.total_price).sum();
    let taxable = subtotal - discount;
    let tax_amount = (taxable * tax_percent / Decimal::ONE_HUNDRED).round_dp(2);
    RentalTotals {
        subtotal: subtotal.round_dp(2),
        tax_amount,
        total_amount: (taxable + tax_amount).round_dp(2),
    }
}

/// Reject new items naming equipment already on the rental or repeated in the batch
pub fn check_new_items(existing: &[RentalItem], new_items: &[CreateRentalItem]) -> AppResult<()> {
    let mut seen: HashSet<i32> = existing.iter().map(|i| i.equipment_id).collect();
    for item in new_items {
        if !seen.insert(item.equipment_id) {
            return Err(AppError::Conflict(format!(
                "Equipment {} is already on this rental",
                item.equipment_id
            )));
        }
    }
    Ok(())
}

/// `quotation -> quotation_generated`
pub fn check_quotation_generated(rental: &Rental) -> AppResult<()> {
    match rental.status {
        RentalStatus::Quotation => Ok(()),
        other => Err(AppError::InvalidState(format!(
            "Quotation can only be generated for a rental in quotation state (current: {})",
            other
        ))),
    }
}

/// Equipment rows an item insert touches, in lock order
pub fn equipment_to_lock(items: &[RentalItem], new_equipment_id: i32) -> Vec<i32> {
    items
        .iter()
        .map(|i| i.equipment_id)
        .chain(std::iter::once(new_equipment_id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Dates and amounts stay editable until completion
pub fn check_rental_update(rental: &Rental, data: &UpdateRental) -> AppResult<()> {
    if rental.status == RentalStatus::Completed {
        return Err(AppError::InvalidState(format!(
            "Rental {} is completed and can no longer be edited",
            rental.rental_number
        )));
    }
    if data.discount.is_some_and(|d| d < Decimal::ZERO) {
        return Err(AppError::Validation("Discount cannot be negative".to_string()));
    }
    if data.tax_percent.is_some_and(|t| t < Decimal::ZERO) {
        return Err(AppError::Validation("Tax percent cannot be negative".to_string()));
    }
    let start = data.start_date.or(rental.start_date.as_date());
    let end = data.expected_end_date.or(rental.expected_end_date);
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::Validation(format!(
                "Expected end date {} is before start date {}",
                end, start
            )));
        }
    }
    Ok(())
}

/// Items can be added until the rental is completed
pub fn check_items_editable(rental: &Rental) -> AppResult<()> {
    if rental.status == RentalStatus::Completed {
        return Err(AppError::InvalidState(
            "Items cannot be added to a completed rental".to_string(),
        ));
    }
    Ok(())
}
