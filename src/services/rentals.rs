//! Rental lifecycle service
//!
//! Each public operation runs in a single transaction: the rental row is
//! locked first, then the equipment rows it touches (in id order). Equipment
//! status is recomputed before commit, so a caller never reads a completed
//! rental whose equipment still shows as rented.

use chrono::NaiveDate;
use sqlx::PgConnection;

use super::{equipment_status, lifecycle, lifecycle::LedgerOp, today};
use crate::{
    error::AppResult,
    models::{
        enums::RentalStatus,
        rental::{
            ActivationOutcome, CleanupOutcome, CompletionOutcome, CreateRental, CreateRentalItem,
            Rental, RentalDetails, RentalTotals, ReturnOutcome, UpdateRental,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct RentalsService {
    repository: Repository,
}

impl RentalsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List rentals, optionally filtered by status
    pub async fn list(&self, status: Option<RentalStatus>) -> AppResult<Vec<Rental>> {
        let mut conn = self.repository.pool.acquire().await?;
        self.repository.rentals.list(&mut conn, status).await
    }

    /// Get a rental with its items
    pub async fn get(&self, id: i32) -> AppResult<RentalDetails> {
        let mut conn = self.repository.pool.acquire().await?;
        self.details(&mut conn, id).await
    }

    /// Create a rental with its items, optionally activating it right away
    pub async fn create(&self, data: CreateRental) -> AppResult<RentalDetails> {
        lifecycle::check_new_items(&[], &data.items)?;
        let today = today();

        let mut tx = self.repository.begin().await?;

        let equipment_ids: Vec<i32> = data.items.iter().map(|i| i.equipment_id).collect();
        self.repository.equipment.lock(&mut tx, &equipment_ids).await?;

        let rental_number = match &data.rental_number {
            Some(number) => number.trim().to_string(),
            None => self.repository.rentals.next_rental_number(&mut tx, today).await?,
        };
        let rental = self.repository.rentals.create(&mut tx, &rental_number, &data).await?;
        for item in &data.items {
            self.repository.rentals.create_item(&mut tx, rental.id, item).await?;
        }
        self.refresh_totals(&mut tx, &rental).await?;

        if data.activate {
            self.activate_in(&mut tx, rental.id, today).await?;
        }

        let details = self.details(&mut tx, rental.id).await?;
        tx.commit().await?;

        tracing::info!(
            rental_id = details.rental.id,
            rental_number = %details.rental.rental_number,
            items = details.items.len(),
            status = %details.rental.status,
            "Rental created"
        );
        Ok(details)
    }

    /// Add a line item. On an active rental the item's ledger entries are
    /// opened immediately.
    pub async fn add_item(&self, rental_id: i32, item: CreateRentalItem) -> AppResult<RentalDetails> {
        let today = today();
        let mut tx = self.repository.begin().await?;

        let rental = self.repository.rentals.lock(&mut tx, rental_id).await?;
        lifecycle::check_items_editable(&rental)?;
        let items = self.repository.rentals.items(&mut tx, rental_id).await?;
        lifecycle::check_new_items(&items, std::slice::from_ref(&item))?;

        // Same set and order activation locks, taken once up front
        let equipment_ids = lifecycle::equipment_to_lock(&items, item.equipment_id);
        self.repository.equipment.lock(&mut tx, &equipment_ids).await?;
        let created = self.repository.rentals.create_item(&mut tx, rental_id, &item).await?;
        self.refresh_totals(&mut tx, &rental).await?;

        if rental.status == RentalStatus::Active {
            self.activate_in(&mut tx, rental_id, today).await?;
        }

        let details = self.details(&mut tx, rental_id).await?;
        tx.commit().await?;

        tracing::info!(rental_id, item_id = created.id, equipment_id = created.equipment_id, "Rental item added");
        Ok(details)
    }

    /// Edit dates, amounts or notes. Open ledger entries of an active rental
    /// follow the new dates in the same transaction.
    pub async fn update(&self, rental_id: i32, data: UpdateRental) -> AppResult<RentalDetails> {
        let today = today();
        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        let rental = repo.rentals.lock(&mut tx, rental_id).await?;
        lifecycle::check_rental_update(&rental, &data)?;
        let items = repo.rentals.items(&mut tx, rental_id).await?;
        let equipment_ids: Vec<i32> = items.iter().map(|i| i.equipment_id).collect();
        repo.equipment.lock(&mut tx, &equipment_ids).await?;

        let updated = repo.rentals.update_details(&mut tx, rental_id, &data).await?;
        self.refresh_totals(&mut tx, &updated).await?;

        if updated.status == RentalStatus::Active {
            self.activate_in(&mut tx, rental_id, today).await?;
        }

        let details = self.details(&mut tx, rental_id).await?;
        tx.commit().await?;

        tracing::info!(
            rental_id,
            start_date = ?details.rental.start_date.as_date(),
            expected_end_date = ?details.rental.expected_end_date,
            "Rental updated"
        );
        Ok(details)
    }

    /// `quotation -> quotation_generated`
    pub async fn mark_quotation_generated(&self, rental_id: i32) -> AppResult<Rental> {
        let mut tx = self.repository.begin().await?;
        let rental = self.repository.rentals.lock(&mut tx, rental_id).await?;
        lifecycle::check_quotation_generated(&rental)?;
        let rental = self
            .repository
            .rentals
            .set_status(&mut tx, rental_id, RentalStatus::QuotationGenerated)
            .await?;
        tx.commit().await?;

        tracing::info!(rental_id, "Quotation generated");
        Ok(rental)
    }

    /// Activate a rental and synchronize its ledger entries. Idempotent.
    pub async fn activate(&self, rental_id: i32) -> AppResult<ActivationOutcome> {
        let mut tx = self.repository.begin().await?;
        let outcome = self.activate_in(&mut tx, rental_id, today()).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn activate_in(
        &self,
        conn: &mut PgConnection,
        rental_id: i32,
        today: NaiveDate,
    ) -> AppResult<ActivationOutcome> {
        let repo = &self.repository;

        let rental = repo.rentals.lock(&mut *conn, rental_id).await?;
        let items = repo.rentals.items(&mut *conn, rental_id).await?;
        let equipment_ids: Vec<i32> = items.iter().map(|i| i.equipment_id).collect();
        repo.equipment.lock(&mut *conn, &equipment_ids).await?;

        let open_equipment = repo.assignments.open_for_equipment_ids(&mut *conn, &equipment_ids).await?;
        let open_employee = repo.assignments.open_employee_for_rental(&mut *conn, rental_id).await?;

        let plan = lifecycle::plan_activation(&rental, &items, &open_equipment, &open_employee, today)?;

        if rental.status == RentalStatus::Completed {
            tracing::warn!(rental_id, "Reactivating a completed rental");
        }

        repo.rentals.mark_active(&mut *conn, rental_id, plan.start_date).await?;
        repo.rentals.reactivate_items(&mut *conn, &plan.reactivate_items).await?;

        for op in &plan.equipment_ops {
            match op {
                LedgerOp::Create(new) => {
                    repo.assignments.create_equipment_entry(&mut *conn, new).await?;
                }
                LedgerOp::Refresh { entry_id, start_date, end_date } => {
                    repo.assignments
                        .refresh_equipment_entry(&mut *conn, *entry_id, *start_date, *end_date)
                        .await?;
                }
            }
        }
        for op in &plan.employee_ops {
            match op {
                LedgerOp::Create(new) => {
                    repo.assignments.create_employee_entry(&mut *conn, new).await?;
                }
                LedgerOp::Refresh { entry_id, start_date, end_date } => {
                    repo.assignments
                        .refresh_employee_entry(&mut *conn, *entry_id, *start_date, *end_date)
                        .await?;
                }
            }
        }
        repo.assignments
            .close_equipment_entries(&mut *conn, &plan.close_equipment_entries, plan.start_date)
            .await?;
        repo.assignments
            .close_employee_entries(&mut *conn, &plan.close_employee_entries, plan.start_date)
            .await?;

        equipment_status::recompute_in(repo, &mut *conn, &plan.equipment_ids, today).await?;

        let details = self.details(&mut *conn, rental_id).await?;
        let outcome = ActivationOutcome {
            rental: details,
            assignments_synced: true,
            equipment_entries_created: lifecycle::ActivationPlan::created(&plan.equipment_ops),
            equipment_entries_refreshed: lifecycle::ActivationPlan::refreshed(&plan.equipment_ops),
            employee_entries_created: lifecycle::ActivationPlan::created(&plan.employee_ops),
            employee_entries_refreshed: lifecycle::ActivationPlan::refreshed(&plan.employee_ops),
        };

        tracing::info!(
            rental_id,
            transition = plan.transition,
            start_date = %plan.start_date,
            items_reactivated = plan.reactivate_items.len(),
            equipment_created = outcome.equipment_entries_created,
            equipment_refreshed = outcome.equipment_entries_refreshed,
            employee_created = outcome.employee_entries_created,
            duplicates_closed = plan.close_equipment_entries.len() + plan.close_employee_entries.len(),
            "Rental activated"
        );
        Ok(outcome)
    }

    /// Complete an active rental, closing every open item and ledger entry
    pub async fn complete(&self, rental_id: i32, completed_by: Option<i32>) -> AppResult<CompletionOutcome> {
        let today = today();
        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        let rental = repo.rentals.lock(&mut tx, rental_id).await?;
        let items = repo.rentals.items(&mut tx, rental_id).await?;
        let open_equipment = repo.assignments.open_equipment_for_rental(&mut tx, rental_id).await?;
        let open_employee = repo.assignments.open_employee_for_rental(&mut tx, rental_id).await?;

        let plan = lifecycle::plan_completion(&rental, &items, &open_equipment, &open_employee, today)?;
        repo.equipment.lock(&mut tx, &plan.equipment_ids).await?;

        let date = plan.completion_date;
        repo.rentals.mark_completed(&mut tx, rental_id, date, completed_by).await?;
        let items_completed = repo.rentals.complete_items(&mut tx, &plan.items, date).await?;
        let equipment_closed = repo
            .assignments
            .close_equipment_entries(&mut tx, &plan.equipment_entries, date)
            .await?;
        let employee_closed = repo
            .assignments
            .close_employee_entries(&mut tx, &plan.employee_entries, date)
            .await?;

        equipment_status::recompute_in(repo, &mut tx, &plan.equipment_ids, today).await?;

        let details = self.details(&mut tx, rental_id).await?;
        tx.commit().await?;

        tracing::info!(
            rental_id,
            completion_date = %date,
            items_completed,
            equipment_closed,
            employee_closed,
            "Rental completed"
        );

        Ok(CompletionOutcome {
            rental: details,
            completion_date: date,
            items_completed: items_completed as usize,
            equipment_entries_closed: equipment_closed as usize,
            employee_entries_closed: employee_closed as usize,
        })
    }

    /// Return one item early; the rental keeps its status
    pub async fn return_item(
        &self,
        rental_id: i32,
        item_id: i32,
        return_date: Option<NaiveDate>,
    ) -> AppResult<ReturnOutcome> {
        let today = today();
        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        let rental = repo.rentals.lock(&mut tx, rental_id).await?;
        let items = repo.rentals.items(&mut tx, rental_id).await?;
        let open_equipment = repo.assignments.open_equipment_for_rental(&mut tx, rental_id).await?;
        let open_employee = repo.assignments.open_employee_for_rental(&mut tx, rental_id).await?;

        let plan = lifecycle::plan_return(
            &rental,
            &items,
            item_id,
            &open_equipment,
            &open_employee,
            return_date,
            today,
        )?;

        let item = repo.rentals.get_item(&mut tx, item_id).await?;
        repo.equipment.lock(&mut tx, &[item.equipment_id]).await?;

        repo.rentals.complete_items(&mut tx, &[item_id], plan.return_date).await?;
        let equipment_closed = repo
            .assignments
            .close_equipment_entries(&mut tx, &plan.equipment_entries, plan.return_date)
            .await?;
        let employee_closed = repo
            .assignments
            .close_employee_entries(&mut tx, &plan.employee_entries, plan.return_date)
            .await?;

        equipment_status::recompute_in(repo, &mut tx, &[item.equipment_id], today).await?;

        let item = repo.rentals.get_item(&mut tx, item_id).await?;
        tx.commit().await?;

        tracing::info!(
            rental_id,
            item_id,
            equipment_id = item.equipment_id,
            return_date = %plan.return_date,
            "Rental item returned"
        );

        Ok(ReturnOutcome {
            item,
            return_date: plan.return_date,
            equipment_entry_closed: equipment_closed > 0,
            employee_entry_closed: employee_closed > 0,
        })
    }

    /// Repair tool: remove duplicate items and open entries of one rental
    pub async fn cleanup_duplicates(&self, rental_id: i32) -> AppResult<CleanupOutcome> {
        let today = today();
        let repo = &self.repository;
        let mut tx = repo.begin().await?;

        let rental = repo.rentals.lock(&mut tx, rental_id).await?;
        let items = repo.rentals.items(&mut tx, rental_id).await?;
        let open_equipment = repo.assignments.open_equipment_for_rental(&mut tx, rental_id).await?;
        let open_employee = repo.assignments.open_employee_for_rental(&mut tx, rental_id).await?;

        let plan = lifecycle::plan_duplicate_cleanup(rental_id, &items, &open_equipment, &open_employee);

        if plan.is_empty() {
            tx.commit().await?;
            return Ok(CleanupOutcome {
                rental_id,
                items_removed: Vec::new(),
                equipment_entries_removed: Vec::new(),
                employee_entries_removed: Vec::new(),
                totals: RentalTotals {
                    subtotal: rental.subtotal,
                    tax_amount: rental.tax_amount,
                    total_amount: rental.total_amount,
                },
            });
        }

        repo.equipment.lock(&mut tx, &plan.equipment_ids).await?;
        repo.rentals.delete_items(&mut tx, &plan.items).await?;
        repo.assignments.delete_equipment_entries(&mut tx, &plan.equipment_entries).await?;
        repo.assignments.delete_employee_entries(&mut tx, &plan.employee_entries).await?;

        let totals = self.refresh_totals(&mut tx, &rental).await?;
        equipment_status::recompute_in(repo, &mut tx, &plan.equipment_ids, today).await?;
        tx.commit().await?;

        tracing::warn!(
            rental_id,
            items_removed = plan.items.len(),
            equipment_entries_removed = plan.equipment_entries.len(),
            employee_entries_removed = plan.employee_entries.len(),
            "Duplicate rental rows removed"
        );

        Ok(CleanupOutcome {
            rental_id,
            items_removed: plan.items,
            equipment_entries_removed: plan.equipment_entries,
            employee_entries_removed: plan.employee_entries,
            totals,
        })
    }

    async fn refresh_totals(&self, conn: &mut PgConnection, rental: &Rental) -> AppResult<RentalTotals> {
        let items = self.repository.rentals.items(&mut *conn, rental.id).await?;
        let totals = lifecycle::compute_totals(&items, rental.discount, rental.tax_percent);
        self.repository.rentals.set_totals(&mut *conn, rental.id, &totals).await?;
        Ok(totals)
    }

    async fn details(&self, conn: &mut PgConnection, rental_id: i32) -> AppResult<RentalDetails> {
        let rental = self.repository.rentals.get_by_id(&mut *conn, rental_id).await?;
        let items = self.repository.rentals.items(&mut *conn, rental_id).await?;
        Ok(RentalDetails { rental, items })
    }
}
