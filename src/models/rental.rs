//! Rental contract and rental item models

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::{RentalItemStatus, RentalStatus};

/// Rental start date
///
/// Older data marks an unscheduled start with the literal `2099-12-31`; it is
/// read as `Unscheduled` and never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RentalStart {
    Scheduled(NaiveDate),
    Unscheduled,
}

impl RentalStart {
    fn is_legacy_placeholder(date: &NaiveDate) -> bool {
        date.year() == 2099 && date.month() == 12 && date.day() == 31
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            RentalStart::Scheduled(date) => Some(*date),
            RentalStart::Unscheduled => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, RentalStart::Scheduled(_))
    }

    /// The scheduled date, or `today` when unscheduled
    pub fn or_today(&self, today: NaiveDate) -> NaiveDate {
        self.as_date().unwrap_or(today)
    }
}

impl From<Option<NaiveDate>> for RentalStart {
    fn from(value: Option<NaiveDate>) -> Self {
        match value {
            Some(date) if !Self::is_legacy_placeholder(&date) => RentalStart::Scheduled(date),
            _ => RentalStart::Unscheduled,
        }
    }
}

/// Rental contract from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Rental {
    pub id: i32,
    pub rental_number: String,
    pub customer_name: Option<String>,
    pub status: RentalStatus,
    /// Start date, null while unscheduled
    #[sqlx(try_from = "Option<NaiveDate>")]
    #[schema(value_type = Option<String>, format = Date)]
    pub start_date: RentalStart,
    pub expected_end_date: Option<NaiveDate>,
    /// Set iff status is completed
    pub actual_end_date: Option<NaiveDate>,
    /// Set iff status is completed
    pub completed_at: Option<NaiveDate>,
    pub completed_by: Option<i32>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax_percent: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rental line item from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RentalItem {
    pub id: i32,
    pub rental_id: i32,
    pub equipment_id: i32,
    pub equipment_name: Option<String>,
    /// Employee operating the equipment
    pub operator_id: Option<i32>,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub rate_type: String,
    pub status: RentalItemStatus,
    pub completed_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RentalItem {
    pub fn is_active(&self) -> bool {
        self.status == RentalItemStatus::Active
    }
}

/// Rental with its line items
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RentalDetails {
    #[serde(flatten)]
    pub rental: Rental,
    pub items: Vec<RentalItem>,
}

/// Recomputed rental amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RentalTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Rental list filter
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RentalQuery {
    pub status: Option<RentalStatus>,
}

/// Create rental request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRental {
    /// Generated when omitted
    #[validate(length(min = 1, max = 64, message = "Rental number must be 1-64 characters"))]
    pub rental_number: Option<String>,
    pub customer_name: Option<String>,
    /// Omit to leave the start unscheduled
    pub start_date: Option<NaiveDate>,
    pub expected_end_date: Option<NaiveDate>,
    pub discount: Option<Decimal>,
    pub tax_percent: Option<Decimal>,
    pub notes: Option<String>,
    /// Create directly in the active state
    #[serde(default)]
    pub activate: bool,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<CreateRentalItem>,
}

/// New rental line item
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRentalItem {
    pub equipment_id: i32,
    #[validate(length(max = 255))]
    pub equipment_name: Option<String>,
    pub operator_id: Option<i32>,
    pub unit_price: Decimal,
    /// Defaults to `unit_price`
    pub total_price: Option<Decimal>,
    #[validate(length(min = 1, max = 32))]
    pub rate_type: Option<String>,
    pub notes: Option<String>,
}

/// Partial rental update; omitted fields keep their value
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRental {
    #[validate(length(max = 255))]
    pub customer_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub expected_end_date: Option<NaiveDate>,
    pub discount: Option<Decimal>,
    pub tax_percent: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Return a single item early
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReturnItemRequest {
    /// Defaults to today
    pub return_date: Option<NaiveDate>,
}

/// Result of an activation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivationOutcome {
    pub rental: RentalDetails,
    /// Every active item has exactly one open ledger entry
    pub assignments_synced: bool,
    pub equipment_entries_created: usize,
    pub equipment_entries_refreshed: usize,
    pub employee_entries_created: usize,
    pub employee_entries_refreshed: usize,
}

/// Result of a completion
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompletionOutcome {
    pub rental: RentalDetails,
    pub completion_date: NaiveDate,
    pub items_completed: usize,
    pub equipment_entries_closed: usize,
    pub employee_entries_closed: usize,
}

/// Result of an early item return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub item: RentalItem,
    pub return_date: NaiveDate,
    pub equipment_entry_closed: bool,
    pub employee_entry_closed: bool,
}

/// Result of a duplicate cleanup
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CleanupOutcome {
    pub rental_id: i32,
    pub items_removed: Vec<i32>,
    pub equipment_entries_removed: Vec<i32>,
    pub employee_entries_removed: Vec<i32>,
    pub totals: RentalTotals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_placeholder_reads_as_unscheduled() {
        let placeholder = NaiveDate::from_ymd_opt(2099, 12, 31);
        assert_eq!(RentalStart::from(placeholder), RentalStart::Unscheduled);
        assert_eq!(RentalStart::from(None), RentalStart::Unscheduled);
    }

    #[test]
    fn test_scheduled_start_is_kept() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let start = RentalStart::from(Some(date));
        assert!(start.is_scheduled());
        assert_eq!(start.or_today(today), date);
        assert_eq!(RentalStart::Unscheduled.or_today(today), today);
    }

    #[test]
    fn test_start_serializes_as_nullable_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            serde_json::to_value(RentalStart::Scheduled(date)).unwrap(),
            serde_json::json!("2025-03-01")
        );
        assert_eq!(
            serde_json::to_value(RentalStart::Unscheduled).unwrap(),
            serde_json::Value::Null
        );
    }
}
