//! Equipment and employee assignment ledgers

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::{AssignmentStatus, AssignmentType};

/// What a ledger entry is bound to.
///
/// Two open entries with the same context for the same resource are
/// duplicates; open entries with different contexts are a double booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssignmentContext {
    Rental(i32),
    Project(i32),
    Manual(Option<i32>),
}

impl AssignmentContext {
    pub fn assignment_type(&self) -> AssignmentType {
        match self {
            AssignmentContext::Rental(_) => AssignmentType::Rental,
            AssignmentContext::Project(_) => AssignmentType::Project,
            AssignmentContext::Manual(_) => AssignmentType::Manual,
        }
    }

    pub fn rental_id(&self) -> Option<i32> {
        match self {
            AssignmentContext::Rental(id) => Some(*id),
            _ => None,
        }
    }

    pub fn project_id(&self) -> Option<i32> {
        match self {
            AssignmentContext::Project(id) => Some(*id),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentContext::Rental(id) => write!(f, "rental {}", id),
            AssignmentContext::Project(id) => write!(f, "project {}", id),
            AssignmentContext::Manual(Some(employee)) => write!(f, "manual (employee {})", employee),
            AssignmentContext::Manual(None) => write!(f, "manual"),
        }
    }
}

/// Equipment ledger entry (`equipment_rental_history`)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EquipmentAssignment {
    pub id: i32,
    pub equipment_id: i32,
    pub assignment_type: AssignmentType,
    pub rental_id: Option<i32>,
    pub project_id: Option<i32>,
    /// Operator, or the employee holding a manual assignment
    pub employee_id: Option<i32>,
    pub start_date: NaiveDate,
    /// Planned end while active, actual end once completed
    pub end_date: Option<NaiveDate>,
    pub status: AssignmentStatus,
    pub daily_rate: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EquipmentAssignment {
    /// An open entry commits the equipment until it is closed
    pub fn is_open(&self) -> bool {
        self.status == AssignmentStatus::Active
    }

    /// The entry's context, `None` when the discriminator and foreign keys disagree
    pub fn context(&self) -> Option<AssignmentContext> {
        match self.assignment_type {
            AssignmentType::Rental => self.rental_id.map(AssignmentContext::Rental),
            AssignmentType::Project => self.project_id.map(AssignmentContext::Project),
            AssignmentType::Manual => Some(AssignmentContext::Manual(self.employee_id)),
        }
    }
}

/// Employee ledger entry (`employee_assignments`)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EmployeeAssignment {
    pub id: i32,
    pub employee_id: i32,
    pub assignment_type: AssignmentType,
    pub rental_id: Option<i32>,
    pub project_id: Option<i32>,
    /// Equipment entry this one moves with, manual/project assignments only
    pub equipment_assignment_id: Option<i32>,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: AssignmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeAssignment {
    pub fn is_open(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

/// Values for a new equipment ledger entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEquipmentAssignment {
    pub equipment_id: i32,
    pub context: AssignmentContext,
    pub employee_id: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub daily_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Values for a new employee ledger entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmployeeAssignment {
    pub employee_id: i32,
    pub context: AssignmentContext,
    pub equipment_assignment_id: Option<i32>,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Manual or project assignment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAssignment {
    /// `project` or `manual`; rental assignments come from rental activation
    pub assignment_type: AssignmentType,
    pub project_id: Option<i32>,
    /// Required for manual assignments
    pub employee_id: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub daily_rate: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Close one ledger entry
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteAssignment {
    /// Defaults to today
    pub end_date: Option<NaiveDate>,
}

/// Result of a manual/project assignment
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssignmentOutcome {
    pub assignment: EquipmentAssignment,
    pub employee_assignment: Option<EmployeeAssignment>,
    /// Earlier manual/project entries closed by the handover
    pub handed_over: Vec<i32>,
}
