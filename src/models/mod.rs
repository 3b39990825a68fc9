//! Data models for Rentyard

pub mod assignment;
pub mod enums;
pub mod equipment;
pub mod monitor;
pub mod rental;
pub mod user;

// Re-export commonly used types
pub use assignment::{AssignmentContext, EmployeeAssignment, EquipmentAssignment};
pub use enums::{
    AssignmentStatus, AssignmentType, EquipmentStatus, MaintenanceStatus, RentalItemStatus,
    RentalStatus,
};
pub use equipment::{Equipment, MaintenanceRecord};
pub use rental::{Rental, RentalDetails, RentalItem, RentalStart};
pub use user::{Role, UserClaims};
