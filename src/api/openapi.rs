//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{assignments, equipment, health, rentals};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rentyard API",
        version = "1.0.0",
        description = "Equipment rental and assignment tracking REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Rentals
        rentals::list_rentals,
        rentals::get_rental,
        rentals::create_rental,
        rentals::update_rental,
        rentals::add_item,
        rentals::generate_quotation,
        rentals::activate_rental,
        rentals::complete_rental,
        rentals::return_item,
        rentals::cleanup_duplicates,
        // Assignments
        assignments::equipment_assignments,
        assignments::assign_equipment,
        assignments::complete_assignment,
        assignments::employee_assignments,
        // Equipment
        equipment::open_maintenance,
        equipment::complete_maintenance,
        equipment::fix_equipment_status,
        equipment::equipment_status_summary,
        equipment::equipment_status_issues,
        equipment::equipment_status,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::RentalStatus,
            crate::models::enums::RentalItemStatus,
            crate::models::enums::AssignmentStatus,
            crate::models::enums::AssignmentType,
            crate::models::enums::EquipmentStatus,
            crate::models::enums::MaintenanceStatus,
            // Rentals
            crate::models::rental::Rental,
            crate::models::rental::RentalItem,
            crate::models::rental::RentalDetails,
            crate::models::rental::RentalTotals,
            crate::models::rental::RentalQuery,
            crate::models::rental::CreateRental,
            crate::models::rental::CreateRentalItem,
            crate::models::rental::UpdateRental,
            crate::models::rental::ReturnItemRequest,
            crate::models::rental::ActivationOutcome,
            crate::models::rental::CompletionOutcome,
            crate::models::rental::ReturnOutcome,
            crate::models::rental::CleanupOutcome,
            // Assignments
            crate::models::assignment::EquipmentAssignment,
            crate::models::assignment::EmployeeAssignment,
            crate::models::assignment::CreateAssignment,
            crate::models::assignment::CompleteAssignment,
            crate::models::assignment::AssignmentOutcome,
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::MaintenanceRecord,
            crate::models::equipment::CreateMaintenance,
            crate::models::equipment::CompleteMaintenance,
            crate::models::equipment::MaintenanceOutcome,
            // Monitor
            crate::models::monitor::IssueReason,
            crate::models::monitor::StatusIssue,
            crate::models::monitor::FixReport,
            crate::models::monitor::StatusCount,
            crate::models::monitor::StatusSummary,
            crate::models::monitor::EquipmentStatusView,
            // Auth
            crate::models::user::Role,
            // Health
            health::HealthResponse,
            health::ReadinessResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rentals", description = "Rental lifecycle"),
        (name = "assignments", description = "Equipment and employee assignment ledgers"),
        (name = "equipment", description = "Maintenance and equipment status monitor")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
