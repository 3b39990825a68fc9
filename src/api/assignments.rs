//! Assignment ledger endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::assignment::{
        AssignmentOutcome, CompleteAssignment, CreateAssignment, EmployeeAssignment,
        EquipmentAssignment,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Ledger history of one equipment
#[utoipa::path(
    get,
    path = "/equipment/{id}/assignments",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Assignments, newest first", body = Vec<EquipmentAssignment>),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn equipment_assignments(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<EquipmentAssignment>>> {
    claims.require_viewer()?;
    let history = state.services.assignments.equipment_history(id).await?;
    Ok(Json(history))
}

/// Assign equipment to a project or an employee
#[utoipa::path(
    post,
    path = "/equipment/{id}/assignments",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = CreateAssignment,
    responses(
        (status = 201, description = "Equipment assigned", body = AssignmentOutcome),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment is on an active rental")
    )
)]
pub async fn assign_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<CreateAssignment>,
) -> AppResult<(StatusCode, Json<AssignmentOutcome>)> {
    claims.require_operator()?;
    let outcome = state.services.assignments.assign_equipment(id, data).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Close one equipment assignment
#[utoipa::path(
    post,
    path = "/assignments/{id}/complete",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    request_body(content = CompleteAssignment, description = "Optional end date"),
    responses(
        (status = 200, description = "Assignment closed", body = EquipmentAssignment),
        (status = 400, description = "Already completed or invalid date"),
        (status = 404, description = "Assignment not found")
    )
)]
pub async fn complete_assignment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<CompleteAssignment>>,
) -> AppResult<Json<EquipmentAssignment>> {
    claims.require_operator()?;
    let data = body.map(|Json(b)| b).unwrap_or_default();
    let assignment = state.services.assignments.complete_assignment(id, data).await?;
    Ok(Json(assignment))
}

/// Ledger history of one employee
#[utoipa::path(
    get,
    path = "/employees/{id}/assignments",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Assignments, newest first", body = Vec<EmployeeAssignment>)
    )
)]
pub async fn employee_assignments(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<EmployeeAssignment>>> {
    claims.require_viewer()?;
    let history = state.services.assignments.employee_history(id).await?;
    Ok(Json(history))
}
