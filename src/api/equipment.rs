//! Equipment maintenance and status monitor endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        equipment::{CompleteMaintenance, CreateMaintenance, MaintenanceOutcome},
        monitor::{EquipmentStatusView, FixReport, StatusIssue, StatusSummary},
    },
    services::today,
    AppState,
};

use super::AuthenticatedUser;

/// Open a maintenance record for an equipment
#[utoipa::path(
    post,
    path = "/equipment/{id}/maintenance",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = CreateMaintenance,
    responses(
        (status = 201, description = "Maintenance opened", body = MaintenanceOutcome),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn open_maintenance(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<CreateMaintenance>,
) -> AppResult<(StatusCode, Json<MaintenanceOutcome>)> {
    claims.require_operator()?;
    let outcome = state.services.maintenance.open(id, data).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Complete or cancel a maintenance record
#[utoipa::path(
    post,
    path = "/maintenance/{id}/complete",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Maintenance record ID")),
    request_body(content = CompleteMaintenance, description = "Optional completion date"),
    responses(
        (status = 200, description = "Maintenance closed", body = MaintenanceOutcome),
        (status = 400, description = "Record already closed"),
        (status = 404, description = "Maintenance record not found")
    )
)]
pub async fn complete_maintenance(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<CompleteMaintenance>>,
) -> AppResult<Json<MaintenanceOutcome>> {
    claims.require_operator()?;
    let data = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state.services.maintenance.complete(id, data).await?;
    Ok(Json(outcome))
}

/// Run a reconciliation sweep and correct drifted statuses
#[utoipa::path(
    post,
    path = "/equipment/status/fix",
    tag = "equipment",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep report", body = FixReport),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "A sweep is already running")
    )
)]
pub async fn fix_equipment_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<FixReport>> {
    claims.require_admin()?;
    let report = state
        .services
        .monitor
        .check_and_fix_equipment_status(today())
        .await?;
    Ok(Json(report))
}

/// Count equipment per stored status
#[utoipa::path(
    get,
    path = "/equipment/status/summary",
    tag = "equipment",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Status counts", body = StatusSummary)
    )
)]
pub async fn equipment_status_summary(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<StatusSummary>> {
    claims.require_viewer()?;
    let summary = state.services.monitor.get_equipment_status_summary().await?;
    Ok(Json(summary))
}

/// List equipment whose stored status disagrees with its sources
#[utoipa::path(
    get,
    path = "/equipment/status/issues",
    tag = "equipment",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Detected issues, nothing is corrected", body = Vec<StatusIssue>)
    )
)]
pub async fn equipment_status_issues(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<StatusIssue>>> {
    claims.require_viewer()?;
    let issues = state.services.monitor.get_equipment_with_issues(today()).await?;
    Ok(Json(issues))
}

/// Stored and derived status of one equipment
#[utoipa::path(
    get,
    path = "/equipment/{id}/status",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Status breakdown", body = EquipmentStatusView),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn equipment_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentStatusView>> {
    claims.require_viewer()?;
    let view = state.services.monitor.inspect(id, today()).await?;
    Ok(Json(view))
}
