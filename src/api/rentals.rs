//! Rental lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::rental::{
        ActivationOutcome, CleanupOutcome, CompletionOutcome, CreateRental, CreateRentalItem,
        Rental, RentalDetails, RentalQuery, ReturnItemRequest, ReturnOutcome, UpdateRental,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List rentals
#[utoipa::path(
    get,
    path = "/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<String>, Query, description = "Filter by status (quotation, quotation_generated, active, completed)")
    ),
    responses(
        (status = 200, description = "Rentals, newest first", body = Vec<Rental>)
    )
)]
pub async fn list_rentals(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<RentalQuery>,
) -> AppResult<Json<Vec<Rental>>> {
    claims.require_viewer()?;
    let rentals = state.services.rentals.list(query.status).await?;
    Ok(Json(rentals))
}

/// Get a rental with its items
#[utoipa::path(
    get,
    path = "/rentals/{id}",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental details", body = RentalDetails),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn get_rental(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RentalDetails>> {
    claims.require_viewer()?;
    let rental = state.services.rentals.get(id).await?;
    Ok(Json(rental))
}

/// Create a rental with its items
#[utoipa::path(
    post,
    path = "/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = CreateRental,
    responses(
        (status = 201, description = "Rental created", body = RentalDetails),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Duplicate equipment or equipment already assigned")
    )
)]
pub async fn create_rental(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateRental>,
) -> AppResult<(StatusCode, Json<RentalDetails>)> {
    claims.require_operator()?;
    data.validate()?;
    let rental = state.services.rentals.create(data).await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// Edit rental dates, amounts or notes
#[utoipa::path(
    patch,
    path = "/rentals/{id}",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    request_body = UpdateRental,
    responses(
        (status = 200, description = "Rental updated, open assignments follow the new dates", body = RentalDetails),
        (status = 400, description = "Invalid dates or rental is completed"),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn update_rental(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateRental>,
) -> AppResult<Json<RentalDetails>> {
    claims.require_operator()?;
    data.validate()?;
    let rental = state.services.rentals.update(id, data).await?;
    Ok(Json(rental))
}

/// Add a line item to a rental
#[utoipa::path(
    post,
    path = "/rentals/{id}/items",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    request_body = CreateRentalItem,
    responses(
        (status = 201, description = "Item added", body = RentalDetails),
        (status = 400, description = "Rental is completed"),
        (status = 404, description = "Rental or equipment not found"),
        (status = 409, description = "Equipment already on this rental")
    )
)]
pub async fn add_item(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(item): Json<CreateRentalItem>,
) -> AppResult<(StatusCode, Json<RentalDetails>)> {
    claims.require_operator()?;
    item.validate()?;
    let rental = state.services.rentals.add_item(id, item).await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// Mark the quotation document as generated
#[utoipa::path(
    post,
    path = "/rentals/{id}/quotation",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental in quotation_generated state", body = Rental),
        (status = 400, description = "Rental is not in quotation state"),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn generate_quotation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Rental>> {
    claims.require_operator()?;
    let rental = state.services.rentals.mark_quotation_generated(id).await?;
    Ok(Json(rental))
}

/// Activate a rental and synchronize its assignments
#[utoipa::path(
    post,
    path = "/rentals/{id}/activate",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental active, assignments synchronized", body = ActivationOutcome),
        (status = 404, description = "Rental not found"),
        (status = 409, description = "Equipment already assigned elsewhere")
    )
)]
pub async fn activate_rental(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ActivationOutcome>> {
    claims.require_operator()?;
    let outcome = state.services.rentals.activate(id).await?;
    Ok(Json(outcome))
}

/// Complete an active rental
#[utoipa::path(
    post,
    path = "/rentals/{id}/complete",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental completed", body = CompletionOutcome),
        (status = 400, description = "Rental is not active"),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn complete_rental(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CompletionOutcome>> {
    claims.require_operator()?;
    let outcome = state.services.rentals.complete(id, Some(claims.user_id)).await?;
    Ok(Json(outcome))
}

/// Return one item before the rental ends
#[utoipa::path(
    post,
    path = "/rentals/{id}/items/{item_id}/return",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Rental ID"),
        ("item_id" = i32, Path, description = "Rental item ID")
    ),
    request_body(content = ReturnItemRequest, description = "Optional return date"),
    responses(
        (status = 200, description = "Item returned", body = ReturnOutcome),
        (status = 400, description = "Item already completed or invalid date"),
        (status = 404, description = "Rental or item not found")
    )
)]
pub async fn return_item(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((id, item_id)): Path<(i32, i32)>,
    body: Option<Json<ReturnItemRequest>>,
) -> AppResult<Json<ReturnOutcome>> {
    claims.require_operator()?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state
        .services
        .rentals
        .return_item(id, item_id, request.return_date)
        .await?;
    Ok(Json(outcome))
}

/// Remove duplicate items and assignments of a rental
#[utoipa::path(
    post,
    path = "/rentals/{id}/cleanup-duplicates",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Duplicates removed", body = CleanupOutcome),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn cleanup_duplicates(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CleanupOutcome>> {
    claims.require_admin()?;
    let outcome = state.services.rentals.cleanup_duplicates(id).await?;
    Ok(Json(outcome))
}
