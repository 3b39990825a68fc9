//! API handlers for Rentyard REST endpoints

pub mod assignments;
pub mod equipment;
pub mod health;
pub mod openapi;
pub mod rentals;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        // Validate JWT token using the secret from configuration
        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// `/api/v1` routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Rentals
        .route("/rentals", get(rentals::list_rentals).post(rentals::create_rental))
        .route("/rentals/:id", get(rentals::get_rental).patch(rentals::update_rental))
        .route("/rentals/:id/items", post(rentals::add_item))
        .route("/rentals/:id/quotation", post(rentals::generate_quotation))
        .route("/rentals/:id/activate", post(rentals::activate_rental))
        .route("/rentals/:id/complete", post(rentals::complete_rental))
        .route("/rentals/:id/items/:item_id/return", post(rentals::return_item))
        .route("/rentals/:id/cleanup-duplicates", post(rentals::cleanup_duplicates))
        // Assignment ledgers
        .route(
            "/equipment/:id/assignments",
            get(assignments::equipment_assignments).post(assignments::assign_equipment),
        )
        .route("/assignments/:id/complete", post(assignments::complete_assignment))
        .route("/employees/:id/assignments", get(assignments::employee_assignments))
        // Maintenance
        .route("/equipment/:id/maintenance", post(equipment::open_maintenance))
        .route("/maintenance/:id/complete", post(equipment::complete_maintenance))
        // Status monitor
        .route("/equipment/status/fix", post(equipment::fix_equipment_status))
        .route("/equipment/status/summary", get(equipment::equipment_status_summary))
        .route("/equipment/status/issues", get(equipment::equipment_status_issues))
        .route("/equipment/:id/status", get(equipment::equipment_status))
        .with_state(state)
}
