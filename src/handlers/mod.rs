pub mod bookings;
pub mod health;
pub mod listings;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, patch, post};
use axum::Router;

use crate::errors::{AppError, ValidationError};
use crate::models::Actor;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/listings",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route(
            "/api/listings/:id",
            get(listings::get_listing)
                .patch(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route(
            "/api/listings/:id/availability",
            get(listings::listing_availability),
        )
        .route("/api/listings/:id/reviews", get(listings::listing_reviews))
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/api/bookings/:id",
            get(bookings::get_booking).put(bookings::reschedule_booking),
        )
        .route("/api/bookings/:id/status", patch(bookings::update_status))
        .route("/api/bookings/:id/review", post(bookings::create_review))
        .with_state(state)
}

// X-User-Id is trusted as given. A bearer token must match the admin token.
pub fn actor(headers: &HeaderMap, admin_token: &str) -> Result<Actor, AppError> {
    let is_staff = match headers.get("authorization") {
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .unwrap_or("");
            if token != admin_token {
                return Err(AppError::Unauthorized);
            }
            true
        }
        None => false,
    };

    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    Ok(Actor { user_id, is_staff })
}

pub fn require_user(actor: &Actor) -> Result<&str, AppError> {
    actor.user_id.as_deref().ok_or(AppError::Unauthorized)
}

// Anonymous callers get 401, known non-staff users 403
pub fn require_staff(actor: &Actor) -> Result<(), AppError> {
    match (actor.is_staff, &actor.user_id) {
        (true, _) => Ok(()),
        (false, Some(_)) => Err(ValidationError::Authorization(
            "only staff can do this".to_string(),
        )
        .into()),
        (false, None) => Err(AppError::Unauthorized),
    }
}
