use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::{actor, require_staff, require_user};
use crate::errors::AppError;
use crate::models::{Booking, BookingFilter, BookingOrder, BookingStatus, NewBooking, Review};
use crate::services::bookings::{self, Reschedule};
use crate::services::reviews::{self, NewReview};
use crate::state::AppState;

fn parse_status(raw: &str) -> Result<BookingStatus, AppError> {
    BookingStatus::parse(raw).ok_or_else(|| AppError::BadRequest(format!("unknown status: {raw}")))
}

fn parse_order(raw: &str) -> Result<BookingOrder, AppError> {
    BookingOrder::parse(raw).ok_or_else(|| AppError::BadRequest(format!("cannot order by: {raw}")))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;
    let guest_id = require_user(&actor)?;

    let booking = {
        let mut db = state.db()?;
        bookings::create_booking(&mut db, &state.events, guest_id, body)?
    };

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub listing_id: Option<String>,
    pub guest_id: Option<String>,
    pub ordering: Option<String>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;
    let filter = BookingFilter {
        guest_id: query.guest_id,
        listing_id: query.listing_id,
        status: query.status.as_deref().map(parse_status).transpose()?,
        order: query.ordering.as_deref().map(parse_order).transpose()?,
    };

    let db = state.db()?;
    Ok(Json(bookings::list_bookings(&db, &actor, filter)?))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    Ok(Json(bookings::get_booking(&db, &actor, &id)?))
}

// PUT /api/bookings/:id
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Reschedule>,
) -> Result<Json<Booking>, AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;
    require_staff(&actor)?;

    let mut db = state.db()?;
    Ok(Json(bookings::reschedule_booking(&mut db, &id, body)?))
}

// PATCH /api/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Booking>, AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;
    require_staff(&actor)?;
    let status = parse_status(&body.status)?;

    let mut db = state.db()?;
    Ok(Json(bookings::update_status(
        &mut db,
        &state.events,
        &id,
        status,
    )?))
}

// POST /api/bookings/:id/review
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;
    let reviewer_id = require_user(&actor)?;

    let review = {
        let mut db = state.db()?;
        reviews::create_review(&mut db, reviewer_id, &id, body)?
    };

    Ok((StatusCode::CREATED, Json(review)))
}
