use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{actor, require_user};
use crate::errors::{AppError, ValidationError};
use crate::models::{
    Listing, ListingFilter, ListingOrder, ListingUpdate, NewListing, PropertyType, Review,
};
use crate::services::{listings, reviews};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ListingResponse {
    #[serde(flatten)]
    listing: Listing,
    average_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_available: Option<bool>,
}

// GET /api/listings
#[derive(Deserialize)]
pub struct ListingsQuery {
    pub city: Option<String>,
    pub country: Option<String>,
    pub property_type: Option<PropertyType>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub ordering: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
}

pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<Vec<ListingResponse>>, AppError> {
    let dates = match (query.check_in, query.check_out) {
        (Some(check_in), Some(check_out)) => {
            if check_in >= check_out {
                return Err(ValidationError::DateRange {
                    check_in,
                    check_out,
                }
                .into());
            }
            Some((check_in, check_out))
        }
        _ => None,
    };
    let order = match query.ordering.as_deref() {
        Some(raw) => Some(
            ListingOrder::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("cannot order by: {raw}")))?,
        ),
        None => None,
    };
    let filter = ListingFilter {
        city: query.city,
        country: query.country,
        property_type: query.property_type,
        bedrooms: query.bedrooms,
        bathrooms: query.bathrooms,
        order,
    };

    let db = state.db()?;
    let found = listings::list_listings(&db, &filter)?;

    let mut response = Vec::with_capacity(found.len());
    for listing in found {
        let average_rating = listings::average_rating(&db, &listing.id)?;
        let is_available = match dates {
            Some((check_in, check_out)) => Some(listings::check_availability(
                &db,
                &listing.id,
                check_in,
                check_out,
            )?),
            None => None,
        };
        response.push(ListingResponse {
            listing,
            average_rating,
            is_available,
        });
    }

    Ok(Json(response))
}

// POST /api/listings
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewListing>,
) -> Result<(StatusCode, Json<ListingResponse>), AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;
    let host_id = require_user(&actor)?;

    let listing = {
        let db = state.db()?;
        listings::create_listing(&db, host_id, body)?
    };

    Ok((
        StatusCode::CREATED,
        Json(ListingResponse {
            listing,
            average_rating: 0.0,
            is_available: None,
        }),
    ))
}

// GET /api/listings/:id
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ListingResponse>, AppError> {
    let db = state.db()?;
    let listing = listings::get_active_listing(&db, &id)?;
    let average_rating = listings::average_rating(&db, &id)?;

    Ok(Json(ListingResponse {
        listing,
        average_rating,
        is_available: None,
    }))
}

// PATCH /api/listings/:id
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ListingUpdate>,
) -> Result<Json<ListingResponse>, AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    let listing = listings::update_listing(&db, &actor, &id, body)?;
    let average_rating = listings::average_rating(&db, &id)?;

    Ok(Json(ListingResponse {
        listing,
        average_rating,
        is_available: None,
    }))
}

// DELETE /api/listings/:id
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let actor = actor(&headers, &state.config.admin_token)?;

    let db = state.db()?;
    listings::deactivate_listing(&db, &actor, &id)?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/listings/:id/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    listing_id: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    available: bool,
}

pub async fn listing_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let available = {
        let db = state.db()?;
        listings::check_availability(&db, &id, query.check_in, query.check_out)?
    };

    Ok(Json(AvailabilityResponse {
        listing_id: id,
        check_in: query.check_in,
        check_out: query.check_out,
        available,
    }))
}

// GET /api/listings/:id/reviews
pub async fn listing_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Review>>, AppError> {
    let db = state.db()?;
    Ok(Json(reviews::list_reviews_for_listing(&db, &id)?))
}
