use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::queries;
use crate::errors::{AppError, ValidationError};
use crate::models::{Actor, Listing, ListingFilter, ListingUpdate, NewListing};
use crate::services::availability;

pub fn create_listing(
    conn: &Connection,
    host_id: &str,
    new: NewListing,
) -> Result<Listing, AppError> {
    validate_fields(&new.title, new.price_per_night, new.max_guests)?;

    let now = queries::now();
    let listing = Listing {
        id: uuid::Uuid::new_v4().to_string(),
        host_id: host_id.to_string(),
        title: new.title.trim().to_string(),
        description: new.description,
        property_type: new.property_type,
        price_per_night: new.price_per_night,
        bedrooms: new.bedrooms,
        bathrooms: new.bathrooms,
        max_guests: new.max_guests,
        address: new.address,
        city: new.city,
        country: new.country,
        latitude: new.latitude,
        longitude: new.longitude,
        amenities: new.amenities,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    queries::insert_listing(conn, &listing)?;

    tracing::info!(listing_id = %listing.id, host_id, "listing created");
    Ok(listing)
}

pub fn get_active_listing(conn: &Connection, id: &str) -> Result<Listing, AppError> {
    match queries::get_listing(conn, id)? {
        Some(listing) if listing.is_active => Ok(listing),
        _ => Err(AppError::NotFound(format!("listing {id}"))),
    }
}

pub fn list_listings(conn: &Connection, filter: &ListingFilter) -> Result<Vec<Listing>, AppError> {
    Ok(queries::list_listings(conn, filter)?)
}

pub fn update_listing(
    conn: &Connection,
    actor: &Actor,
    id: &str,
    update: ListingUpdate,
) -> Result<Listing, AppError> {
    let mut listing = get_active_listing(conn, id)?;
    ensure_can_manage(actor, &listing)?;

    if let Some(title) = update.title {
        listing.title = title.trim().to_string();
    }
    if let Some(description) = update.description {
        listing.description = description;
    }
    if let Some(property_type) = update.property_type {
        listing.property_type = property_type;
    }
    if let Some(price) = update.price_per_night {
        listing.price_per_night = price;
    }
    if let Some(bedrooms) = update.bedrooms {
        listing.bedrooms = bedrooms;
    }
    if let Some(bathrooms) = update.bathrooms {
        listing.bathrooms = bathrooms;
    }
    if let Some(max_guests) = update.max_guests {
        listing.max_guests = max_guests;
    }
    if let Some(address) = update.address {
        listing.address = address;
    }
    if let Some(city) = update.city {
        listing.city = city;
    }
    if let Some(country) = update.country {
        listing.country = country;
    }
    if let Some(latitude) = update.latitude {
        listing.latitude = Some(latitude);
    }
    if let Some(longitude) = update.longitude {
        listing.longitude = Some(longitude);
    }
    if let Some(amenities) = update.amenities {
        listing.amenities = amenities;
    }
    validate_fields(&listing.title, listing.price_per_night, listing.max_guests)?;

    listing.updated_at = queries::now();
    queries::update_listing(conn, &listing)?;

    tracing::info!(listing_id = %listing.id, "listing updated");
    Ok(listing)
}

pub fn deactivate_listing(conn: &Connection, actor: &Actor, id: &str) -> Result<(), AppError> {
    let mut listing = get_active_listing(conn, id)?;
    ensure_can_manage(actor, &listing)?;

    // Soft delete, bookings and reviews keep pointing at it
    listing.is_active = false;
    listing.updated_at = queries::now();
    queries::update_listing(conn, &listing)?;

    tracing::info!(listing_id = %listing.id, "listing deactivated");
    Ok(())
}

pub fn average_rating(conn: &Connection, id: &str) -> Result<f64, AppError> {
    Ok(queries::average_rating(conn, id)?)
}

pub fn check_availability(
    conn: &Connection,
    id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<bool, AppError> {
    let listing = get_active_listing(conn, id)?;
    if check_in >= check_out {
        return Err(ValidationError::DateRange {
            check_in,
            check_out,
        }
        .into());
    }
    Ok(availability::is_available(
        conn,
        &listing.id,
        check_in,
        check_out,
        None,
    )?)
}

fn ensure_can_manage(actor: &Actor, listing: &Listing) -> Result<(), ValidationError> {
    if actor.can_manage(&listing.host_id) {
        Ok(())
    } else {
        Err(ValidationError::Authorization(
            "only the host can modify this listing".to_string(),
        ))
    }
}

fn validate_fields(title: &str, price: Decimal, max_guests: u32) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::range("title", "non-empty", "\"\""));
    }
    if price < Decimal::ZERO {
        return Err(ValidationError::range("price_per_night", "at least 0", price));
    }
    if max_guests < 1 {
        return Err(ValidationError::range("max_guests", "at least 1", max_guests));
    }
    Ok(())
}
