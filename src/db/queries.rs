use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::models::{
    Booking, BookingFilter, BookingStatus, Listing, ListingFilter, PropertyType, Review,
};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

// ── Listings ──

const LISTING_COLUMNS: &str = "id, host_id, title, description, property_type, price_per_night, \
     bedrooms, bathrooms, max_guests, address, city, country, latitude, longitude, amenities, \
     is_active, created_at, updated_at";

pub fn insert_listing(conn: &Connection, listing: &Listing) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO listings ({LISTING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
        ),
        params![
            listing.id,
            listing.host_id,
            listing.title,
            listing.description,
            listing.property_type.as_str(),
            listing.price_per_night.to_string(),
            listing.bedrooms,
            listing.bathrooms,
            listing.max_guests,
            listing.address,
            listing.city,
            listing.country,
            listing.latitude.map(|d| d.to_string()),
            listing.longitude.map(|d| d.to_string()),
            serde_json::to_string(&listing.amenities)?,
            listing.is_active,
            listing.created_at.format(DATETIME_FORMAT).to_string(),
            listing.updated_at.format(DATETIME_FORMAT).to_string(),
        ],
    )
    .context("failed to insert listing")?;
    Ok(())
}

pub fn get_listing(conn: &Connection, id: &str) -> anyhow::Result<Option<Listing>> {
    let result = conn.query_row(
        &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_listing_row(row)),
    );

    match result {
        Ok(listing) => Ok(Some(listing?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_listing(conn: &Connection, listing: &Listing) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE listings SET
           title = ?2, description = ?3, property_type = ?4, price_per_night = ?5,
           bedrooms = ?6, bathrooms = ?7, max_guests = ?8, address = ?9, city = ?10,
           country = ?11, latitude = ?12, longitude = ?13, amenities = ?14, is_active = ?15,
           updated_at = ?16
         WHERE id = ?1",
        params![
            listing.id,
            listing.title,
            listing.description,
            listing.property_type.as_str(),
            listing.price_per_night.to_string(),
            listing.bedrooms,
            listing.bathrooms,
            listing.max_guests,
            listing.address,
            listing.city,
            listing.country,
            listing.latitude.map(|d| d.to_string()),
            listing.longitude.map(|d| d.to_string()),
            serde_json::to_string(&listing.amenities)?,
            listing.is_active,
            listing.updated_at.format(DATETIME_FORMAT).to_string(),
        ],
    )?;
    Ok(count > 0)
}

pub fn list_listings(conn: &Connection, filter: &ListingFilter) -> anyhow::Result<Vec<Listing>> {
    let mut sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE is_active = 1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(city) = &filter.city {
        params_vec.push(Box::new(city.clone()));
        sql.push_str(&format!(" AND city = ?{} COLLATE NOCASE", params_vec.len()));
    }
    if let Some(country) = &filter.country {
        params_vec.push(Box::new(country.clone()));
        sql.push_str(&format!(" AND country = ?{} COLLATE NOCASE", params_vec.len()));
    }
    if let Some(property_type) = &filter.property_type {
        params_vec.push(Box::new(property_type.as_str()));
        sql.push_str(&format!(" AND property_type = ?{}", params_vec.len()));
    }
    if let Some(bedrooms) = filter.bedrooms {
        params_vec.push(Box::new(bedrooms));
        sql.push_str(&format!(" AND bedrooms = ?{}", params_vec.len()));
    }
    if let Some(bathrooms) = filter.bathrooms {
        params_vec.push(Box::new(bathrooms));
        sql.push_str(&format!(" AND bathrooms = ?{}", params_vec.len()));
    }
    sql.push_str(&order_by(filter.order.map(|o| o.to_sql())));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_listing_row(row)))?;

    let mut listings = vec![];
    for row in rows {
        listings.push(row??);
    }
    Ok(listings)
}

pub fn average_rating(conn: &Connection, listing_id: &str) -> anyhow::Result<f64> {
    let avg: Option<f64> = conn.query_row(
        "SELECT AVG(rating) FROM reviews WHERE listing_id = ?1",
        params![listing_id],
        |row| row.get(0),
    )?;
    Ok(avg.unwrap_or(0.0))
}

fn parse_listing_row(row: &rusqlite::Row) -> anyhow::Result<Listing> {
    let property_type: String = row.get(4)?;
    let price: String = row.get(5)?;
    let latitude: Option<String> = row.get(12)?;
    let longitude: Option<String> = row.get(13)?;
    let amenities: String = row.get(14)?;
    let created_at: String = row.get(16)?;
    let updated_at: String = row.get(17)?;

    Ok(Listing {
        id: row.get(0)?,
        host_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        property_type: PropertyType::parse(&property_type),
        price_per_night: parse_decimal(&price)?,
        bedrooms: row.get(6)?,
        bathrooms: row.get(7)?,
        max_guests: row.get(8)?,
        address: row.get(9)?,
        city: row.get(10)?,
        country: row.get(11)?,
        latitude: latitude.as_deref().map(parse_decimal).transpose()?,
        longitude: longitude.as_deref().map(parse_decimal).transpose()?,
        amenities: serde_json::from_str(&amenities)
            .with_context(|| format!("invalid amenities in database: {amenities}"))?,
        is_active: row.get(15)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, listing_id, guest_id, check_in, check_out, total_price, \
     status, number_of_guests, special_requests, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            booking.id,
            booking.listing_id,
            booking.guest_id,
            booking.check_in.format(DATE_FORMAT).to_string(),
            booking.check_out.format(DATE_FORMAT).to_string(),
            booking.total_price.to_string(),
            booking.status.as_str(),
            booking.number_of_guests,
            booking.special_requests,
            booking.created_at.format(DATETIME_FORMAT).to_string(),
            booking.updated_at.format(DATETIME_FORMAT).to_string(),
        ],
    )
    .context("failed to insert booking")?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_active_bookings_for_listing(
    conn: &Connection,
    listing_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE listing_id = ?1 AND status IN (?2, ?3)
         ORDER BY check_in ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            listing_id,
            BookingStatus::Pending.as_str(),
            BookingStatus::Confirmed.as_str()
        ],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1 = 1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(guest_id) = &filter.guest_id {
        params_vec.push(Box::new(guest_id.clone()));
        sql.push_str(&format!(" AND guest_id = ?{}", params_vec.len()));
    }
    if let Some(listing_id) = &filter.listing_id {
        params_vec.push(Box::new(listing_id.clone()));
        sql.push_str(&format!(" AND listing_id = ?{}", params_vec.len()));
    }
    if let Some(status) = &filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    sql.push_str(&order_by(filter.order.map(|o| o.to_sql())));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    updated_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            status.as_str(),
            updated_at.format(DATETIME_FORMAT).to_string(),
            id
        ],
    )?;
    Ok(count > 0)
}

pub fn update_booking_schedule(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET check_in = ?1, check_out = ?2, number_of_guests = ?3,
           total_price = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            booking.check_in.format(DATE_FORMAT).to_string(),
            booking.check_out.format(DATE_FORMAT).to_string(),
            booking.number_of_guests,
            booking.total_price.to_string(),
            booking.updated_at.format(DATETIME_FORMAT).to_string(),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let check_in: String = row.get(3)?;
    let check_out: String = row.get(4)?;
    let total_price: String = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Booking {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        guest_id: row.get(2)?,
        check_in: parse_date(&check_in)?,
        check_out: parse_date(&check_out)?,
        total_price: parse_decimal(&total_price)?,
        status: BookingStatus::parse(&status)
            .with_context(|| format!("unknown booking status in database: {status}"))?,
        number_of_guests: row.get(7)?,
        special_requests: row.get(8)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

// ── Reviews ──

const REVIEW_COLUMNS: &str =
    "id, listing_id, booking_id, reviewer_id, rating, comment, created_at, updated_at";

pub fn insert_review(conn: &Connection, review: &Review) -> anyhow::Result<()> {
    conn.execute(
        &format!("INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            review.id,
            review.listing_id,
            review.booking_id,
            review.reviewer_id,
            review.rating,
            review.comment,
            review.created_at.format(DATETIME_FORMAT).to_string(),
            review.updated_at.format(DATETIME_FORMAT).to_string(),
        ],
    )
    .context("failed to insert review")?;
    Ok(())
}

pub fn review_exists_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE booking_id = ?1",
        params![booking_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn review_exists_for_listing(
    conn: &Connection,
    listing_id: &str,
    reviewer_id: &str,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reviews WHERE listing_id = ?1 AND reviewer_id = ?2",
        params![listing_id, reviewer_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_reviews_for_listing(conn: &Connection, listing_id: &str) -> anyhow::Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE listing_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;

    let rows = stmt.query_map(params![listing_id], |row| Ok(parse_review_row(row)))?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row??);
    }
    Ok(reviews)
}

fn parse_review_row(row: &rusqlite::Row) -> anyhow::Result<Review> {
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(Review {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        booking_id: row.get(2)?,
        reviewer_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

// ── Helpers ──

// Newest first unless the caller asked otherwise; rowid breaks ties.
fn order_by(requested: Option<String>) -> String {
    match requested {
        Some(order) => format!(" ORDER BY {order}, created_at DESC, rowid DESC"),
        None => " ORDER BY created_at DESC, rowid DESC".to_string(),
    }
}

fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("invalid date in database: {s}"))
}

fn parse_decimal(s: &str) -> anyhow::Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("invalid decimal in database: {s}"))
}
