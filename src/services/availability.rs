use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::Booking;

// Half-open ranges: a stay ending on the day another begins does not overlap
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn overlapping_bookings<'a>(
    bookings: &'a [Booking],
    check_in: NaiveDate,
    check_out: NaiveDate,
    exclude_id: Option<&str>,
) -> Vec<&'a Booking> {
    bookings
        .iter()
        .filter(|b| b.status.is_active())
        .filter(|b| Some(b.id.as_str()) != exclude_id)
        .filter(|b| ranges_overlap(b.check_in, b.check_out, check_in, check_out))
        .collect()
}

// Expects check_in < check_out
pub fn is_available(
    conn: &Connection,
    listing_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<bool> {
    let bookings = queries::get_active_bookings_for_listing(conn, listing_id)?;
    let conflicts = overlapping_bookings(&bookings, check_in, check_out, exclude_booking_id);

    if let Some(first) = conflicts.first() {
        tracing::debug!(
            listing_id,
            %check_in,
            %check_out,
            conflicting_booking = %first.id,
            conflicts = conflicts.len(),
            "date range unavailable"
        );
    }

    Ok(conflicts.is_empty())
}
