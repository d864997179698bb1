use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::{AppError, ValidationError};
use crate::models::{Actor, Booking, BookingFilter, BookingStatus, Listing, NewBooking};
use crate::services::availability;
use crate::services::listings;
use crate::services::tasks::{self, BookingEvent, EventSender};

#[derive(Debug, Clone, Deserialize)]
pub struct Reschedule {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub number_of_guests: u32,
}

pub fn compute_total_price(
    price_per_night: Decimal,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Decimal {
    let nights = (check_out - check_in).num_days().max(0);
    price_per_night * Decimal::from(nights)
}

pub fn validate_dates(check_in: NaiveDate, check_out: NaiveDate) -> Result<(), ValidationError> {
    if check_in >= check_out {
        return Err(ValidationError::DateRange {
            check_in,
            check_out,
        });
    }
    Ok(())
}

pub fn validate_guest_count(listing: &Listing, requested: u32) -> Result<(), ValidationError> {
    if requested < 1 || requested > listing.max_guests {
        return Err(ValidationError::Capacity {
            requested,
            max: listing.max_guests,
        });
    }
    Ok(())
}

pub fn create_booking(
    conn: &mut Connection,
    events: &EventSender,
    guest_id: &str,
    request: NewBooking,
) -> Result<Booking, AppError> {
    validate_dates(request.check_in, request.check_out)?;

    // Take the write lock before reading so the overlap check and the insert
    // see the same bookings
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let listing = listings::get_active_listing(&tx, &request.listing_id)?;
    validate_guest_count(&listing, request.number_of_guests)?;

    if !availability::is_available(
        &tx,
        &listing.id,
        request.check_in,
        request.check_out,
        None,
    )? {
        tracing::warn!(
            listing_id = %listing.id,
            check_in = %request.check_in,
            check_out = %request.check_out,
            "booking rejected: dates unavailable"
        );
        return Err(ValidationError::Availability {
            listing_id: listing.id,
            check_in: request.check_in,
            check_out: request.check_out,
        }
        .into());
    }

    let now = queries::now();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        listing_id: listing.id.clone(),
        guest_id: guest_id.to_string(),
        check_in: request.check_in,
        check_out: request.check_out,
        total_price: compute_total_price(
            listing.price_per_night,
            request.check_in,
            request.check_out,
        ),
        status: BookingStatus::Pending,
        number_of_guests: request.number_of_guests,
        special_requests: request.special_requests,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        listing_id = %booking.listing_id,
        guest_id,
        nights = booking.nights(),
        total_price = %booking.total_price,
        "booking created"
    );
    tasks::emit(
        events,
        BookingEvent::Created {
            booking_id: booking.id.clone(),
            guest_id: booking.guest_id.clone(),
            total_price: booking.total_price,
        },
    );

    Ok(booking)
}

pub fn update_status(
    conn: &mut Connection,
    events: &EventSender,
    booking_id: &str,
    new_status: BookingStatus,
) -> Result<Booking, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut booking = find_booking(&tx, booking_id)?;
    let previous = booking.status;

    if !previous.can_transition_to(new_status) {
        tracing::warn!(
            booking_id,
            from = %previous,
            to = %new_status,
            "status change rejected"
        );
        return Err(ValidationError::Transition {
            from: previous,
            to: new_status,
        }
        .into());
    }

    booking.status = new_status;
    booking.updated_at = queries::now();
    queries::update_booking_status(&tx, &booking.id, booking.status, &booking.updated_at)?;
    tx.commit()?;

    tracing::info!(booking_id, from = %previous, to = %new_status, "booking status changed");
    tasks::emit(
        events,
        BookingEvent::StatusChanged {
            booking_id: booking.id.clone(),
            from: previous,
            to: new_status,
        },
    );

    Ok(booking)
}

pub fn reschedule_booking(
    conn: &mut Connection,
    booking_id: &str,
    change: Reschedule,
) -> Result<Booking, AppError> {
    validate_dates(change.check_in, change.check_out)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut booking = find_booking(&tx, booking_id)?;
    if !booking.status.is_active() {
        return Err(ValidationError::Precondition(format!(
            "cannot reschedule a {} booking",
            booking.status
        ))
        .into());
    }

    let listing = listings::get_active_listing(&tx, &booking.listing_id)?;
    validate_guest_count(&listing, change.number_of_guests)?;

    // Its own dates don't count against it
    if !availability::is_available(
        &tx,
        &listing.id,
        change.check_in,
        change.check_out,
        Some(&booking.id),
    )? {
        return Err(ValidationError::Availability {
            listing_id: listing.id,
            check_in: change.check_in,
            check_out: change.check_out,
        }
        .into());
    }

    booking.check_in = change.check_in;
    booking.check_out = change.check_out;
    booking.number_of_guests = change.number_of_guests;
    booking.total_price =
        compute_total_price(listing.price_per_night, change.check_in, change.check_out);
    booking.updated_at = queries::now();
    queries::update_booking_schedule(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id,
        check_in = %booking.check_in,
        check_out = %booking.check_out,
        total_price = %booking.total_price,
        "booking rescheduled"
    );
    Ok(booking)
}

pub fn get_booking(conn: &Connection, actor: &Actor, id: &str) -> Result<Booking, AppError> {
    let booking = find_booking(conn, id)?;
    if !actor.can_manage(&booking.guest_id) {
        return Err(ValidationError::Authorization(
            "only the guest who made this booking can view it".to_string(),
        )
        .into());
    }
    Ok(booking)
}

pub fn list_bookings(
    conn: &Connection,
    actor: &Actor,
    mut filter: BookingFilter,
) -> Result<Vec<Booking>, AppError> {
    // Guests only ever see their own
    if !actor.is_staff {
        filter.guest_id = Some(actor.user_id.clone().ok_or(AppError::Unauthorized)?);
    }
    Ok(queries::list_bookings(conn, &filter)?)
}

fn find_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking(conn, id)?.ok_or_else(|| AppError::NotFound(format!("booking {id}")))
}
