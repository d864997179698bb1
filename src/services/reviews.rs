use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::{AppError, ValidationError};
use crate::models::{BookingStatus, Review};
use crate::services::listings;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

pub fn create_review(
    conn: &mut Connection,
    reviewer_id: &str,
    booking_id: &str,
    review: NewReview,
) -> Result<Review, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.guest_id != reviewer_id {
        return Err(ValidationError::Authorization(
            "only the guest who made the booking can leave a review".to_string(),
        )
        .into());
    }
    if booking.status != BookingStatus::Completed {
        return Err(ValidationError::Precondition(format!(
            "can only review completed bookings, this one is {}",
            booking.status
        ))
        .into());
    }
    if queries::review_exists_for_booking(&tx, &booking.id)? {
        return Err(
            ValidationError::Duplicate("you have already reviewed this booking".to_string())
                .into(),
        );
    }
    // One per listing, however many stays
    if queries::review_exists_for_listing(&tx, &booking.listing_id, reviewer_id)? {
        return Err(
            ValidationError::Duplicate("you have already reviewed this listing".to_string())
                .into(),
        );
    }
    let rating = u8::try_from(review.rating)
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(&i64::from(*r)))
        .ok_or_else(|| ValidationError::range("rating", "between 1 and 5", review.rating))?;

    let now = queries::now();
    let created = Review {
        id: uuid::Uuid::new_v4().to_string(),
        listing_id: booking.listing_id.clone(),
        booking_id: booking.id.clone(),
        reviewer_id: reviewer_id.to_string(),
        rating,
        comment: review.comment,
        created_at: now,
        updated_at: now,
    };
    queries::insert_review(&tx, &created)?;
    tx.commit()?;

    tracing::info!(
        review_id = %created.id,
        booking_id,
        listing_id = %created.listing_id,
        rating,
        "review created"
    );
    Ok(created)
}

pub fn list_reviews_for_listing(conn: &Connection, listing_id: &str) -> Result<Vec<Review>, AppError> {
    let listing = listings::get_active_listing(conn, listing_id)?;
    Ok(queries::list_reviews_for_listing(conn, &listing.id)?)
}
