pub mod actor;
pub mod booking;
pub mod listing;
pub mod ordering;
pub mod review;

pub use actor::Actor;
pub use booking::{Booking, BookingFilter, BookingStatus, NewBooking};
pub use listing::{Listing, ListingFilter, ListingUpdate, NewListing, PropertyType};
pub use ordering::{BookingOrder, BookingSort, ListingOrder, ListingSort, SortOrder};
pub use review::Review;
