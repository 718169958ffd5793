//! Typed contracts for the Supabase schema used by the Wasel client.
//!
//! These types mirror the `profiles`, `trips` and `bookings` tables and the
//! `search_nearby_trips` / `get_user_stats` database functions. The schema
//! itself is owned by the backend; nothing here enforces row-level rules.

mod booking;
mod enums;
mod profile;
mod rpc;
mod trip;

pub use booking::Booking;
pub use enums::{BookingStatus, ParseEnumError, PaymentMethod, PaymentStatus, TripStatus, TripType};
pub use profile::{NewProfile, Profile, ProfileUpdate};
pub use rpc::{NearbyTrip, NearbyTripQuery, UserStats};
pub use trip::Trip;

use thiserror::Error;

/// Client-side validation failure for a request payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}
