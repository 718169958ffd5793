//! The `trips` table.

use crate::{TripStatus, TripType};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A ride offered by a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub driver_id: String,
    pub vehicle_id: Option<String>,
    pub trip_type: TripType,
    pub status: TripStatus,
    pub from_location: String,
    pub from_lat: f64,
    pub from_lng: f64,
    pub to_location: String,
    pub to_lat: f64,
    pub to_lng: f64,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub estimated_arrival_time: Option<NaiveTime>,
    pub actual_departure_time: Option<DateTime<Utc>>,
    pub actual_arrival_time: Option<DateTime<Utc>>,
    pub available_seats: i32,
    pub seats_booked: i32,
    pub price_per_seat: f64,
    pub notes: Option<String>,
    pub luggage_allowed: bool,
    pub instant_booking: bool,
    pub recurring_trip_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl Trip {
    /// Seats still open, never negative.
    pub fn remaining_seats(&self) -> i32 {
        (self.available_seats - self.seats_booked).max(0)
    }

    /// Published with at least `seats` open.
    pub fn can_book(&self, seats: i32) -> bool {
        seats > 0 && self.status.accepts_bookings() && self.remaining_seats() >= seats
    }
}
