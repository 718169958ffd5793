//! Arguments and result rows of the database functions.

use crate::SchemaError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Arguments to `search_nearby_trips`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyTripQuery {
    pub from_lat: f64,
    pub from_lng: f64,
    pub to_lat: f64,
    pub to_lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_date: Option<NaiveDate>,
}

impl NearbyTripQuery {
    pub fn new(from: (f64, f64), to: (f64, f64)) -> Self {
        Self {
            from_lat: from.0,
            from_lng: from.1,
            to_lat: to.0,
            to_lng: to.1,
            max_distance_km: None,
            departure_date: None,
        }
    }

    pub fn within_km(mut self, km: f64) -> Self {
        self.max_distance_km = Some(km);
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.departure_date = Some(date);
        self
    }

    /// Coordinates are in range and the radius is positive.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (field, value) in [("from_lat", self.from_lat), ("to_lat", self.to_lat)] {
            if !(-90.0..=90.0).contains(&value) {
                return Err(SchemaError::OutOfRange { field, value });
            }
        }
        for (field, value) in [("from_lng", self.from_lng), ("to_lng", self.to_lng)] {
            if !(-180.0..=180.0).contains(&value) {
                return Err(SchemaError::OutOfRange { field, value });
            }
        }
        if let Some(km) = self.max_distance_km {
            if km.is_nan() || km <= 0.0 {
                return Err(SchemaError::OutOfRange {
                    field: "max_distance_km",
                    value: km,
                });
            }
        }
        Ok(())
    }
}

/// A row returned by `search_nearby_trips`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyTrip {
    pub trip_id: String,
    pub driver_name: String,
    pub distance_from_km: f64,
    pub distance_to_km: f64,
}

/// The row returned by `get_user_stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_trips_count: i64,
    pub as_driver: i64,
    pub as_passenger: i64,
    pub total_distance_km: f64,
    pub carbon_saved_kg: f64,
}
