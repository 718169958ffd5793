//! Enumerated column types.
//!
//! Wire values are the snake_case Postgres enum labels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unknown label for an enumerated column.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! pg_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pg_enum! {
    /// Direction of a trip: outbound ("wasel") or return ("raje3").
    TripType, "trip_type" {
        Wasel => "wasel",
        Raje3 => "raje3",
    }
}

pg_enum! {
    /// `trip_status` enum.
    TripStatus, "trip_status" {
        Draft => "draft",
        Published => "published",
        Active => "active",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

pg_enum! {
    /// `booking_status` enum.
    BookingStatus, "booking_status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Cancelled => "cancelled",
        Completed => "completed",
    }
}

pg_enum! {
    /// `payment_status` enum.
    PaymentStatus, "payment_status" {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Refunded => "refunded",
    }
}

pg_enum! {
    /// Payment method recorded on a booking.
    PaymentMethod, "payment_method" {
        Cash => "cash",
        Card => "card",
        Wallet => "wallet",
        BankTransfer => "bank_transfer",
    }
}

impl TripStatus {
    /// Riders can request seats.
    pub fn accepts_bookings(&self) -> bool {
        matches!(self, TripStatus::Published)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

impl BookingStatus {
    /// The booking holds seats on the trip.
    pub fn holds_seats(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Accepted)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Completed
        )
    }
}

impl PaymentStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded)
    }
}
