//! Loading and checking the trip + passenger input written by the booking form.

use crate::core::DatePolicy;
use crate::errors::{BookingError, Result};
use crate::types::{PassengerRecord, TripRequest, MAX_SEATS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub trip: TripRequest,
    #[serde(default)]
    pub passengers: Vec<PassengerRecord>,
}

impl BookingRequest {
    /// Combined `{ "trip": ..., "passengers": [...] }` document
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        parse_json_file(path.as_ref())
    }

    /// A trip object and a passenger array kept in two files
    pub fn from_split_files(trip: impl AsRef<Path>, passengers: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            trip: parse_json_file(trip.as_ref())?,
            passengers: parse_json_file(passengers.as_ref())?,
        })
    }

    pub fn validate(&self, policy: DatePolicy) -> Result<()> {
        let trip = &self.trip;
        if trip.from.trim().is_empty() {
            return Err(invalid("trip.from is empty"));
        }
        if trip.to.trim().is_empty() {
            return Err(invalid("trip.to is empty"));
        }
        if !(1..=MAX_SEATS).contains(&trip.seats) {
            return Err(invalid(&format!(
                "trip.seats must be between 1 and {}, got {}",
                MAX_SEATS, trip.seats
            )));
        }

        match policy {
            DatePolicy::Calendar => {
                if trip.date.trim().is_empty() {
                    return Err(invalid("trip.date is required unless the date is picked manually"));
                }
                NaiveDate::parse_from_str(trip.date.trim(), "%Y-%m-%d").map_err(|_| {
                    invalid(&format!("trip.date must be YYYY-MM-DD, got '{}'", trip.date))
                })?;
            }
            DatePolicy::Manual => {
                if !trip.date.is_empty() {
                    warn!(date = %trip.date, "date will be picked by hand; the given date is ignored");
                }
            }
        }

        if self.passengers.len() < trip.seats as usize {
            warn!(
                passengers = self.passengers.len(),
                seats = trip.seats,
                "fewer passengers than seats; the extra seats will be left without passenger details"
            );
        }
        for (i, passenger) in self.passengers.iter().enumerate() {
            if passenger.first_name.trim().is_empty() || passenger.last_name.trim().is_empty() {
                warn!(passenger = i + 1, "passenger has an empty name");
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> BookingError {
    BookingError::ConfigurationError(message.to_string())
}

fn parse_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| invalid(&format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| invalid(&format!("{}: {}", path.display(), e)))
}
