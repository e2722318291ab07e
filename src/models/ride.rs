use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};

pub const MIN_SEATS: i64 = 1;
pub const MAX_SEATS: i64 = 5;

/// Format of `departure_date` as stored and accepted on the wire.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Format of `departure_time` as stored and accepted on the wire.
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RideStatus {
    /// Open for joins.
    Active,
    /// Departure time has passed.
    Archived,
    /// Withdrawn by the creator after someone had already joined.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Place {
    fn validate(&self, field: &str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(format!("{} name cannot be empty", field)));
        }
        match (self.latitude, self.longitude) {
            (None, None) => Ok(()),
            (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {
                Ok(())
            }
            (Some(_), Some(_)) => Err(AppError::BadRequest(format!(
                "{} coordinates are out of range",
                field
            ))),
            _ => Err(AppError::BadRequest(format!(
                "{} needs both latitude and longitude",
                field
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: String,
    pub creator_id: String,
    pub origin: Place,
    pub destination: Place,
    /// `YYYY-MM-DD`
    pub departure_date: String,
    /// `HH:MM`, 24-hour clock
    pub departure_time: String,
    /// Fixed at creation.
    pub total_seats: i64,
    pub status: RideStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

fn parse_departure(date: &str, time: &str) -> Result<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| AppError::BadRequest(msg::INVALID_DEPARTURE_DATE.into()))?;
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT)
        .map_err(|_| AppError::BadRequest(msg::INVALID_DEPARTURE_TIME.into()))?;
    Ok(date.and_time(time))
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRide {
    pub origin: Place,
    pub destination: Place,
    pub departure_date: String,
    pub departure_time: String,
    pub total_seats: i64,
}

impl CreateRide {
    /// The requested departure, parsed leniently (`9:05` is accepted).
    pub fn departs_at(&self) -> Result<NaiveDateTime> {
        parse_departure(&self.departure_date, &self.departure_time)
    }

    /// Validate the request against the current (UTC) clock.
    pub fn validate(&self, now: NaiveDateTime) -> Result<()> {
        self.origin.validate("origin")?;
        self.destination.validate("destination")?;

        if !(MIN_SEATS..=MAX_SEATS).contains(&self.total_seats) {
            return Err(AppError::BadRequest(format!(
                "total_seats must be between {} and {}",
                MIN_SEATS, MAX_SEATS
            )));
        }

        if self.departs_at()? <= now {
            return Err(AppError::BadRequest(msg::DEPARTURE_IN_PAST.into()));
        }

        Ok(())
    }
}

/// A ride together with its current seat occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct RideView {
    #[serde(flatten)]
    pub ride: Ride,
    pub seats_taken: i64,
    pub seats_available: i64,
}

impl RideView {
    pub fn new(ride: Ride, seats_taken: i64) -> Self {
        let seats_available = (ride.total_seats - seats_taken).max(0);
        Self {
            ride,
            seats_taken,
            seats_available,
        }
    }
}
