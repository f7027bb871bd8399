use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::errors::LookupError;
use crate::helpers::epoch_to_utc;

/// Normalized current weather for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub location_name: String,
    /// Wind speed as reported by the provider (m/s for metric payloads)
    pub wind_speed: f64,
    /// Wind direction in degrees (0 = north, 90 = east)
    pub wind_direction_deg: f64,
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: i64,
    /// Sunrise, epoch seconds
    pub sunrise: i64,
    /// Sunset, epoch seconds
    pub sunset: i64,
}

impl WeatherRecord {
    pub fn sunrise_at(&self) -> Option<DateTime<Utc>> {
        epoch_to_utc(self.sunrise)
    }

    pub fn sunset_at(&self) -> Option<DateTime<Utc>> {
        epoch_to_utc(self.sunset)
    }
}

impl fmt::Display for WeatherRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: temperature {}, humidity {}%, wind {} at {}°, sunrise {}, sunset {}",
            self.location_name,
            self.temperature,
            self.humidity,
            self.wind_speed,
            self.wind_direction_deg,
            self.sunrise,
            self.sunset
        )
    }
}

/// The successful legs of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(Arc<WeatherRecord>),
    /// The provider answered, but had nothing for this location.
    NotFound,
}

impl LookupOutcome {
    pub fn record(&self) -> Option<&WeatherRecord> {
        match self {
            LookupOutcome::Found(record) => Some(record),
            LookupOutcome::NotFound => None,
        }
    }
}

/// Data, empty, or error: the shape every lookup resolves to.
pub type LookupResult = Result<LookupOutcome, LookupError>;

/// Render the one user-facing message a lookup result maps to.
pub fn user_message(result: &LookupResult, location: &str) -> String {
    match result {
        Ok(LookupOutcome::Found(record)) => record.to_string(),
        Ok(LookupOutcome::NotFound) => format!("no weather info for {} found", location),
        Err(e) => e.user_message().to_string(),
    }
}
