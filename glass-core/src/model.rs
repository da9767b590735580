use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of daily entries every successful fetch carries.
pub const FORECAST_DAYS: usize = 7;

/// A validated WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);

        if !lat_ok || !lon_ok {
            return Err(ValidationError::InvalidCoordinates { latitude, longitude });
        }

        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// `"lat,lon"` rounded to four decimals, the precision catalog entries use.
    pub fn rounded_key(&self) -> String {
        format!("{:.4},{:.4}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Where a [`Location`] came from. Display only; it never affects precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationOrigin {
    Device,
    Search,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub coordinates: Coordinates,
    pub display_name: Option<String>,
    pub origin: LocationOrigin,
}

impl Location {
    pub fn device(coordinates: Coordinates, display_name: Option<String>) -> Self {
        Self { coordinates, display_name, origin: LocationOrigin::Device }
    }

    pub fn from_candidate(candidate: &SearchCandidate) -> Self {
        Self {
            coordinates: candidate.coordinates,
            display_name: Some(candidate.display_name.clone()),
            origin: LocationOrigin::Search,
        }
    }

    /// Human label: the display name if known, otherwise the coordinates.
    pub fn label(&self) -> String {
        self.display_name.clone().unwrap_or_else(|| self.coordinates.to_string())
    }
}

/// A named place offered as a search suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCandidate {
    pub display_name: String,
    pub country: String,
    pub coordinates: Coordinates,
}

/// Primary condition group, modelled on the OpenWeather `main` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    Clouds,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
    /// Mist, fog, haze, dust and the other low-visibility groups.
    Atmosphere,
}

impl WeatherCondition {
    /// Conditions the synthetic generator draws from.
    pub const SYNTHETIC: [WeatherCondition; 5] = [
        WeatherCondition::Clear,
        WeatherCondition::Clouds,
        WeatherCondition::Rain,
        WeatherCondition::Snow,
        WeatherCondition::Thunderstorm,
    ];

    /// Map an OpenWeather `main` group name. Unknown groups fall back to `Atmosphere`.
    pub fn from_group(group: &str) -> Self {
        match group.to_ascii_lowercase().as_str() {
            "clear" => Self::Clear,
            "clouds" => Self::Clouds,
            "drizzle" => Self::Drizzle,
            "rain" => Self::Rain,
            "snow" => Self::Snow,
            "thunderstorm" => Self::Thunderstorm,
            _ => Self::Atmosphere,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
            Self::Atmosphere => "Atmosphere",
        }
    }
}

impl std::fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current conditions at the resolved place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub place_name: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: u32,
    pub wind_speed_mps: f64,
    pub visibility_m: u32,
    pub condition: WeatherCondition,
    pub description: String,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub high_c: f64,
    pub low_c: f64,
    pub condition: WeatherCondition,
    pub description: String,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
}

impl ForecastDay {
    /// Label for the entry at `index` of a forecast: "Today" first, then weekday names.
    pub fn label(&self, index: usize) -> String {
        if index == 0 {
            "Today".to_string()
        } else {
            self.date.format("%a").to_string()
        }
    }
}

/// Everything one successful fetch produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub snapshot: WeatherSnapshot,
    pub forecast: Vec<ForecastDay>,
}

/// Phase of the data-fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Monotonic tag identifying one accepted location and its fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
