//! Offline stand-in for a weather API.
//!
//! Responds after a fixed latency with values drawn from a generator seeded
//! by the coordinates and the current date, so the same place reads the same
//! within a day.

use async_trait::async_trait;
use chrono::{Datelike, Days, Duration as ChronoDuration, Local, NaiveDate, Utc};
use std::time::Duration;

use crate::{
    catalog::StaticCatalog,
    error::DataSourceError,
    model::{Coordinates, FORECAST_DAYS, ForecastDay, WeatherCondition, WeatherReport, WeatherSnapshot},
};

use super::WeatherSource;

/// Place name used when the coordinates are not in the catalog.
pub const UNKNOWN_PLACE: &str = "Unknown City";

#[derive(Debug, Clone)]
pub struct SyntheticSource {
    latency: Duration,
    catalog: StaticCatalog,
    fail: bool,
}

impl SyntheticSource {
    pub fn new(latency: Duration) -> Self {
        Self { latency, catalog: StaticCatalog::default(), fail: false }
    }

    /// A source that waits out its latency and then reports `Unavailable`.
    pub fn failing(latency: Duration) -> Self {
        Self { fail: true, ..Self::new(latency) }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub(crate) fn generate(&self, coordinates: Coordinates, today: NaiveDate) -> WeatherReport {
        let mut rng = SplitMix::seeded(coordinates, today);
        let now = Utc::now();

        let place_name = self.catalog.name_at(&coordinates).unwrap_or(UNKNOWN_PLACE).to_string();
        let condition = rng.pick(&WeatherCondition::SYNTHETIC);
        let temperature = rng.range(5, 35) as f64;

        let snapshot = WeatherSnapshot {
            place_name,
            temperature_c: temperature,
            feels_like_c: temperature + rng.range(0, 6) as f64 - 3.0,
            humidity_pct: rng.range(40, 80) as u8,
            pressure_hpa: rng.range(1000, 1100) as u32,
            wind_speed_mps: rng.range(2, 17) as f64,
            visibility_m: rng.range(5000, 10_000) as u32,
            condition,
            description: condition.as_str().to_lowercase(),
            sunrise: now - ChronoDuration::hours(2),
            sunset: now + ChronoDuration::hours(6),
            observed_at: now,
        };

        let forecast = (0..FORECAST_DAYS as u64)
            .map(|offset| {
                let condition = rng.pick(&WeatherCondition::SYNTHETIC);
                let high = rng.range(15, 35) as f64;
                let low = high - rng.range(0, 10) as f64 - 5.0;
                ForecastDay {
                    date: today.checked_add_days(Days::new(offset)).unwrap_or(today),
                    high_c: high,
                    low_c: low,
                    condition,
                    description: condition.as_str().to_lowercase(),
                    humidity_pct: rng.range(40, 80) as u8,
                    wind_speed_mps: rng.range(2, 17) as f64,
                }
            })
            .collect();

        WeatherReport { snapshot, forecast }
    }
}

#[async_trait]
impl WeatherSource for SyntheticSource {
    async fn fetch(&self, coordinates: Coordinates) -> Result<WeatherReport, DataSourceError> {
        tokio::time::sleep(self.latency).await;

        if self.fail {
            tracing::warn!(%coordinates, "synthetic source configured to fail");
            return Err(DataSourceError::Unavailable);
        }

        // "Today" is the user's calendar day, not UTC's.
        Ok(self.generate(coordinates, Local::now().date_naive()))
    }
}

/// splitmix64; small, fast and good enough for fake readings.
struct SplitMix(u64);

impl SplitMix {
    fn seeded(coordinates: Coordinates, day: NaiveDate) -> Self {
        let seed = coordinates.latitude().to_bits()
            ^ coordinates.longitude().to_bits().rotate_left(32)
            ^ (day.num_days_from_ce() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        SplitMix(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform integer in `[lo, hi)`.
    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        let span = (hi - lo).max(1) as u64;
        lo + (self.next_u64() % span) as i64
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}
