use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    error::DataSourceError,
    model::{Coordinates, FORECAST_DAYS, ForecastDay, WeatherCondition, WeatherReport, WeatherSnapshot},
};

use super::WeatherSource;

const ONE_CALL_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Current conditions and daily forecast from the OpenWeather One Call API.
#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    api_key: String,
    endpoint: String,
    http: Client,
}

impl OpenWeatherSource {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, ONE_CALL_URL)
    }

    pub fn with_endpoint(api_key: String, endpoint: impl Into<String>) -> Self {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build OpenWeather client ({e}); using defaults");
            Client::new()
        });
        Self { api_key, endpoint: endpoint.into(), http }
    }

    async fn fetch_one_call(&self, coordinates: Coordinates) -> Result<WeatherReport> {
        let lat = coordinates.latitude().to_string();
        let lon = coordinates.longitude().to_string();

        let res = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("exclude", "minutely,hourly,alerts"),
                ("units", "metric"),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Failed to send request to OpenWeather (one call)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeather one call response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather one call request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: OwOneCallResponse =
            serde_json::from_str(&body).context("Failed to parse OpenWeather one call JSON")?;

        into_report(parsed, coordinates)
    }
}

fn into_report(parsed: OwOneCallResponse, coordinates: Coordinates) -> Result<WeatherReport> {
    if parsed.daily.len() < FORECAST_DAYS {
        return Err(anyhow!(
            "OpenWeather returned {} daily entries, expected at least {FORECAST_DAYS}",
            parsed.daily.len()
        ));
    }

    let current = parsed.current;
    let (condition, description) = primary_condition(&current.weather);
    let observed_at = unix_to_utc(current.dt).unwrap_or_else(Utc::now);

    let snapshot = WeatherSnapshot {
        // One Call carries no place name; callers thread the location's own name.
        place_name: coordinates.to_string(),
        temperature_c: current.temp,
        feels_like_c: current.feels_like,
        humidity_pct: current.humidity,
        pressure_hpa: current.pressure,
        wind_speed_mps: current.wind_speed,
        visibility_m: current.visibility.unwrap_or(10_000),
        condition,
        description,
        sunrise: current.sunrise.and_then(unix_to_utc).unwrap_or(observed_at),
        sunset: current.sunset.and_then(unix_to_utc).unwrap_or(observed_at),
        observed_at,
    };

    let offset = parsed.timezone_offset;
    let forecast = parsed
        .daily
        .into_iter()
        .take(FORECAST_DAYS)
        .map(|day| {
            let (condition, description) = primary_condition(&day.weather);
            let date = unix_to_utc(day.dt + offset)
                .ok_or_else(|| anyhow!("OpenWeather daily entry has invalid timestamp {}", day.dt))?
                .date_naive();
            Ok(ForecastDay {
                date,
                high_c: day.temp.max,
                low_c: day.temp.min,
                condition,
                description,
                humidity_pct: day.humidity,
                wind_speed_mps: day.wind_speed,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(WeatherReport { snapshot, forecast })
}

fn primary_condition(weather: &[OwWeather]) -> (WeatherCondition, String) {
    weather
        .first()
        .map(|w| (WeatherCondition::from_group(&w.main), w.description.clone()))
        .unwrap_or_else(|| (WeatherCondition::default(), "unknown".to_string()))
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrent {
    dt: i64,
    sunrise: Option<i64>,
    sunset: Option<i64>,
    temp: f64,
    feels_like: f64,
    pressure: u32,
    humidity: u8,
    visibility: Option<u32>,
    wind_speed: f64,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwDailyTemp {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OwDaily {
    dt: i64,
    temp: OwDailyTemp,
    humidity: u8,
    wind_speed: f64,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwOneCallResponse {
    #[serde(default)]
    timezone_offset: i64,
    current: OwCurrent,
    daily: Vec<OwDaily>,
}

#[async_trait]
impl WeatherSource for OpenWeatherSource {
    async fn fetch(&self, coordinates: Coordinates) -> Result<WeatherReport, DataSourceError> {
        self.fetch_one_call(coordinates).await.map_err(|e| {
            tracing::warn!(%coordinates, "OpenWeather fetch failed: {e:#}");
            let timed_out = e.chain().any(|cause| {
                cause.downcast_ref::<reqwest::Error>().is_some_and(reqwest::Error::is_timeout)
            });
            if timed_out { DataSourceError::Timeout } else { DataSourceError::Unavailable }
        })
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
