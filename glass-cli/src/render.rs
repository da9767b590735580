//! Plain-text rendering of the orchestrator's view.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use glass_core::{FetchStatus, ForecastDay, SearchCandidate, WeatherSnapshot, WeatherView};

pub fn candidate_line(candidate: &SearchCandidate) -> String {
    format!("{}, {} ({})", candidate.display_name, candidate.country, candidate.coordinates)
}

/// Render whatever the view currently holds. Weather data is only drawn in
/// the `Success` state.
pub fn view(view: &WeatherView) -> String {
    match (&view.status, &view.snapshot) {
        (FetchStatus::Success, Some(snapshot)) => report(snapshot, &view.forecast),
        (FetchStatus::Loading, _) => "Loading weather data...".to_string(),
        (FetchStatus::Error, _) => {
            format!("Error: {}", view.error_message.as_deref().unwrap_or("unknown"))
        }
        _ => "No location selected.".to_string(),
    }
}

pub fn report(snapshot: &WeatherSnapshot, forecast: &[ForecastDay]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", snapshot.place_name);
    let _ = writeln!(
        out,
        "  {:.0}°C, {} (feels like {:.0}°C)",
        snapshot.temperature_c, snapshot.description, snapshot.feels_like_c
    );
    let _ = writeln!(
        out,
        "  Humidity {}%  Pressure {} hPa  Wind {:.1} m/s  Visibility {:.1} km",
        snapshot.humidity_pct,
        snapshot.pressure_hpa,
        snapshot.wind_speed_mps,
        f64::from(snapshot.visibility_m) / 1000.0
    );
    let _ = writeln!(
        out,
        "  Sunrise {}  Sunset {}",
        clock(snapshot.sunrise),
        clock(snapshot.sunset)
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "7-day forecast");
    for (index, day) in forecast.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:<6} {:>4.0}° / {:>4.0}°  {:<12}  {}%  {:.1} m/s",
            day.label(index),
            day.high_c,
            day.low_c,
            day.condition.as_str(),
            day.humidity_pct,
            day.wind_speed_mps
        );
    }

    out.trim_end().to_string()
}

fn clock(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}
