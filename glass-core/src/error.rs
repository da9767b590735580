//! Error taxonomy shared by the input sources and the orchestrator.
//!
//! Every error is terminal for the operation that raised it. The `Display`
//! text is what the orchestrator shows in its single error slot.

/// Failure of a device-position request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Current position is unavailable")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
}

/// Failure of a weather data fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataSourceError {
    #[error("Failed to fetch weather data")]
    Unavailable,
    #[error("Weather data request timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid coordinates ({latitude}, {longitude}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}
