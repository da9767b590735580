//! Device position lookup.
//!
//! [`PositionSource`] abstracts the host's location facility. The
//! [`GeolocationResolver`] turns one position into a device-originated
//! [`Location`]. A request resolves exactly once and is never retried here.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc, time::Duration};

use crate::config::{GeolocationConfig, GeolocationMode};
use crate::error::GeolocationError;
use crate::model::{Coordinates, Location};

const IP_API_URL: &str = "http://ip-api.com/json";

/// A position reported by the host, optionally with the locality it falls in.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub coordinates: Coordinates,
    pub locality: Option<String>,
}

#[async_trait]
pub trait PositionSource: Send + Sync + Debug {
    async fn current_position(&self) -> Result<Position, GeolocationError>;
}

/// Approximate position from an IP geolocation service.
#[derive(Debug, Clone)]
pub struct IpPositionSource {
    endpoint: String,
    http: Client,
}

impl IpPositionSource {
    pub fn new(timeout: Duration) -> Self {
        Self::with_endpoint(IP_API_URL, timeout)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build geolocation client ({e}); using defaults");
            Client::new()
        });
        Self { endpoint: endpoint.into(), http }
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
}

#[async_trait]
impl PositionSource for IpPositionSource {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        let res = self.http.get(&self.endpoint).send().await.map_err(|e| {
            tracing::warn!("IP geolocation request failed: {e}");
            if e.is_timeout() {
                GeolocationError::Timeout
            } else {
                GeolocationError::PositionUnavailable
            }
        })?;

        if !res.status().is_success() {
            tracing::warn!("IP geolocation returned status {}", res.status());
            return Err(GeolocationError::PositionUnavailable);
        }

        let body: IpApiResponse = res.json().await.map_err(|e| {
            tracing::warn!("IP geolocation response could not be parsed: {e}");
            if e.is_timeout() {
                GeolocationError::Timeout
            } else {
                GeolocationError::PositionUnavailable
            }
        })?;

        if body.status != "success" {
            tracing::warn!(
                "IP geolocation reported failure: {}",
                body.message.as_deref().unwrap_or("no message")
            );
            return Err(GeolocationError::PositionUnavailable);
        }

        let (Some(lat), Some(lon)) = (body.lat, body.lon) else {
            return Err(GeolocationError::PositionUnavailable);
        };
        let coordinates = Coordinates::new(lat, lon).map_err(|e| {
            tracing::warn!("IP geolocation returned {e}");
            GeolocationError::PositionUnavailable
        })?;

        let locality = body.city.filter(|c| !c.trim().is_empty());
        Ok(Position { coordinates, locality })
    }
}

/// Always reports the configured position.
#[derive(Debug, Clone)]
pub struct FixedPositionSource {
    position: Position,
}

impl FixedPositionSource {
    pub fn new(coordinates: Coordinates, locality: Option<String>) -> Self {
        Self { position: Position { coordinates, locality } }
    }
}

#[async_trait]
impl PositionSource for FixedPositionSource {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        Ok(self.position.clone())
    }
}

/// Stands in for a host where the user refused location access.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedPositionSource;

#[async_trait]
impl PositionSource for DeniedPositionSource {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        Err(GeolocationError::PermissionDenied)
    }
}

/// One-shot device location requests.
#[derive(Debug, Clone)]
pub struct GeolocationResolver {
    source: Arc<dyn PositionSource>,
}

impl GeolocationResolver {
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self { source }
    }

    pub async fn request_current_location(&self) -> Result<Location, GeolocationError> {
        let position = self.source.current_position().await?;
        tracing::info!(coordinates = %position.coordinates, "device position resolved");
        Ok(Location::device(position.coordinates, position.locality))
    }
}

/// Build the position source selected by `[geolocation] mode`.
pub fn position_source_from_config(
    config: &GeolocationConfig,
) -> anyhow::Result<Arc<dyn PositionSource>> {
    let source: Arc<dyn PositionSource> = match config.mode {
        GeolocationMode::Ip => Arc::new(IpPositionSource::new(config.timeout())),
        GeolocationMode::Fixed => {
            let (lat, lon) = config.latitude.zip(config.longitude).ok_or_else(|| {
                anyhow::anyhow!(
                    "Geolocation mode 'fixed' needs both latitude and longitude.\n\
                     Hint: set [geolocation] latitude and longitude in the config file."
                )
            })?;
            Arc::new(FixedPositionSource::new(Coordinates::new(lat, lon)?, None))
        }
        GeolocationMode::Disabled => Arc::new(DeniedPositionSource),
    };
    Ok(source)
}
