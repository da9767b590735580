use crate::{
    Config,
    error::DataSourceError,
    model::{Coordinates, WeatherReport},
    provider::{openweather::OpenWeatherSource, synthetic::SyntheticSource},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;
pub mod synthetic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Synthetic,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Synthetic => "synthetic",
            ProviderId::OpenWeather => "openweather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Synthetic, ProviderId::OpenWeather]
    }

    pub fn needs_api_key(&self) -> bool {
        matches!(self, ProviderId::OpenWeather)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "synthetic" => Ok(ProviderId::Synthetic),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: synthetic, openweather."
            )),
        }
    }
}

/// The weather data boundary: current conditions plus a seven-day forecast
/// for a position. Implementations must not touch orchestrator state.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch(&self, coordinates: Coordinates) -> Result<WeatherReport, DataSourceError>;
}

/// Construct a source from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let source: Arc<dyn WeatherSource> = match id {
        ProviderId::Synthetic => Arc::new(SyntheticSource::new(config.fetch.synthetic_latency())),
        ProviderId::OpenWeather => {
            let api_key = config.provider_api_key(id).ok_or_else(|| {
                anyhow::anyhow!(
                    "No API key configured for provider '{id}'.\n\
                         Hint: run `glass configure {id}` and enter your API key."
                )
            })?;
            Arc::new(OpenWeatherSource::new(api_key.to_owned()))
        }
    };

    Ok(source)
}

/// Construct the default source from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}
