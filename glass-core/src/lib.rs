//! Core library for Weather Glass.
//!
//! This crate defines:
//! - The orchestrator that decides which location is active and which fetch counts
//! - Debounced location search over a geocoding boundary
//! - Device geolocation and weather data sources
//! - Configuration & credentials handling
//!
//! It is used by `glass-cli`, but any UI shell can drive the orchestrator and
//! render its published [`WeatherView`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod search;

pub use catalog::{Geocoder, StaticCatalog};
pub use config::{Config, GeolocationMode, ProviderConfig};
pub use error::{DataSourceError, GeolocationError, ValidationError};
pub use geolocation::{GeolocationResolver, PositionSource};
pub use model::{
    Coordinates, FetchStatus, ForecastDay, Generation, Location, LocationOrigin, SearchCandidate,
    WeatherCondition, WeatherReport, WeatherSnapshot,
};
pub use orchestrator::{
    OrchestratorEvent, OrchestratorSettings, SuggestionList, WeatherOrchestrator, WeatherView,
};
pub use provider::{ProviderId, WeatherSource};
pub use search::{LocationSearchEngine, SearchOutcome, SearchSettings};
