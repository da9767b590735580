//! The weather orchestrator: one owned state machine arbitrating between the
//! device position, search selections and the weather data fetch.
//!
//! ```text
//!   GeolocationResolver ──┐
//!                         ├─► accept(Location) ─► generation += 1 ─► Loading ─► spawn fetch
//!   search selection ─────┘                                                        │
//!                                                                                  ▼
//!                          resolve(generation, result) ◄──── completion channel ◄──┘
//!                             │ generation stale → dropped
//!                             └ current → Success | Error
//! ```
//!
//! Spawned work never touches the state. Fetch, geolocation and search
//! results come back as messages and are applied by [`WeatherOrchestrator::next_event`]
//! on the caller's task, one at a time. The latest [`WeatherView`] is
//! published on a `watch` channel after every transition.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::{
    catalog::{Geocoder, StaticCatalog},
    config::Config,
    error::{DataSourceError, GeolocationError},
    geolocation::{GeolocationResolver, position_source_from_config},
    model::{
        FORECAST_DAYS, FetchStatus, ForecastDay, Generation, Location, SearchCandidate,
        WeatherReport, WeatherSnapshot,
    },
    provider::{WeatherSource, default_provider_from_config},
    search::{LocationSearchEngine, SearchOutcome, SearchSettings, SearchUpdate},
};

/// Suggestion list state as the presentation layer should draw it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionList {
    /// Latest text typed into the search box.
    pub query: String,
    pub open: bool,
    /// A lookup is scheduled or running.
    pub loading: bool,
    /// Empty while open means "no locations found".
    pub candidates: Vec<SearchCandidate>,
}

/// Read-only projection of the orchestrator state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherView {
    pub status: FetchStatus,
    pub active_location: Option<Location>,
    /// Data of the last successful fetch. While `Loading` this still belongs
    /// to the previous location, so only read it together with `status`.
    pub snapshot: Option<WeatherSnapshot>,
    pub forecast: Vec<ForecastDay>,
    pub error_message: Option<String>,
    pub generation: Generation,
    /// A device position request is outstanding.
    pub locating: bool,
    pub suggestions: SuggestionList,
}

/// What [`WeatherOrchestrator::next_event`] just applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorEvent {
    /// A fetch finished. `applied` is false when its generation was stale.
    FetchCompleted { generation: Generation, applied: bool },
    /// The device position request finished; on success a fetch was started.
    GeolocationCompleted { succeeded: bool },
    /// The suggestion list changed. Outcomes from superseded queries are not reported.
    SuggestionsChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub search: SearchSettings,
    /// `None` lets a fetch run for as long as the source takes.
    pub fetch_timeout: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self { search: SearchSettings::default(), fetch_timeout: Some(Duration::from_secs(10)) }
    }
}

#[derive(Debug)]
enum Completion {
    Fetch { generation: Generation, result: Result<WeatherReport, DataSourceError> },
    Geolocation(Result<Location, GeolocationError>),
}

#[derive(Debug)]
pub struct WeatherOrchestrator {
    source: Arc<dyn WeatherSource>,
    geolocation: GeolocationResolver,
    search: LocationSearchEngine,
    search_updates: mpsc::UnboundedReceiver<SearchUpdate>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    fetch_timeout: Option<Duration>,
    fetches_in_flight: usize,
    state: WeatherView,
    published: watch::Sender<WeatherView>,
}

impl WeatherOrchestrator {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        geolocation: GeolocationResolver,
        geocoder: Arc<dyn Geocoder>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (search, search_updates) = LocationSearchEngine::new(geocoder, settings.search);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let state = WeatherView::default();
        let (published, _) = watch::channel(state.clone());

        Self {
            source,
            geolocation,
            search,
            search_updates,
            completions_tx,
            completions_rx,
            fetch_timeout: settings.fetch_timeout,
            fetches_in_flight: 0,
            state,
            published,
        }
    }

    /// Wire up the configured provider, position source and the built-in catalog.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = default_provider_from_config(config)?;
        let positions = position_source_from_config(&config.geolocation)?;
        let settings = OrchestratorSettings {
            search: config.search.settings(),
            fetch_timeout: config.fetch.timeout(),
        };

        Ok(Self::new(
            source,
            GeolocationResolver::new(positions),
            Arc::new(StaticCatalog::default()),
            settings,
        ))
    }

    pub fn view(&self) -> &WeatherView {
        &self.state
    }

    /// Receive a copy of the view after every transition.
    pub fn subscribe(&self) -> watch::Receiver<WeatherView> {
        self.published.subscribe()
    }

    /// True while a fetch or a device position request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.fetches_in_flight > 0 || self.state.locating
    }

    /// Make `location` the active one and start fetching its weather.
    ///
    /// The last accepted location always wins, whatever its origin.
    pub fn accept(&mut self, location: Location) -> Generation {
        let generation = self.state.generation.next();
        tracing::info!(
            %generation,
            origin = ?location.origin,
            location = %location.label(),
            "accepting location"
        );

        let coordinates = location.coordinates;
        self.state.generation = generation;
        self.state.active_location = Some(location);
        self.state.error_message = None;
        self.state.status = FetchStatus::Loading;
        self.publish();

        let source = Arc::clone(&self.source);
        let tx = self.completions_tx.clone();
        let limit = self.fetch_timeout;
        self.fetches_in_flight += 1;

        tokio::spawn(async move {
            let result = match limit {
                Some(limit) => tokio::time::timeout(limit, source.fetch(coordinates))
                    .await
                    .unwrap_or(Err(DataSourceError::Timeout)),
                None => source.fetch(coordinates).await,
            };
            let _ = tx.send(Completion::Fetch { generation, result });
        });

        generation
    }

    /// Apply a finished fetch. Returns false when `generation` is stale and
    /// the result was dropped.
    pub fn resolve(
        &mut self,
        generation: Generation,
        result: Result<WeatherReport, DataSourceError>,
    ) -> bool {
        if generation != self.state.generation {
            tracing::debug!(
                %generation,
                current = %self.state.generation,
                "dropping superseded fetch result"
            );
            return false;
        }

        let result = result.and_then(|report| {
            if report.forecast.len() == FORECAST_DAYS {
                Ok(report)
            } else {
                tracing::warn!(days = report.forecast.len(), "source returned a malformed forecast");
                Err(DataSourceError::Unavailable)
            }
        });

        match result {
            Ok(WeatherReport { mut snapshot, forecast }) => {
                if let Some(name) =
                    self.state.active_location.as_ref().and_then(|l| l.display_name.clone())
                {
                    snapshot.place_name = name;
                }
                tracing::info!(%generation, place = %snapshot.place_name, "weather loaded");

                self.state.status = FetchStatus::Success;
                self.state.snapshot = Some(snapshot);
                self.state.forecast = forecast;
                self.state.error_message = None;
            }
            Err(e) => {
                tracing::warn!(%generation, "weather fetch failed: {e}");
                self.enter_error(e.to_string());
            }
        }

        self.publish();
        true
    }

    /// Surface a failed device position request.
    ///
    /// The generation is left alone, so an in-flight fetch still lands when it
    /// completes.
    pub fn report_geolocation_failure(&mut self, error: GeolocationError) {
        tracing::warn!("device location failed: {error}");
        self.enter_error(error.to_string());
        self.publish();
    }

    /// Clear the search box and ask for the device position. At most one
    /// request is outstanding; a call while one is pending returns `false`
    /// and starts nothing.
    pub fn use_current_location(&mut self) -> bool {
        self.search.close();
        self.state.suggestions = SuggestionList::default();

        if self.state.locating {
            tracing::debug!("device location already requested");
            self.publish();
            return false;
        }

        self.state.locating = true;
        self.publish();

        let resolver = self.geolocation.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = resolver.request_current_location().await;
            let _ = tx.send(Completion::Geolocation(result));
        });

        true
    }

    /// Pick a suggestion: close the list and accept the candidate.
    pub fn select_search_result(&mut self, candidate: &SearchCandidate) -> Generation {
        let location = self.search.select(candidate);
        self.state.suggestions = SuggestionList {
            query: candidate.display_name.clone(),
            ..SuggestionList::default()
        };
        self.accept(location)
    }

    /// Feed the search box text to the debounced lookup.
    pub fn update_query_text(&mut self, text: &str) {
        let scheduled = self.search.submit_query_text(text);
        let list = &mut self.state.suggestions;
        list.query = text.to_string();
        list.loading = scheduled;
        if !scheduled {
            list.open = false;
            list.candidates.clear();
        }
        self.publish();
    }

    /// Wait for the next completion and apply it.
    pub async fn next_event(&mut self) -> OrchestratorEvent {
        loop {
            tokio::select! {
                Some(completion) = self.completions_rx.recv() => {
                    return self.apply_completion(completion);
                }
                Some(update) = self.search_updates.recv() => {
                    if self.apply_search_update(update) {
                        return OrchestratorEvent::SuggestionsChanged;
                    }
                }
            }
        }
    }

    /// Drive events until no fetch or position request is outstanding.
    pub async fn settle(&mut self) {
        while self.is_busy() {
            self.next_event().await;
        }
    }

    fn apply_completion(&mut self, completion: Completion) -> OrchestratorEvent {
        match completion {
            Completion::Fetch { generation, result } => {
                self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);
                let applied = self.resolve(generation, result);
                OrchestratorEvent::FetchCompleted { generation, applied }
            }
            Completion::Geolocation(result) => {
                self.state.locating = false;
                let succeeded = result.is_ok();
                match result {
                    Ok(location) => {
                        self.accept(location);
                    }
                    Err(e) => self.report_geolocation_failure(e),
                }
                OrchestratorEvent::GeolocationCompleted { succeeded }
            }
        }
    }

    fn apply_search_update(&mut self, update: SearchUpdate) -> bool {
        if !self.search.is_current(update.ticket) {
            tracing::debug!(ticket = update.ticket, "ignoring outcome of superseded query");
            return false;
        }

        let list = &mut self.state.suggestions;
        list.loading = false;
        match update.outcome {
            SearchOutcome::Suggestions { candidates, .. } => {
                list.open = true;
                list.candidates = candidates;
            }
            SearchOutcome::NoMatch { .. } => {
                list.open = true;
                list.candidates.clear();
            }
            SearchOutcome::Closed => {
                list.open = false;
                list.candidates.clear();
            }
        }
        self.publish();
        true
    }

    fn enter_error(&mut self, message: String) {
        self.state.status = FetchStatus::Error;
        self.state.snapshot = None;
        self.state.forecast.clear();
        self.state.error_message = Some(message);
    }

    fn publish(&self) {
        self.published.send_replace(self.state.clone());
    }
}
