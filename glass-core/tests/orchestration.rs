//! End-to-end behaviour of the orchestrator with racing location sources.
//!
//! All tests run on tokio's paused clock, so latencies are exact and nothing
//! actually sleeps.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use glass_core::{
    Coordinates, DataSourceError, FetchStatus, Geocoder, GeolocationError, GeolocationResolver,
    Location, LocationOrigin, OrchestratorEvent, OrchestratorSettings, PositionSource,
    SearchCandidate, StaticCatalog, WeatherOrchestrator, WeatherReport, WeatherSource,
    geolocation::{DeniedPositionSource, FixedPositionSource, Position},
    provider::synthetic::SyntheticSource,
};

/// Synthetic data with a per-place latency and optional failure.
#[derive(Debug)]
struct ScriptedSource {
    script: Vec<(Coordinates, Duration, bool)>,
    calls: Mutex<Vec<Coordinates>>,
}

impl ScriptedSource {
    fn new(script: Vec<(Coordinates, Duration, bool)>) -> Self {
        Self { script, calls: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl WeatherSource for ScriptedSource {
    async fn fetch(&self, coordinates: Coordinates) -> Result<WeatherReport, DataSourceError> {
        self.calls.lock().unwrap().push(coordinates);
        let (delay, fail) = self
            .script
            .iter()
            .find(|(c, _, _)| *c == coordinates)
            .map(|(_, d, f)| (*d, *f))
            .unwrap_or((Duration::from_secs(1), false));

        tokio::time::sleep(delay).await;
        if fail {
            SyntheticSource::failing(Duration::ZERO).fetch(coordinates).await
        } else {
            SyntheticSource::new(Duration::ZERO).fetch(coordinates).await
        }
    }
}

/// Position source that answers after a delay.
#[derive(Debug)]
struct SlowPosition {
    delay: Duration,
    result: Result<Position, GeolocationError>,
}

#[async_trait]
impl PositionSource for SlowPosition {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        tokio::time::sleep(self.delay).await;
        self.result.clone()
    }
}

#[derive(Debug, Default)]
struct CountingGeocoder {
    catalog: StaticCatalog,
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    async fn lookup(&self, query: &str) -> Vec<SearchCandidate> {
        self.queries.lock().unwrap().push(query.to_string());
        self.catalog.matching(query)
    }
}

fn coords(lat: f64, lon: f64) -> Coordinates {
    Coordinates::new(lat, lon).unwrap()
}

fn london() -> Coordinates {
    coords(51.5074, -0.1278)
}

fn paris() -> Coordinates {
    coords(48.8566, 2.3522)
}

fn named(name: &str, coordinates: Coordinates) -> Location {
    Location { coordinates, display_name: Some(name.into()), origin: LocationOrigin::Search }
}

fn build(
    source: Arc<dyn WeatherSource>,
    positions: Arc<dyn PositionSource>,
) -> WeatherOrchestrator {
    WeatherOrchestrator::new(
        source,
        GeolocationResolver::new(positions),
        Arc::new(StaticCatalog::default()),
        OrchestratorSettings { fetch_timeout: None, ..Default::default() },
    )
}

#[tokio::test(start_paused = true)]
async fn search_selection_goes_idle_loading_success() {
    let mut orch = build(
        Arc::new(SyntheticSource::new(Duration::from_secs(1))),
        Arc::new(DeniedPositionSource),
    );
    let mut rx = orch.subscribe();
    assert_eq!(rx.borrow_and_update().status, FetchStatus::Idle);

    orch.accept(named("London", london()));
    assert_eq!(rx.borrow_and_update().status, FetchStatus::Loading);

    orch.settle().await;
    let view = rx.borrow_and_update().clone();

    assert_eq!(view.status, FetchStatus::Success);
    let active = view.active_location.unwrap();
    assert_eq!(active.coordinates, london());
    assert_eq!(active.origin, LocationOrigin::Search);
    assert_eq!(view.forecast.len(), 7);
    assert_eq!(view.snapshot.unwrap().place_name, "London");
    assert!(view.error_message.is_none());
}

#[tokio::test(start_paused = true)]
async fn typing_burst_runs_one_lookup() {
    let geocoder = Arc::new(CountingGeocoder::default());
    let mut orch = WeatherOrchestrator::new(
        Arc::new(SyntheticSource::new(Duration::from_secs(1))),
        GeolocationResolver::new(Arc::new(DeniedPositionSource)),
        geocoder.clone(),
        OrchestratorSettings::default(),
    );

    orch.update_query_text("Lo");
    tokio::time::sleep(Duration::from_millis(50)).await;
    orch.update_query_text("Lon");
    tokio::time::sleep(Duration::from_millis(50)).await;
    orch.update_query_text("London");

    assert_eq!(orch.next_event().await, OrchestratorEvent::SuggestionsChanged);

    let list = &orch.view().suggestions;
    assert!(list.open);
    assert_eq!(list.candidates.len(), 1);
    assert_eq!(list.candidates[0].display_name, "London");
    assert_eq!(*geocoder.queries.lock().unwrap(), vec!["London".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn superseded_fetch_is_discarded() {
    let source = Arc::new(ScriptedSource::new(vec![
        (london(), Duration::from_secs(1), false),
        (paris(), Duration::from_secs(3), false),
    ]));
    let mut orch = build(source.clone(), Arc::new(DeniedPositionSource));

    let first = orch.accept(named("London", london()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = orch.accept(named("Paris", paris()));

    // London lands first but belongs to an older generation.
    let event = orch.next_event().await;
    assert_eq!(event, OrchestratorEvent::FetchCompleted { generation: first, applied: false });
    assert_eq!(orch.view().status, FetchStatus::Loading);
    assert!(orch.view().snapshot.is_none());
    assert_eq!(orch.view().active_location.as_ref().unwrap().coordinates, paris());

    let event = orch.next_event().await;
    assert_eq!(event, OrchestratorEvent::FetchCompleted { generation: second, applied: true });
    assert_eq!(orch.view().status, FetchStatus::Success);
    assert_eq!(orch.view().snapshot.as_ref().unwrap().place_name, "Paris");

    assert_eq!(source.calls.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stale_failure_does_not_mask_newer_success() {
    let source = Arc::new(ScriptedSource::new(vec![
        (london(), Duration::from_secs(2), true),
        (paris(), Duration::from_secs(1), false),
    ]));
    let mut orch = build(source, Arc::new(DeniedPositionSource));

    orch.accept(named("London", london()));
    orch.accept(named("Paris", paris()));
    orch.settle().await;

    let view = orch.view();
    assert_eq!(view.status, FetchStatus::Success);
    assert!(view.error_message.is_none());
    assert_eq!(view.snapshot.as_ref().unwrap().place_name, "Paris");
}

#[tokio::test(start_paused = true)]
async fn last_accept_wins_regardless_of_completion_order() {
    let places = [
        ("New York", coords(40.7128, -74.006)),
        ("Tokyo", coords(35.6762, 139.6503)),
        ("Sydney", coords(-33.8688, 151.2093)),
        ("Dubai", coords(25.2048, 55.2708)),
        ("Mumbai", coords(19.076, 72.8777)),
    ];
    // Earlier requests take longer, so completions arrive in reverse order.
    let script = places
        .iter()
        .enumerate()
        .map(|(i, (_, c))| (*c, Duration::from_millis(1000 - 150 * i as u64), false))
        .collect();
    let mut orch = build(Arc::new(ScriptedSource::new(script)), Arc::new(DeniedPositionSource));

    let mut last = None;
    for (name, c) in places {
        last = Some(orch.accept(named(name, c)));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    orch.settle().await;

    let view = orch.view();
    assert_eq!(Some(view.generation), last);
    assert_eq!(view.active_location.as_ref().unwrap().display_name.as_deref(), Some("Mumbai"));
    assert_eq!(view.snapshot.as_ref().unwrap().place_name, "Mumbai");
    assert_eq!(view.status, FetchStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn denied_location_keeps_active_location() {
    let mut orch = build(
        Arc::new(SyntheticSource::new(Duration::from_secs(1))),
        Arc::new(DeniedPositionSource),
    );
    orch.accept(named("London", london()));
    orch.settle().await;
    let generation = orch.view().generation;

    assert!(orch.use_current_location());
    orch.settle().await;

    let view = orch.view();
    assert_eq!(view.error_message.as_deref(), Some("Location permission denied"));
    assert_eq!(view.status, FetchStatus::Error);
    assert_eq!(view.active_location.as_ref().unwrap().coordinates, london());
    assert_eq!(view.generation, generation);
    assert!(view.snapshot.is_none());
    assert!(view.forecast.is_empty());
}

#[tokio::test(start_paused = true)]
async fn location_failure_does_not_cancel_search_fetch() {
    let mut orch = build(
        Arc::new(SyntheticSource::new(Duration::from_secs(2))),
        Arc::new(SlowPosition {
            delay: Duration::from_millis(500),
            result: Err(GeolocationError::PositionUnavailable),
        }),
    );

    orch.use_current_location();
    let generation = orch.accept(named("Paris", paris()));

    assert_eq!(
        orch.next_event().await,
        OrchestratorEvent::SuggestionsChanged,
        "closing the list on a location request is reported first"
    );
    assert_eq!(
        orch.next_event().await,
        OrchestratorEvent::GeolocationCompleted { succeeded: false }
    );
    assert_eq!(orch.view().error_message.as_deref(), Some("Current position is unavailable"));
    assert_eq!(orch.view().generation, generation);

    assert_eq!(
        orch.next_event().await,
        OrchestratorEvent::FetchCompleted { generation, applied: true }
    );
    assert_eq!(orch.view().status, FetchStatus::Success);
    assert!(orch.view().error_message.is_none());
}

#[tokio::test(start_paused = true)]
async fn device_result_arriving_after_selection_wins() {
    let tokyo = coords(35.6762, 139.6503);
    let mut orch = build(
        Arc::new(SyntheticSource::new(Duration::from_secs(1))),
        Arc::new(FixedPositionSource::new(tokyo, Some("Tokyo".into()))),
    );

    orch.use_current_location();
    let candidate = StaticCatalog::default().matching("Paris").remove(0);
    orch.select_search_result(&candidate);
    orch.settle().await;

    let view = orch.view();
    let active = view.active_location.as_ref().unwrap();
    assert_eq!(active.origin, LocationOrigin::Device);
    assert_eq!(active.coordinates, tokyo);
    assert_eq!(view.generation.value(), 2);
    assert_eq!(view.snapshot.as_ref().unwrap().place_name, "Tokyo");
}

#[tokio::test(start_paused = true)]
async fn selection_after_device_location_wins() {
    let tokyo = coords(35.6762, 139.6503);
    let mut orch = build(
        Arc::new(SyntheticSource::new(Duration::from_secs(1))),
        Arc::new(SlowPosition {
            delay: Duration::from_millis(100),
            result: Ok(Position { coordinates: tokyo, locality: None }),
        }),
    );

    orch.use_current_location();
    // Device position lands at 100ms and its fetch starts.
    tokio::time::sleep(Duration::from_millis(200)).await;
    while orch.view().generation.value() == 0 {
        orch.next_event().await;
    }
    assert_eq!(orch.view().active_location.as_ref().unwrap().origin, LocationOrigin::Device);

    let candidate = StaticCatalog::default().matching("Berlin").remove(0);
    orch.select_search_result(&candidate);
    orch.settle().await;

    let view = orch.view();
    assert_eq!(view.active_location.as_ref().unwrap().origin, LocationOrigin::Search);
    assert_eq!(view.snapshot.as_ref().unwrap().place_name, "Berlin");
}

#[tokio::test(start_paused = true)]
async fn forecast_is_seven_ascending_days_from_today() {
    let mut orch = build(
        Arc::new(SyntheticSource::new(Duration::from_millis(10))),
        Arc::new(DeniedPositionSource),
    );
    orch.accept(named("Toronto", coords(43.6532, -79.3832)));
    orch.settle().await;

    let forecast = &orch.view().forecast;
    assert_eq!(forecast.len(), 7);
    assert_eq!(forecast[0].label(0), "Today");
    assert_eq!(forecast[0].date, chrono::Local::now().date_naive());
    assert!(forecast.windows(2).all(|w| w[0].date < w[1].date));
}

#[tokio::test(start_paused = true)]
async fn new_accept_after_error_clears_message_immediately() {
    let source = Arc::new(ScriptedSource::new(vec![(london(), Duration::from_secs(1), true)]));
    let mut orch = build(source, Arc::new(DeniedPositionSource));

    orch.accept(named("London", london()));
    orch.settle().await;
    assert_eq!(orch.view().status, FetchStatus::Error);
    assert!(orch.view().error_message.is_some());

    orch.accept(named("Paris", paris()));
    assert_eq!(orch.view().status, FetchStatus::Loading);
    assert!(orch.view().error_message.is_none());
}
