//! Incremental location search with debounced lookups.
//!
//! Every call to [`LocationSearchEngine::submit_query_text`] takes a new query
//! ticket and supersedes whatever lookup was pending. The pending task is
//! aborted, and a task that still wakes up checks its ticket against the
//! current one before it looks anything up or publishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::catalog::Geocoder;
use crate::model::{Location, SearchCandidate};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_MIN_QUERY_LEN: usize = 2;

/// What the engine publishes for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Suggestions { query: String, candidates: Vec<SearchCandidate> },
    NoMatch { query: String },
    /// Suggestion list closed: query too short, cleared, or a candidate was picked.
    Closed,
}

/// An outcome together with the query ticket that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchUpdate {
    pub ticket: u64,
    pub outcome: SearchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub debounce: Duration,
    pub min_query_len: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { debounce: DEFAULT_DEBOUNCE, min_query_len: DEFAULT_MIN_QUERY_LEN }
    }
}

#[derive(Debug)]
pub struct LocationSearchEngine {
    geocoder: Arc<dyn Geocoder>,
    settings: SearchSettings,
    ticket: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    outcomes: mpsc::UnboundedSender<SearchUpdate>,
}

impl LocationSearchEngine {
    /// Create an engine and the receiving end of its outcome stream.
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        settings: SearchSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SearchUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            geocoder,
            settings,
            ticket: Arc::new(AtomicU64::new(0)),
            pending: None,
            outcomes: tx,
        };
        (engine, rx)
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    /// True if `ticket` belongs to the most recent query or close request.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.ticket.load(Ordering::SeqCst) == ticket
    }

    /// Schedule a lookup for `text` after the debounce delay.
    ///
    /// Returns `true` when a lookup was scheduled, `false` when the text was
    /// too short and the list was closed instead.
    pub fn submit_query_text(&mut self, text: &str) -> bool {
        let ticket = self.supersede();

        if text.chars().count() < self.settings.min_query_len {
            let _ = self.outcomes.send(SearchUpdate { ticket, outcome: SearchOutcome::Closed });
            return false;
        }

        let query = text.to_string();
        let current = Arc::clone(&self.ticket);
        let geocoder = Arc::clone(&self.geocoder);
        let tx = self.outcomes.clone();
        let debounce = self.settings.debounce;

        tracing::debug!(query = %query, ticket, "scheduling location lookup");

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if current.load(Ordering::SeqCst) != ticket {
                tracing::debug!(query = %query, ticket, "lookup superseded before it ran");
                return;
            }

            let candidates = geocoder.lookup(&query).await;
            if current.load(Ordering::SeqCst) != ticket {
                tracing::debug!(query = %query, ticket, "dropping superseded lookup result");
                return;
            }

            tracing::debug!(query = %query, hits = candidates.len(), "lookup finished");
            let outcome = if candidates.is_empty() {
                SearchOutcome::NoMatch { query }
            } else {
                SearchOutcome::Suggestions { query, candidates }
            };
            let _ = tx.send(SearchUpdate { ticket, outcome });
        }));

        true
    }

    /// Close the list and turn `candidate` into a search-originated location.
    ///
    /// This does not fetch anything; the caller hands the location on.
    pub fn select(&mut self, candidate: &SearchCandidate) -> Location {
        self.close();
        Location::from_candidate(candidate)
    }

    /// Cancel any pending lookup and publish [`SearchOutcome::Closed`].
    pub fn close(&mut self) {
        let ticket = self.supersede();
        let _ = self.outcomes.send(SearchUpdate { ticket, outcome: SearchOutcome::Closed });
    }

    /// True while a scheduled lookup has not yet published.
    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn supersede(&mut self) -> u64 {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        self.ticket.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Drop for LocationSearchEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::model::LocationOrigin;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every query it is asked to look up.
    #[derive(Debug, Default)]
    struct RecordingGeocoder {
        catalog: StaticCatalog,
        queries: Mutex<Vec<String>>,
        delay: Duration,
    }

    #[async_trait]
    impl Geocoder for RecordingGeocoder {
        async fn lookup(&self, query: &str) -> Vec<SearchCandidate> {
            self.queries.lock().unwrap().push(query.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.catalog.matching(query)
        }
    }

    fn engine_with(
        geocoder: Arc<RecordingGeocoder>,
    ) -> (LocationSearchEngine, mpsc::UnboundedReceiver<SearchUpdate>) {
        LocationSearchEngine::new(geocoder, SearchSettings::default())
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<SearchUpdate>) -> Option<SearchOutcome> {
        rx.recv().await.map(|u| u.outcome)
    }

    fn try_recv(rx: &mut mpsc::UnboundedReceiver<SearchUpdate>) -> Option<SearchOutcome> {
        rx.try_recv().ok().map(|u| u.outcome)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_typing_runs_one_lookup_for_final_text() {
        let geocoder = Arc::new(RecordingGeocoder::default());
        let (mut engine, mut rx) = engine_with(Arc::clone(&geocoder));

        engine.submit_query_text("Lo");
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.submit_query_text("Lon");
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.submit_query_text("London");

        let outcome = recv(&mut rx).await.unwrap();
        match outcome {
            SearchOutcome::Suggestions { query, candidates } => {
                assert_eq!(query, "London");
                assert_eq!(candidates.len(), 1);
                assert_eq!(candidates[0].display_name, "London");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(try_recv(&mut rx).is_none());
        assert_eq!(*geocoder.queries.lock().unwrap(), vec!["London".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_waits_for_debounce() {
        let geocoder = Arc::new(RecordingGeocoder::default());
        let (mut engine, mut rx) = engine_with(Arc::clone(&geocoder));

        engine.submit_query_text("Par");
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(try_recv(&mut rx).is_none());
        assert!(geocoder.queries.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(matches!(try_recv(&mut rx), Some(SearchOutcome::Suggestions { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_closes_without_lookup() {
        let geocoder = Arc::new(RecordingGeocoder::default());
        let (mut engine, mut rx) = engine_with(Arc::clone(&geocoder));

        assert!(!engine.submit_query_text("L"));
        assert_eq!(recv(&mut rx).await, Some(SearchOutcome::Closed));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(geocoder.queries.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_cancels_pending_lookup() {
        let geocoder = Arc::new(RecordingGeocoder::default());
        let (mut engine, mut rx) = engine_with(Arc::clone(&geocoder));

        engine.submit_query_text("Tok");
        engine.submit_query_text("");
        assert_eq!(recv(&mut rx).await, Some(SearchOutcome::Closed));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(try_recv(&mut rx).is_none());
        assert!(geocoder.queries.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unmatched_query_reports_no_match() {
        let geocoder = Arc::new(RecordingGeocoder::default());
        let (mut engine, mut rx) = engine_with(geocoder);

        engine.submit_query_text("Atlantis");
        assert_eq!(recv(&mut rx).await, Some(SearchOutcome::NoMatch { query: "Atlantis".into() }));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_lookup_is_superseded_by_newer_query() {
        let geocoder = Arc::new(RecordingGeocoder {
            delay: Duration::from_millis(500),
            ..Default::default()
        });
        let (mut engine, mut rx) = engine_with(Arc::clone(&geocoder));

        engine.submit_query_text("Ber");
        // Past the debounce: the Berlin lookup is now running.
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(engine.has_pending());
        engine.submit_query_text("Syd");

        let outcome = recv(&mut rx).await.unwrap();
        assert!(
            matches!(&outcome, SearchOutcome::Suggestions { query, .. } if query == "Syd"),
            "got {outcome:?}"
        );
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(try_recv(&mut rx).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn select_closes_list_and_yields_search_location() {
        let geocoder = Arc::new(RecordingGeocoder::default());
        let (mut engine, mut rx) = engine_with(Arc::clone(&geocoder));

        engine.submit_query_text("Dub");
        let candidate = StaticCatalog::default().matching("Dubai").remove(0);
        let location = engine.select(&candidate);

        assert_eq!(location.origin, LocationOrigin::Search);
        assert_eq!(location.display_name.as_deref(), Some("Dubai"));
        assert_eq!(recv(&mut rx).await, Some(SearchOutcome::Closed));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(try_recv(&mut rx).is_none());
        assert!(!engine.has_pending());
    }
}
