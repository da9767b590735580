//! Reference catalog of named places and the geocoding lookup boundary.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::model::{Coordinates, SearchCandidate};

/// (name, country, latitude, longitude), in catalog order.
const PLACES: &[(&str, &str, f64, f64)] = &[
    ("New York", "US", 40.7128, -74.0060),
    ("London", "GB", 51.5074, -0.1278),
    ("Tokyo", "JP", 35.6762, 139.6503),
    ("Paris", "FR", 48.8566, 2.3522),
    ("Sydney", "AU", -33.8688, 151.2093),
    ("Dubai", "AE", 25.2048, 55.2708),
    ("Singapore", "SG", 1.3521, 103.8198),
    ("Mumbai", "IN", 19.0760, 72.8777),
    ("Berlin", "DE", 52.5200, 13.4050),
    ("Toronto", "CA", 43.6532, -79.3832),
];

/// Resolves free text to an ordered list of candidate places.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn lookup(&self, query: &str) -> Vec<SearchCandidate>;
}

/// In-memory catalog matched by case-insensitive substring on the display name.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    entries: Vec<SearchCandidate>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        let entries = PLACES
            .iter()
            .filter_map(|&(name, country, lat, lon)| {
                Coordinates::new(lat, lon).ok().map(|coordinates| SearchCandidate {
                    display_name: name.to_string(),
                    country: country.to_string(),
                    coordinates,
                })
            })
            .collect();

        Self { entries }
    }
}

impl StaticCatalog {
    pub fn new(entries: Vec<SearchCandidate>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SearchCandidate] {
        &self.entries
    }

    /// Matches in catalog order; no relevance ranking.
    pub fn matching(&self, query: &str) -> Vec<SearchCandidate> {
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .filter(|c| c.display_name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Exact match on 4-decimal rounded coordinates.
    pub fn name_at(&self, coordinates: &Coordinates) -> Option<&str> {
        let key = coordinates.rounded_key();
        self.entries
            .iter()
            .find(|c| c.coordinates.rounded_key() == key)
            .map(|c| c.display_name.as_str())
    }
}

#[async_trait]
impl Geocoder for StaticCatalog {
    async fn lookup(&self, query: &str) -> Vec<SearchCandidate> {
        self.matching(query)
    }
}
