//! In-memory providers backing the CLI and integration tests.
//!
//! The gazetteer is a fixed catalog of Calgary places. Routing interpolates a straight
//! polyline; imagery returns ids derived from the coordinate.

use super::autocomplete::CompletionProvider;
use super::geocoding::Geocoder;
use super::location::{LocationSource, PermissionStatus};
use super::look_around::SceneProvider;
use super::routing::RouteProvider;
use crate::errors::WorkflowError;
use crate::models::{
    CompletionCandidate, Coordinate, CoordinateRegion, PlaceResult, Route, Scene, TransportType,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;
use uuid::Uuid;

/// Upper bound on candidates returned by the simulated completer
const MAX_COMPLETIONS: usize = 8;

/// Straight-line distance is stretched by this factor to approximate a road network
const ROAD_DETOUR_FACTOR: f64 = 1.25;

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

fn place(name: &str, lat: f64, lon: f64, address: &str, category: &str) -> Option<PlaceResult> {
    let coordinate = Coordinate::new(lat, lon).ok()?;
    Some(
        PlaceResult::new(name, coordinate)
            .with_address(address)
            .with_category(category),
    )
}

/// The built-in place catalog
pub fn calgary_catalog() -> Vec<PlaceResult> {
    [
        place("Calgary Tower", 51.0443, -114.0631, "101 9 Ave SW", "landmark"),
        place("Calgary Zoo", 51.0459, -114.0290, "210 St. George's Dr NE", "zoo"),
        place("Central Library", 51.0459, -114.0566, "800 3 St SE", "library"),
        place("Prince's Island Park", 51.0535, -114.0697, "698 Eau Claire Ave SW", "park"),
        place("University of Calgary", 51.0780, -114.1320, "2500 University Dr NW", "university"),
        place("Stampede Park", 51.0374, -114.0519, "1410 Olympic Way SE", "venue"),
        place("Chinook Centre", 50.9983, -114.0735, "6455 Macleod Trail SW", "shopping"),
        place("Nose Hill Park", 51.1130, -114.1080, "1425 John Laurie Blvd NW", "park"),
        place("Calgary International Airport", 51.1215, -114.0076, "2000 Airport Rd NE", "airport"),
        place("Peace Bridge", 51.0539, -114.0790, "Bow River Pathway", "landmark"),
        place("Heritage Park", 50.9820, -114.1050, "1900 Heritage Dr SW", "museum"),
        place("Calaway Park", 51.0870, -114.3580, "245033 Range Rd 33", "amusement park"),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Gazetteer-backed geocoder and completer
#[derive(Debug, Clone)]
pub struct SimulatedGeocoder {
    places: Vec<PlaceResult>,
    latency: Duration,
}

impl SimulatedGeocoder {
    pub fn new(places: Vec<PlaceResult>, latency: Duration) -> Self {
        Self { places, latency }
    }

    pub fn calgary(latency: Duration) -> Self {
        Self::new(calgary_catalog(), latency)
    }

    /// Case-insensitive matches: name prefixes first, then substrings of name or
    /// address, each group ordered by distance from the bias center
    fn matches(&self, text: &str, bias: &CoordinateRegion) -> Vec<PlaceResult> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(u8, f64, &PlaceResult)> = self
            .places
            .iter()
            .filter_map(|p| {
                let name = p.name.to_lowercase();
                let address = p.address.as_deref().unwrap_or_default().to_lowercase();
                let rank = if name.starts_with(&needle) {
                    0
                } else if name.contains(&needle) || address.contains(&needle) {
                    1
                } else {
                    return None;
                };
                Some((rank, p.coordinate.distance_to(&bias.center), p))
            })
            .collect();

        ranked.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        ranked.into_iter().map(|(_, _, p)| p.clone()).collect()
    }
}

#[async_trait]
impl Geocoder for SimulatedGeocoder {
    async fn search(
        &self,
        text: &str,
        bias: CoordinateRegion,
    ) -> Result<Vec<PlaceResult>, WorkflowError> {
        simulate_latency(self.latency).await;
        Ok(self.matches(text, &bias))
    }

    async fn resolve(
        &self,
        candidate: &CompletionCandidate,
        bias: CoordinateRegion,
    ) -> Result<Vec<PlaceResult>, WorkflowError> {
        simulate_latency(self.latency).await;
        let exact: Vec<PlaceResult> = self
            .places
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(candidate.title.trim()))
            .cloned()
            .collect();
        if exact.is_empty() {
            Ok(self.matches(&candidate.title, &bias))
        } else {
            Ok(exact)
        }
    }
}

#[async_trait]
impl CompletionProvider for SimulatedGeocoder {
    async fn complete(
        &self,
        text: &str,
        bias: CoordinateRegion,
    ) -> Result<Vec<CompletionCandidate>, WorkflowError> {
        simulate_latency(self.latency).await;
        Ok(self
            .matches(text, &bias)
            .into_iter()
            .take(MAX_COMPLETIONS)
            .map(|p| {
                let subtitle = p.address.or(p.category).unwrap_or_default();
                CompletionCandidate::new(p.name, subtitle)
            })
            .collect())
    }
}

/// Straight-line router
#[derive(Debug, Clone)]
pub struct SimulatedRouter {
    speed_kmh: f64,
    segments: usize,
    latency: Duration,
}

impl SimulatedRouter {
    pub fn new(speed_kmh: f64, latency: Duration) -> Self {
        Self {
            speed_kmh,
            segments: 16,
            latency,
        }
    }
}

#[async_trait]
impl RouteProvider for SimulatedRouter {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        transport: TransportType,
    ) -> Result<Route, WorkflowError> {
        simulate_latency(self.latency).await;

        if !self.speed_kmh.is_finite() || self.speed_kmh <= 0.0 {
            return Err(WorkflowError::service("router has no usable speed"));
        }

        let polyline: Vec<Coordinate> = (0..=self.segments)
            .map(|i| origin.lerp(&destination, i as f64 / self.segments as f64))
            .collect();
        let distance_meters = origin.distance_to(&destination) * ROAD_DETOUR_FACTOR;
        let hours = distance_meters / 1000.0 / self.speed_kmh;

        Ok(Route {
            polyline,
            distance_meters,
            expected_travel_time: Duration::from_secs_f64(hours * 3600.0),
            transport,
            name: Some(format!("{} to {}", origin, destination)),
        })
    }
}

/// Look-around imagery with optional coverage limits
#[derive(Debug, Clone)]
pub struct SimulatedScenes {
    coverage: Option<CoordinateRegion>,
    latency: Duration,
}

impl SimulatedScenes {
    pub fn new(coverage: Option<CoordinateRegion>, latency: Duration) -> Self {
        Self { coverage, latency }
    }
}

#[async_trait]
impl SceneProvider for SimulatedScenes {
    async fn scene(&self, coordinate: Coordinate) -> Result<Scene, WorkflowError> {
        simulate_latency(self.latency).await;

        if let Some(coverage) = &self.coverage {
            if !coverage.contains(&coordinate) {
                return Err(WorkflowError::NotFound(format!(
                    "no look around imagery at {}",
                    coordinate
                )));
            }
        }

        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("scene:{}", coordinate).as_bytes());
        Ok(Scene {
            id: id.to_string(),
            coordinate,
        })
    }
}

/// Location source that answers the permission prompt with a fixed status and then
/// reports a scripted list of fixes
#[derive(Debug, Clone)]
pub struct SimulatedLocation {
    permission: PermissionStatus,
    fixes: Vec<Coordinate>,
}

impl SimulatedLocation {
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            permission: PermissionStatus::Granted,
            fixes: vec![coordinate],
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: PermissionStatus::Denied,
            fixes: Vec::new(),
        }
    }
}

#[async_trait]
impl LocationSource for SimulatedLocation {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    fn subscribe(&self) -> BoxStream<'static, Result<Coordinate, WorkflowError>> {
        stream::iter(self.fixes.clone().into_iter().map(Ok)).boxed()
    }
}
