#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, watch};
use wayfinder::{
    errors::{Notice, WorkflowError},
    events::Event,
    models::{CompletionCandidate, Coordinate, CoordinateRegion, PlaceResult, Route, Scene, TransportType},
    services::{
        simulated::{SimulatedGeocoder, SimulatedRouter, SimulatedScenes},
        AutocompleteSettings, CompletionProvider, Geocoder, LocationProvider, LocationSource,
        MapServices, PermissionStatus, PlaceAutocompleteService, RouteProvider, SceneProvider,
    },
    workflow::{DestinationWorkflow, WorkflowSettings},
};

pub fn coord(latitude: f64, longitude: f64) -> Coordinate {
    Coordinate::new(latitude, longitude).expect("valid test coordinate")
}

pub fn catalog_place(name: &str) -> PlaceResult {
    wayfinder::services::simulated::calgary_catalog()
        .into_iter()
        .find(|p| p.name == name)
        .unwrap_or_else(|| panic!("{name} is not in the catalog"))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Holds provider calls by key until the test releases them, and injects failures.
///
/// Keys: `search:<text>`, `resolve:<title>`, `complete:<text>`, `route:<destination>`,
/// `scene:<coordinate>`.
#[derive(Default)]
pub struct Gates {
    held: Mutex<HashMap<String, watch::Sender<bool>>>,
    failures: Mutex<HashMap<String, WorkflowError>>,
    calls: Mutex<Vec<String>>,
}

impl Gates {
    pub fn hold(&self, key: &str) {
        let (tx, _) = watch::channel(false);
        lock(&self.held).insert(key.to_string(), tx);
    }

    pub fn release(&self, key: &str) {
        if let Some(tx) = lock(&self.held).get(key) {
            tx.send_replace(true);
        }
    }

    pub fn fail(&self, key: &str, err: WorkflowError) {
        lock(&self.failures).insert(key.to_string(), err);
    }

    /// Every key that reached a provider, in arrival order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|k| k.starts_with(prefix))
            .count()
    }

    async fn pass(&self, key: String) -> Result<(), WorkflowError> {
        lock(&self.calls).push(key.clone());
        let gate = lock(&self.held).get(&key).map(|tx| tx.subscribe());
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }
        match lock(&self.failures).get(&key) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Catalog geocoder and completer behind gates
pub struct GatedGeocoder {
    inner: SimulatedGeocoder,
    gates: Arc<Gates>,
}

#[async_trait]
impl Geocoder for GatedGeocoder {
    async fn search(
        &self,
        text: &str,
        bias: CoordinateRegion,
    ) -> Result<Vec<PlaceResult>, WorkflowError> {
        self.gates.pass(format!("search:{text}")).await?;
        self.inner.search(text, bias).await
    }

    async fn resolve(
        &self,
        candidate: &CompletionCandidate,
        bias: CoordinateRegion,
    ) -> Result<Vec<PlaceResult>, WorkflowError> {
        self.gates.pass(format!("resolve:{}", candidate.title)).await?;
        self.inner.resolve(candidate, bias).await
    }
}

#[async_trait]
impl CompletionProvider for GatedGeocoder {
    async fn complete(
        &self,
        text: &str,
        bias: CoordinateRegion,
    ) -> Result<Vec<CompletionCandidate>, WorkflowError> {
        self.gates.pass(format!("complete:{text}")).await?;
        self.inner.complete(text, bias).await
    }
}

pub struct GatedRouter {
    inner: SimulatedRouter,
    gates: Arc<Gates>,
}

#[async_trait]
impl RouteProvider for GatedRouter {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        transport: TransportType,
    ) -> Result<Route, WorkflowError> {
        self.gates.pass(format!("route:{destination}")).await?;
        self.inner.route(origin, destination, transport).await
    }
}

pub struct GatedScenes {
    inner: SimulatedScenes,
    gates: Arc<Gates>,
}

#[async_trait]
impl SceneProvider for GatedScenes {
    async fn scene(&self, coordinate: Coordinate) -> Result<Scene, WorkflowError> {
        self.gates.pass(format!("scene:{coordinate}")).await?;
        self.inner.scene(coordinate).await
    }
}

/// Location source driven by the test through a channel
pub struct ChannelLocation {
    permission: PermissionStatus,
    fixes: Mutex<Option<fmpsc::UnboundedReceiver<Result<Coordinate, WorkflowError>>>>,
}

impl ChannelLocation {
    pub fn new(
        permission: PermissionStatus,
    ) -> (Arc<Self>, fmpsc::UnboundedSender<Result<Coordinate, WorkflowError>>) {
        let (tx, rx) = fmpsc::unbounded();
        let source = Arc::new(Self {
            permission,
            fixes: Mutex::new(Some(rx)),
        });
        (source, tx)
    }
}

#[async_trait]
impl LocationSource for ChannelLocation {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    fn subscribe(&self) -> BoxStream<'static, Result<Coordinate, WorkflowError>> {
        match lock(&self.fixes).take() {
            Some(rx) => rx.boxed(),
            None => stream::empty().boxed(),
        }
    }
}

pub fn test_settings() -> WorkflowSettings {
    WorkflowSettings {
        request_timeout: Duration::from_secs(10),
        ..WorkflowSettings::default()
    }
}

/// A workflow over gated catalog providers with an event subscription taken up front
pub struct TestMap {
    pub workflow: DestinationWorkflow,
    pub gates: Arc<Gates>,
    events: broadcast::Receiver<Event>,
}

impl TestMap {
    pub fn new(location: LocationProvider) -> Self {
        Self::with_settings(location, test_settings())
    }

    pub fn with_settings(location: LocationProvider, settings: WorkflowSettings) -> Self {
        let gates = Arc::new(Gates::default());
        let geocoder = Arc::new(GatedGeocoder {
            inner: SimulatedGeocoder::calgary(Duration::ZERO),
            gates: gates.clone(),
        });
        let services = MapServices::new(
            geocoder.clone(),
            Arc::new(GatedRouter {
                inner: SimulatedRouter::new(50.0, Duration::ZERO),
                gates: gates.clone(),
            }),
            Arc::new(GatedScenes {
                inner: SimulatedScenes::new(None, Duration::ZERO),
                gates: gates.clone(),
            }),
        );
        let autocomplete = PlaceAutocompleteService::new(
            geocoder,
            AutocompleteSettings {
                debounce: Duration::ZERO,
                timeout: settings.request_timeout,
            },
        );

        let workflow = DestinationWorkflow::new(services, autocomplete, location, settings);
        let events = workflow.subscribe_events();
        Self {
            workflow,
            gates,
            events,
        }
    }

    /// Events published since the last call
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn notices(events: &[Event]) -> Vec<&Notice> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}
