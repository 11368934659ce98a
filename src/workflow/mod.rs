//! Destination resolution and route requests.
//!
//! [`DestinationWorkflow`] owns the active destination, route, camera target and preview.
//! Inputs (typed search, chosen suggestion, long-press, manual override) each take a
//! destination [`RequestId`] when initiated. Provider calls run on spawned tasks and
//! report back over one channel to the apply loop, which drops any result whose id is no
//! longer the newest for its sequence.

mod apply;
pub mod preview;
pub mod sequence;
pub mod state;
pub mod tracker;

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::errors::{Prerequisite, WorkflowError};
use crate::events::{Event, EventSender};
use crate::models::{CompletionCandidate, Coordinate, CoordinateRegion, Scene, TransportType};
use crate::services::{
    bounded, LocationProvider, MapServices, PermissionStatus, PlaceAutocompleteService,
    Suggestions,
};

use apply::{Completion, Envelope};
use preview::PreviewLoader;
use tracker::InFlight;

pub use sequence::{RequestId, Sequencer};
pub use state::{Destination, DestinationSource, RouteState, WorkflowState};

/// Runtime knobs for the workflow, usually built from [`crate::config::AppConfig`]
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Upper bound for every provider call
    pub request_timeout: Duration,
    /// Search bias, and the autocomplete bias until a viewport is known
    pub default_region: CoordinateRegion,
    /// Camera span after a chosen suggestion resolves
    pub suggestion_span_degrees: f64,
    /// Camera padding around a route's bounding box
    pub route_padding_factor: f64,
    pub event_capacity: usize,
    pub transport: TransportType,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            default_region: CoordinateRegion::around(
                Coordinate::new_unchecked(51.0447, -114.0719),
                0.5,
            ),
            suggestion_span_degrees: 0.01,
            route_padding_factor: 1.3,
            event_capacity: 256,
            transport: TransportType::Driving,
        }
    }
}

struct Shared {
    services: MapServices,
    settings: WorkflowSettings,
    destinations: Sequencer,
    routes: Sequencer,
    previews: PreviewLoader,
    state: watch::Sender<WorkflowState>,
    events: EventSender,
    in_flight: InFlight,
    completions: mpsc::WeakUnboundedSender<Envelope>,
    runtime: Handle,
}

impl Shared {
    /// Runs `call` on its own task under the request timeout and hands the wrapped
    /// result to the apply loop
    fn dispatch<T, F, W>(&self, call: F, wrap: W)
    where
        T: Send + 'static,
        F: Future<Output = Result<T, WorkflowError>> + Send + 'static,
        W: FnOnce(Result<T, WorkflowError>) -> Completion + Send + 'static,
    {
        let Some(tx) = self.completions.upgrade() else {
            debug!("workflow stopped; request not dispatched");
            return;
        };
        let guard = self.in_flight.begin();
        let timeout = self.settings.request_timeout;

        self.runtime.spawn(async move {
            let result = bounded(timeout, call).await;
            let envelope = Envelope {
                completion: wrap(result),
                guard,
            };
            if tx.send(envelope).is_err() {
                debug!("apply loop gone; dropping completion");
            }
        });
    }

    fn request_preview(&self, coordinate: Coordinate) -> RequestId {
        let (id, fetch) = self.previews.begin(coordinate);
        self.dispatch_preview(id, coordinate, fetch);
        id
    }

    fn dispatch_preview<F>(&self, id: RequestId, coordinate: Coordinate, fetch: F)
    where
        F: Future<Output = Result<Scene, WorkflowError>> + Send + 'static,
    {
        debug!(request = %id, %coordinate, "requesting look around preview");
        self.dispatch(fetch, move |result| Completion::Preview {
            id,
            coordinate,
            result,
        });
    }

    /// Logs the error and, when user-visible, records and publishes its notice
    fn notify(&self, err: &WorkflowError) {
        let Some(notice) = err.to_notice() else {
            debug!(error = %err, "not user visible");
            return;
        };
        warn!(kind = %notice.kind, error = %err, "raising notice");
        self.state.send_modify(|s| s.last_notice = Some(notice.clone()));
        self.events.send(Event::Notice(notice));
    }
}

/// The map screen's single owner of destination and route state
#[derive(Clone)]
pub struct DestinationWorkflow {
    shared: Arc<Shared>,
    location: LocationProvider,
    autocomplete: PlaceAutocompleteService,
    viewport: Arc<watch::Sender<Option<CoordinateRegion>>>,
    _completions: mpsc::UnboundedSender<Envelope>,
}

impl DestinationWorkflow {
    /// Builds the workflow and starts its apply loop. Must be called within a tokio runtime;
    /// the input methods may then be called from any thread.
    pub fn new(
        services: MapServices,
        autocomplete: PlaceAutocompleteService,
        location: LocationProvider,
        settings: WorkflowSettings,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(WorkflowState::default());
        let (viewport, _) = watch::channel(None);

        let shared = Arc::new(Shared {
            previews: PreviewLoader::new(services.scenes.clone()),
            services,
            events: EventSender::new(settings.event_capacity),
            settings,
            destinations: Sequencer::new(),
            routes: Sequencer::new(),
            state,
            in_flight: InFlight::new(),
            completions: tx.downgrade(),
            runtime: Handle::current(),
        });

        tokio::spawn(apply::run(shared.clone(), rx));
        watch_permission(Arc::downgrade(&shared), &location);

        Self {
            shared,
            location,
            autocomplete,
            viewport: Arc::new(viewport),
            _completions: tx,
        }
    }

    /// Typed search text changed: refresh suggestions biased to the viewport
    pub fn on_search_text_changed(&self, text: &str) -> Option<RequestId> {
        self.autocomplete.set_query(text, self.search_bias())
    }

    /// The map camera moved. Only the latest region is kept.
    pub fn on_viewport_changed(&self, region: CoordinateRegion) {
        self.viewport.send_replace(Some(region));
        self.autocomplete.set_region(region);
    }

    /// Full-text search. The first place found becomes the destination.
    ///
    /// Blank queries are ignored and return `None`.
    #[instrument(skip(self))]
    pub fn on_free_text_search_submitted(&self, query: &str) -> Option<RequestId> {
        let query = query.trim();
        if query.is_empty() {
            debug!("ignoring blank search");
            return None;
        }

        let id = self.shared.destinations.next();
        info!(request = %id, query, "place search submitted");

        let geocoder = self.shared.services.geocoder.clone();
        let bias = self.shared.settings.default_region;
        let text = query.to_string();
        let query = query.to_string();
        self.shared.dispatch(
            async move { geocoder.search(&text, bias).await },
            move |result| Completion::Search { id, query, result },
        );
        Some(id)
    }

    /// A suggestion was tapped: hide the list and resolve the candidate
    #[instrument(skip(self, candidate), fields(title = %candidate.title))]
    pub fn on_suggestion_chosen(&self, candidate: CompletionCandidate) -> RequestId {
        self.autocomplete.dismiss();

        let id = self.shared.destinations.next();
        info!(request = %id, "resolving suggestion");

        let geocoder = self.shared.services.geocoder.clone();
        let bias = self.search_bias();
        let chosen = candidate.clone();
        self.shared.dispatch(
            async move { geocoder.resolve(&chosen, bias).await },
            move |result| Completion::Suggestion {
                id,
                candidate,
                result,
            },
        );
        id
    }

    /// Drops a pin. Applied immediately, so any search initiated earlier loses.
    #[instrument(skip(self))]
    pub fn on_map_long_press(&self, coordinate: Coordinate) -> RequestId {
        self.set_destination(coordinate, DestinationSource::Pin, true)
    }

    /// Manual override of the destination; no preview is requested
    #[instrument(skip(self))]
    pub fn override_destination(&self, coordinate: Coordinate) -> RequestId {
        self.set_destination(coordinate, DestinationSource::Override, false)
    }

    /// Computes a driving route from the current location to the destination.
    ///
    /// Fails with `MissingPrerequisite` (and a notice) when either end is unknown; no
    /// state changes in that case.
    #[instrument(skip(self))]
    pub fn request_route(&self) -> Result<RequestId, WorkflowError> {
        let Some(origin) = self.location.current() else {
            return Err(self.reject(WorkflowError::MissingPrerequisite(
                Prerequisite::Location,
            )));
        };
        let destination = self
            .shared
            .state
            .borrow()
            .destination
            .as_ref()
            .map(|d| d.coordinate);
        let Some(destination) = destination else {
            return Err(self.reject(WorkflowError::MissingPrerequisite(
                Prerequisite::Destination,
            )));
        };

        let id = self.shared.routes.next();
        info!(request = %id, %origin, %destination, "requesting route");

        let router = self.shared.services.router.clone();
        let transport = self.shared.settings.transport;
        self.shared.dispatch(
            async move { router.route(origin, destination, transport).await },
            move |result| Completion::Route {
                id,
                origin,
                destination,
                result,
            },
        );
        Ok(id)
    }

    /// Removes the route and ignores any route still being computed
    pub fn clear_route(&self) {
        self.shared.routes.invalidate();
        let cleared = self.shared.state.send_if_modified(|s| s.route.take().is_some());
        if cleared {
            self.shared.events.send(Event::RouteCleared);
        }
    }

    /// Fetches a street-level preview for `coordinate`
    pub fn request_preview(&self, coordinate: Coordinate) -> RequestId {
        self.shared.request_preview(coordinate)
    }

    pub fn state(&self) -> WorkflowState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkflowState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    pub fn suggestions(&self) -> Suggestions {
        self.autocomplete.current()
    }

    pub fn viewport(&self) -> Option<CoordinateRegion> {
        *self.viewport.borrow()
    }

    pub fn location(&self) -> &LocationProvider {
        &self.location
    }

    pub fn autocomplete(&self) -> &PlaceAutocompleteService {
        &self.autocomplete
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.shared.settings
    }

    /// Resolves once every initiated request has been applied or discarded
    pub async fn idle(&self) {
        self.shared.in_flight.idle().await;
        self.autocomplete.idle().await;
    }

    fn set_destination(
        &self,
        coordinate: Coordinate,
        source: DestinationSource,
        preview: bool,
    ) -> RequestId {
        let id = self.shared.destinations.next();
        info!(request = %id, %coordinate, %source, "destination set directly");
        self.shared.apply_destination(
            Destination {
                coordinate,
                source,
                place: None,
                request_id: id,
            },
            None,
            preview,
        );
        id
    }

    fn search_bias(&self) -> CoordinateRegion {
        self.viewport().unwrap_or(self.shared.settings.default_region)
    }

    fn reject(&self, err: WorkflowError) -> WorkflowError {
        self.shared.notify(&err);
        err
    }
}

/// Raises one `PermissionDenied` notice if location access is refused
fn watch_permission(shared: Weak<Shared>, location: &LocationProvider) {
    let mut permission = location.permission_updates();
    tokio::spawn(async move {
        let denied = permission
            .wait_for(|p| *p == PermissionStatus::Denied)
            .await
            .is_ok();
        if denied {
            if let Some(shared) = shared.upgrade() {
                shared.notify(&WorkflowError::PermissionDenied);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NoticeKind;
    use crate::models::{PlaceResult, Route, Scene};
    use crate::services::autocomplete::MockCompletionProvider;
    use crate::services::geocoding::MockGeocoder;
    use crate::services::look_around::MockSceneProvider;
    use crate::services::routing::MockRouteProvider;
    use crate::services::AutocompleteSettings;
    use assert_matches::assert_matches;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn workflow(
        geocoder: MockGeocoder,
        router: MockRouteProvider,
        scenes: MockSceneProvider,
        location: LocationProvider,
    ) -> DestinationWorkflow {
        let mut completer = MockCompletionProvider::new();
        completer.expect_complete().returning(|_, _| Ok(Vec::new()));
        DestinationWorkflow::new(
            MapServices::new(Arc::new(geocoder), Arc::new(router), Arc::new(scenes)),
            PlaceAutocompleteService::new(Arc::new(completer), AutocompleteSettings::default()),
            location,
            WorkflowSettings::default(),
        )
    }

    #[tokio::test]
    async fn search_is_biased_to_the_default_region() {
        let expected_bias = WorkflowSettings::default().default_region;
        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_search()
            .withf(move |text, bias| text == "Heritage Park" && *bias == expected_bias)
            .times(1)
            .returning(|text, _| Ok(vec![PlaceResult::new(text, c(50.982, -114.105))]));
        let mut scenes = MockSceneProvider::new();
        scenes.expect_scene().times(0);

        let workflow = workflow(
            geocoder,
            MockRouteProvider::new(),
            scenes,
            LocationProvider::pending(),
        );
        workflow.on_viewport_changed(CoordinateRegion::around(c(40.0, -100.0), 1.0));
        workflow.on_free_text_search_submitted("Heritage Park");
        workflow.idle().await;

        let destination = workflow.state().destination.unwrap();
        assert_eq!(destination.source, DestinationSource::Search);
        assert_eq!(destination.place.unwrap().name, "Heritage Park");
    }

    #[tokio::test]
    async fn unresolvable_suggestion_changes_nothing() {
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_resolve().returning(|_, _| Ok(Vec::new()));
        let mut scenes = MockSceneProvider::new();
        scenes.expect_scene().times(0);

        let workflow = workflow(
            geocoder,
            MockRouteProvider::new(),
            scenes,
            LocationProvider::pending(),
        );
        let mut events = workflow.subscribe_events();
        let id = workflow.on_suggestion_chosen(CompletionCandidate::new("Nowhere", ""));
        workflow.idle().await;

        assert!(workflow.state().destination.is_none());
        assert_matches!(
            events.try_recv(),
            Ok(Event::NoResults { request_id, .. }) if request_id == id
        );
    }

    #[tokio::test]
    async fn route_failure_keeps_the_previous_route() {
        let origin = c(51.078, -114.132);
        let destination = c(51.046, -114.073);
        let mut router = MockRouteProvider::new();
        let mut calls = 0;
        router.expect_route().times(2).returning(move |from, to, transport| {
            calls += 1;
            if calls == 1 {
                Ok(Route {
                    polyline: vec![from, to],
                    distance_meters: from.distance_to(&to),
                    expected_travel_time: Duration::from_secs(600),
                    transport,
                    name: None,
                })
            } else {
                Err(WorkflowError::service("router unavailable"))
            }
        });

        let workflow = workflow(
            MockGeocoder::new(),
            router,
            MockSceneProvider::new(),
            LocationProvider::fixed(origin),
        );
        workflow.override_destination(destination);
        let first = workflow.request_route().unwrap();
        workflow.idle().await;
        workflow.request_route().unwrap();
        workflow.idle().await;

        let state = workflow.state();
        assert_eq!(state.route.unwrap().request_id, first);
        assert_eq!(
            state.last_notice.map(|n| n.kind),
            Some(NoticeKind::ServiceError)
        );
    }

    #[tokio::test]
    async fn pin_requests_preview_for_its_coordinate() {
        let pin = c(51.0539, -114.079);
        let mut scenes = MockSceneProvider::new();
        scenes
            .expect_scene()
            .withf(move |at| *at == pin)
            .times(1)
            .returning(|at| {
                Ok(Scene {
                    id: "scene-1".into(),
                    coordinate: at,
                })
            });

        let workflow = workflow(
            MockGeocoder::new(),
            MockRouteProvider::new(),
            scenes,
            LocationProvider::pending(),
        );
        let id = workflow.on_map_long_press(pin);
        assert_eq!(workflow.state().destination.unwrap().request_id, id);
        workflow.idle().await;

        assert_eq!(workflow.state().preview.unwrap().id, "scene-1");
    }

    #[tokio::test]
    async fn previews_are_ordered_like_their_destinations() {
        let suggested = c(51.0458, -114.0575);
        let pin = c(51.0539, -114.079);
        let mut scenes = MockSceneProvider::new();
        scenes.expect_scene().times(2).returning(|at| {
            Ok(Scene {
                id: format!("scene-{at}"),
                coordinate: at,
            })
        });

        let workflow = workflow(
            MockGeocoder::new(),
            MockRouteProvider::new(),
            scenes,
            LocationProvider::pending(),
        );
        let resolved = |request_id| Destination {
            coordinate: suggested,
            source: DestinationSource::Suggestion,
            place: None,
            request_id,
        };

        let suggestion = workflow.shared.destinations.next();
        assert!(workflow
            .shared
            .apply_destination(resolved(suggestion), None, true));
        let pin_id = workflow.on_map_long_press(pin);

        // superseded by the pin: neither applied nor previewed
        assert!(!workflow
            .shared
            .apply_destination(resolved(suggestion), None, true));
        workflow.idle().await;

        let state = workflow.state();
        assert_eq!(state.destination.unwrap().request_id, pin_id);
        assert_eq!(state.preview.unwrap().coordinate, pin);
    }
}
