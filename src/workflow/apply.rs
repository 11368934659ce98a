use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::state::{Destination, DestinationSource, RouteState};
use super::tracker::InFlightGuard;
use super::{RequestId, Shared};
use crate::errors::WorkflowError;
use crate::events::Event;
use crate::models::{CompletionCandidate, Coordinate, CoordinateRegion, PlaceResult, Route, Scene};

/// A finished provider call, tagged with the id it was issued under
pub(crate) enum Completion {
    Search {
        id: RequestId,
        query: String,
        result: Result<Vec<PlaceResult>, WorkflowError>,
    },
    Suggestion {
        id: RequestId,
        candidate: CompletionCandidate,
        result: Result<Vec<PlaceResult>, WorkflowError>,
    },
    Route {
        id: RequestId,
        origin: Coordinate,
        destination: Coordinate,
        result: Result<Route, WorkflowError>,
    },
    Preview {
        id: RequestId,
        coordinate: Coordinate,
        result: Result<Scene, WorkflowError>,
    },
}

pub(crate) struct Envelope {
    pub(crate) completion: Completion,
    /// Released once the completion has been applied or discarded
    pub(crate) guard: InFlightGuard,
}

/// The apply loop: the only consumer of completions
pub(super) async fn run(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    debug!("apply loop started");
    while let Some(Envelope { completion, guard }) = rx.recv().await {
        shared.apply(completion);
        drop(guard);
    }
    debug!("apply loop stopped");
}

impl Shared {
    fn apply(&self, completion: Completion) {
        match completion {
            Completion::Search { id, query, result } => match result {
                Ok(places) => match places.into_iter().next() {
                    Some(place) => {
                        let camera =
                            CoordinateRegion::new(place.coordinate, self.settings.default_region.span);
                        self.apply_destination(
                            Destination {
                                coordinate: place.coordinate,
                                source: DestinationSource::Search,
                                place: Some(place),
                                request_id: id,
                            },
                            Some(camera),
                            false,
                        );
                    }
                    None => self.no_results(id, query),
                },
                Err(err) => self.fail(id, self.destinations.is_current(id), err),
            },

            Completion::Suggestion {
                id,
                candidate,
                result,
            } => match result {
                Ok(places) => match places.into_iter().next() {
                    Some(place) => {
                        let coordinate = place.coordinate;
                        let camera =
                            CoordinateRegion::around(coordinate, self.settings.suggestion_span_degrees);
                        self.apply_destination(
                            Destination {
                                coordinate,
                                source: DestinationSource::Suggestion,
                                place: Some(place),
                                request_id: id,
                            },
                            Some(camera),
                            true,
                        );
                    }
                    None => self.no_results(id, candidate.title),
                },
                Err(err) => self.fail(id, self.destinations.is_current(id), err),
            },

            Completion::Route {
                id,
                origin,
                destination,
                result,
            } => match result {
                Ok(route) => {
                    self.apply_route(RouteState {
                        route,
                        origin,
                        destination,
                        request_id: id,
                    });
                }
                Err(err) => self.fail(id, self.routes.is_current(id), err),
            },

            Completion::Preview {
                id,
                coordinate,
                result,
            } => match result {
                Ok(scene) => {
                    self.apply_preview(id, scene);
                }
                Err(err) => {
                    debug!(request = %id, %coordinate, "preview failed");
                    self.fail(id, self.previews.is_current(id), err);
                }
            },
        }
    }

    /// Replaces the destination if `destination.request_id` is still the newest, and
    /// optionally requests a preview for it.
    ///
    /// The preview id is taken under the state lock, so previews are ordered like the
    /// destinations they belong to.
    pub(super) fn apply_destination(
        &self,
        destination: Destination,
        camera: Option<CoordinateRegion>,
        preview: bool,
    ) -> bool {
        let id = destination.request_id;
        let coordinate = destination.coordinate;
        let published = destination.clone();
        let mut fetch = None;
        let applied = self.state.send_if_modified(|s| {
            if !self.destinations.is_current(id) {
                return false;
            }
            s.destination = Some(destination);
            if let Some(region) = camera {
                s.camera = Some(region);
            }
            if preview {
                fetch = Some(self.previews.begin(coordinate));
            }
            true
        });

        if !applied {
            debug!(error = %WorkflowError::Stale(id), "destination discarded");
            return false;
        }

        info!(
            request = %id,
            coordinate = %published.coordinate,
            source = %published.source,
            "destination applied"
        );
        self.events.send(Event::DestinationChanged(published));
        if let Some(region) = camera {
            self.events.send(Event::CameraMoved(region));
        }
        if let Some((preview_id, fetch)) = fetch {
            self.dispatch_preview(preview_id, coordinate, fetch);
        }
        true
    }

    fn apply_route(&self, route: RouteState) -> bool {
        let id = route.request_id;
        let camera = route.route.bounding_region(self.settings.route_padding_factor);
        let published = route.clone();
        let applied = self.state.send_if_modified(|s| {
            if !self.routes.is_current(id) {
                return false;
            }
            s.route = Some(route);
            if let Some(region) = camera {
                s.camera = Some(region);
            }
            true
        });

        if !applied {
            debug!(error = %WorkflowError::Stale(id), "route discarded");
            return false;
        }

        info!(
            request = %id,
            distance_m = published.route.distance_meters,
            eta_s = published.route.expected_travel_time.as_secs(),
            "route applied"
        );
        self.events.send(Event::RouteUpdated(published));
        if let Some(region) = camera {
            self.events.send(Event::CameraMoved(region));
        }
        true
    }

    fn apply_preview(&self, id: RequestId, scene: Scene) -> bool {
        let published = scene.clone();
        let applied = self.state.send_if_modified(|s| {
            if !self.previews.is_current(id) {
                return false;
            }
            s.preview = Some(scene);
            true
        });

        if applied {
            debug!(request = %id, scene = %published.id, "preview applied");
            self.events.send(Event::PreviewUpdated(published));
        } else {
            debug!(error = %WorkflowError::Stale(id), "preview discarded");
        }
        applied
    }

    /// Zero places: state stays as it is and nothing is shown to the user
    fn no_results(&self, id: RequestId, query: String) {
        if !self.destinations.is_current(id) {
            debug!(error = %WorkflowError::Stale(id), "empty result discarded");
            return;
        }
        info!(request = %id, %query, "no places found");
        self.events.send(Event::NoResults {
            request_id: id,
            query,
        });
    }

    fn fail(&self, id: RequestId, current: bool, err: WorkflowError) {
        if current {
            self.notify(&err);
        } else {
            debug!(request = %id, error = %err, "failure of superseded request ignored");
        }
    }
}
