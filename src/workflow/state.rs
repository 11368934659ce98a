use serde::{Deserialize, Serialize};
use strum::Display;

use super::sequence::RequestId;
use crate::errors::Notice;
use crate::models::{Coordinate, CoordinateRegion, PlaceResult, Route, Scene};

/// Which input set the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DestinationSource {
    Search,
    Suggestion,
    Pin,
    Override,
}

/// The single active route target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destination {
    pub coordinate: Coordinate,
    pub source: DestinationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<PlaceResult>,
    pub request_id: RequestId,
}

/// A computed route with the endpoints it was computed for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteState {
    pub route: Route,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub request_id: RequestId,
}

/// Everything the map screen renders from.
///
/// Only the workflow's apply step writes to it, and each field is replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowState {
    pub destination: Option<Destination>,
    pub route: Option<RouteState>,
    pub camera: Option<CoordinateRegion>,
    pub preview: Option<Scene>,
    pub last_notice: Option<Notice>,
}
