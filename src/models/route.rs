use super::coordinate::Coordinate;
use super::region::CoordinateRegion;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

/// Transport mode for route computation. Only driving is requested by the workflow.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportType {
    #[default]
    Driving,
    Walking,
    Transit,
}

/// A computed route: polyline plus metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub polyline: Vec<Coordinate>,
    pub distance_meters: f64,
    pub expected_travel_time: Duration,
    pub transport: TransportType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Route {
    /// Region framing the whole polyline, or `None` for an empty polyline
    pub fn bounding_region(&self, padding_factor: f64) -> Option<CoordinateRegion> {
        CoordinateRegion::bounding(&self.polyline, padding_factor)
    }
}
