use crate::errors::WorkflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// A validated WGS84 latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting values outside [-90, 90] / [-180, 180]
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, WorkflowError> {
        if is_valid(latitude, longitude) {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(WorkflowError::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    /// For compile-time constants already known to be in range
    pub(crate) const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance in meters (haversine)
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Linear interpolation towards `other`; `t` outside [0, 1] returns the nearer endpoint
    pub fn lerp(&self, other: &Coordinate, t: f64) -> Coordinate {
        if t <= 0.0 {
            return *self;
        }
        if t >= 1.0 {
            return *other;
        }
        Coordinate {
            latitude: self.latitude + (other.latitude - self.latitude) * t,
            longitude: self.longitude + (other.longitude - self.longitude) * t,
        }
    }
}

fn is_valid(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = WorkflowError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        RawCoordinate {
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Parses `"lat,lon"`
impl FromStr for Coordinate {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s.split_once(',').ok_or_else(|| {
            WorkflowError::MalformedCoordinate(format!("expected 'lat,lon', got '{}'", s))
        })?;
        let latitude = lat.trim().parse::<f64>().map_err(|e| {
            WorkflowError::MalformedCoordinate(format!("bad latitude '{}': {}", lat.trim(), e))
        })?;
        let longitude = lon.trim().parse::<f64>().map_err(|e| {
            WorkflowError::MalformedCoordinate(format!("bad longitude '{}': {}", lon.trim(), e))
        })?;
        Coordinate::new(latitude, longitude)
    }
}
