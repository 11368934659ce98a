use super::coordinate::Coordinate;
use serde::{Deserialize, Serialize};

/// Smallest span a framed region may have, in degrees
pub const MIN_SPAN_DEGREES: f64 = 0.002;

/// Angular extent of a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSpan {
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl CoordinateSpan {
    /// Square span of `degrees` on both axes
    pub fn uniform(degrees: f64) -> Self {
        Self {
            latitude_delta: degrees,
            longitude_delta: degrees,
        }
    }
}

/// A visible map extent: center plus span. Used both as the viewport and as a camera target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRegion {
    pub center: Coordinate,
    pub span: CoordinateSpan,
}

impl CoordinateRegion {
    pub fn new(center: Coordinate, span: CoordinateSpan) -> Self {
        Self { center, span }
    }

    pub fn around(center: Coordinate, degrees: f64) -> Self {
        Self::new(center, CoordinateSpan::uniform(degrees))
    }

    /// Region covering every point, each span scaled by `padding_factor`.
    ///
    /// Returns `None` for an empty point set. Spans never drop below [`MIN_SPAN_DEGREES`]
    /// so a degenerate route still frames sensibly.
    pub fn bounding(points: &[Coordinate], padding_factor: f64) -> Option<Self> {
        let first = points.first()?;
        let (mut min_lat, mut max_lat) = (first.latitude(), first.latitude());
        let (mut min_lon, mut max_lon) = (first.longitude(), first.longitude());

        for p in &points[1..] {
            min_lat = min_lat.min(p.latitude());
            max_lat = max_lat.max(p.latitude());
            min_lon = min_lon.min(p.longitude());
            max_lon = max_lon.max(p.longitude());
        }

        let padding = if padding_factor.is_finite() && padding_factor >= 1.0 {
            padding_factor
        } else {
            1.0
        };

        let center = Coordinate::new((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0).ok()?;
        let span = CoordinateSpan {
            latitude_delta: ((max_lat - min_lat) * padding).clamp(MIN_SPAN_DEGREES, 180.0),
            longitude_delta: ((max_lon - min_lon) * padding).clamp(MIN_SPAN_DEGREES, 360.0),
        };
        Some(Self { center, span })
    }

    /// Whether `point` falls inside this region
    pub fn contains(&self, point: &Coordinate) -> bool {
        let half_lat = self.span.latitude_delta / 2.0;
        let half_lon = self.span.longitude_delta / 2.0;
        (point.latitude() - self.center.latitude()).abs() <= half_lat
            && (point.longitude() - self.center.longitude()).abs() <= half_lon
    }
}
