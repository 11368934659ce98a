//! Value types shared by the services and the workflow

pub mod coordinate;
pub mod place;
pub mod region;
pub mod route;
pub mod scene;

pub use coordinate::Coordinate;
pub use place::{CompletionCandidate, PlaceResult};
pub use region::{CoordinateRegion, CoordinateSpan};
pub use route::{Route, TransportType};
pub use scene::Scene;
