use super::coordinate::Coordinate;
use serde::{Deserialize, Serialize};

/// Opaque handle to a street-level ("look around") scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub coordinate: Coordinate,
}
