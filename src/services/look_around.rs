use crate::errors::WorkflowError;
use crate::models::{Coordinate, Scene};
use async_trait::async_trait;

/// Street-level imagery lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SceneProvider: Send + Sync {
    async fn scene(&self, coordinate: Coordinate) -> Result<Scene, WorkflowError>;
}
