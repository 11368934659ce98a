use crate::errors::WorkflowError;
use crate::models::{Coordinate, Route, TransportType};
use async_trait::async_trait;

/// One-shot route computation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        transport: TransportType,
    ) -> Result<Route, WorkflowError>;
}
