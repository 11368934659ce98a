use crate::errors::WorkflowError;
use crate::models::{CompletionCandidate, CoordinateRegion, PlaceResult};
use async_trait::async_trait;

/// Place search and candidate resolution
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Free-text place search biased towards `bias`. May return an empty list.
    async fn search(
        &self,
        text: &str,
        bias: CoordinateRegion,
    ) -> Result<Vec<PlaceResult>, WorkflowError>;

    /// Resolves an autocomplete candidate into places. May return an empty list.
    async fn resolve(
        &self,
        candidate: &CompletionCandidate,
        bias: CoordinateRegion,
    ) -> Result<Vec<PlaceResult>, WorkflowError>;
}
