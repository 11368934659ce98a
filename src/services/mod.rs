//! External collaborators and the components wrapping them.
//!
//! Providers are opaque services reached through async traits. The autocomplete and
//! location components add the sequencing and storage the workflow relies on.

pub mod autocomplete;
pub mod geocoding;
pub mod location;
pub mod look_around;
pub mod routing;
pub mod simulated;

use crate::errors::WorkflowError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use autocomplete::{
    AutocompleteSettings, CompletionProvider, PlaceAutocompleteService, Suggestions,
};
pub use geocoding::Geocoder;
pub use location::{LocationProvider, LocationSource, PermissionStatus};
pub use look_around::SceneProvider;
pub use routing::RouteProvider;

/// The set of one-shot providers the workflow calls
#[derive(Clone)]
pub struct MapServices {
    pub geocoder: Arc<dyn Geocoder>,
    pub router: Arc<dyn RouteProvider>,
    pub scenes: Arc<dyn SceneProvider>,
}

impl MapServices {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RouteProvider>,
        scenes: Arc<dyn SceneProvider>,
    ) -> Self {
        Self {
            geocoder,
            router,
            scenes,
        }
    }
}

/// Runs a provider call under the request timeout
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, WorkflowError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(WorkflowError::Timeout(limit)),
    }
}
