use std::sync::Arc;

use super::sequence::{RequestId, Sequencer};
use crate::errors::WorkflowError;
use crate::models::{Coordinate, Scene};
use crate::services::SceneProvider;

/// Street-level preview requests. Only the newest request may replace the shown scene.
pub struct PreviewLoader {
    scenes: Arc<dyn SceneProvider>,
    sequencer: Sequencer,
}

impl PreviewLoader {
    pub fn new(scenes: Arc<dyn SceneProvider>) -> Self {
        Self {
            scenes,
            sequencer: Sequencer::new(),
        }
    }

    /// Starts a request: returns its id and the fetch to run
    pub fn begin(
        &self,
        coordinate: Coordinate,
    ) -> (
        RequestId,
        impl std::future::Future<Output = Result<Scene, WorkflowError>> + Send + 'static,
    ) {
        let id = self.sequencer.next();
        let scenes = self.scenes.clone();
        (id, async move { scenes.scene(coordinate).await })
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.sequencer.is_current(id)
    }
}
