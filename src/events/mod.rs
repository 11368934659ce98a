use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::errors::Notice;
use crate::models::{CoordinateRegion, Scene};
use crate::workflow::sequence::RequestId;
use crate::workflow::state::{Destination, RouteState};

/// Changes the UI layer reacts to
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    DestinationChanged(Destination),
    RouteUpdated(RouteState),
    RouteCleared,
    PreviewUpdated(Scene),
    CameraMoved(CoordinateRegion),
    /// A search or resolution finished with zero places; not shown as a notice
    NoResults {
        request_id: RequestId,
        query: String,
    },
    Notice(Notice),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: broadcast::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender with room for `capacity` unread events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn send(&self, event: Event) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            trace!(?event, "no event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
