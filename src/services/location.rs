use crate::errors::WorkflowError;
use crate::models::Coordinate;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PermissionStatus {
    /// Not asked yet, or the prompt is still open
    Pending,
    Granted,
    Denied,
}

/// Platform location service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Asks the user for location access. Called once per provider.
    async fn request_permission(&self) -> PermissionStatus;

    /// Continuous stream of fixes; only subscribed after permission is granted
    fn subscribe(&self) -> BoxStream<'static, Result<Coordinate, WorkflowError>>;
}

struct LocationInner {
    fix: watch::Sender<Option<Coordinate>>,
    permission: watch::Sender<PermissionStatus>,
}

/// Holds the most recent device position. Last fix wins, no smoothing.
#[derive(Clone)]
pub struct LocationProvider {
    inner: Arc<LocationInner>,
}

impl LocationProvider {
    fn with_state(fix: Option<Coordinate>, permission: PermissionStatus) -> Self {
        let (fix, _) = watch::channel(fix);
        let (permission, _) = watch::channel(permission);
        Self {
            inner: Arc::new(LocationInner { fix, permission }),
        }
    }

    /// Requests permission once and, if granted, follows the source's fix stream
    pub fn start(source: Arc<dyn LocationSource>) -> Self {
        let provider = Self::with_state(None, PermissionStatus::Pending);
        let inner = provider.inner.clone();

        tokio::spawn(async move {
            let status = source.request_permission().await;
            inner.permission.send_replace(status);

            if status != PermissionStatus::Granted {
                warn!(%status, "location permission not granted; current location stays unknown");
                return;
            }

            info!("location permission granted, following updates");
            let mut fixes = source.subscribe();
            while let Some(fix) = fixes.next().await {
                match fix {
                    Ok(coordinate) => {
                        debug!(%coordinate, "location fix");
                        inner.fix.send_replace(Some(coordinate));
                    }
                    Err(err) => warn!(error = %err, "dropping invalid location fix"),
                }
            }
            debug!("location stream ended");
        });

        provider
    }

    /// A provider that never asks for permission and never reports a fix
    pub fn pending() -> Self {
        Self::with_state(None, PermissionStatus::Pending)
    }

    /// A provider pinned to one position
    pub fn fixed(coordinate: Coordinate) -> Self {
        Self::with_state(Some(coordinate), PermissionStatus::Granted)
    }

    /// A provider whose permission was refused
    pub fn unavailable() -> Self {
        Self::with_state(None, PermissionStatus::Denied)
    }

    /// Latest fix, or `None` before the first one (or forever, when denied)
    pub fn current(&self) -> Option<Coordinate> {
        *self.inner.fix.borrow()
    }

    pub fn permission(&self) -> PermissionStatus {
        *self.inner.permission.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Coordinate>> {
        self.inner.fix.subscribe()
    }

    pub fn permission_updates(&self) -> watch::Receiver<PermissionStatus> {
        self.inner.permission.subscribe()
    }

    /// Waits for the first fix. Returns `None` if permission ends up denied.
    pub async fn wait_for_fix(&self) -> Option<Coordinate> {
        if let Some(fix) = self.current() {
            return Some(fix);
        }
        let mut fixes = self.subscribe();
        let mut permission = self.permission_updates();
        tokio::select! {
            fix = fixes.wait_for(|f| f.is_some()) => fix.ok().and_then(|f| *f),
            _ = permission.wait_for(|p| *p == PermissionStatus::Denied) => None,
        }
    }
}
