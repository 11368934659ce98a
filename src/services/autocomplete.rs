use crate::errors::{Notice, WorkflowError};
use crate::models::{CompletionCandidate, CoordinateRegion};
use crate::services::bounded;
use crate::workflow::sequence::{RequestId, Sequencer};
use crate::workflow::tracker::InFlight;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, instrument, warn};

/// Produces ranked completion candidates for partial query text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        text: &str,
        bias: CoordinateRegion,
    ) -> Result<Vec<CompletionCandidate>, WorkflowError>;
}

/// The suggestion list as the UI should show it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Suggestions {
    pub query: String,
    pub candidates: Vec<CompletionCandidate>,
    pub visible: bool,
    pub request_id: Option<RequestId>,
}

#[derive(Debug, Clone, Copy)]
pub struct AutocompleteSettings {
    /// Wait before calling the provider; zero disables debouncing
    pub debounce: Duration,
    pub timeout: Duration,
}

impl Default for AutocompleteSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default)]
struct ActiveQuery {
    text: String,
}

struct Inner {
    provider: Arc<dyn CompletionProvider>,
    settings: AutocompleteSettings,
    sequencer: Sequencer,
    query: Mutex<ActiveQuery>,
    results: watch::Sender<Suggestions>,
    errors: broadcast::Sender<Notice>,
    in_flight: InFlight,
    runtime: Handle,
}

/// Autocomplete session: one active query, newest request wins
#[derive(Clone)]
pub struct PlaceAutocompleteService {
    inner: Arc<Inner>,
}

impl PlaceAutocompleteService {
    /// Must be called within a tokio runtime. Requests run on that runtime even when
    /// queries are set from other threads.
    pub fn new(provider: Arc<dyn CompletionProvider>, settings: AutocompleteSettings) -> Self {
        let (results, _) = watch::channel(Suggestions::default());
        let (errors, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                provider,
                settings,
                sequencer: Sequencer::new(),
                query: Mutex::new(ActiveQuery::default()),
                results,
                errors,
                in_flight: InFlight::new(),
                runtime: Handle::current(),
            }),
        }
    }

    /// Replaces the active query. Blank text hides the list without issuing a request.
    ///
    /// Returns the id of the request issued, if any.
    #[instrument(skip(self, region))]
    pub fn set_query(&self, text: &str, region: CoordinateRegion) -> Option<RequestId> {
        let id = {
            let mut query = lock(&self.inner.query);
            query.text = text.trim().to_string();
            self.inner.sequencer.next()
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.hide();
            return None;
        }
        self.issue(id, trimmed.to_string(), region);
        Some(id)
    }

    /// Updates the bias region; re-queries only when a query is active
    pub fn set_region(&self, region: CoordinateRegion) -> Option<RequestId> {
        let (id, text) = {
            let query = lock(&self.inner.query);
            if query.text.is_empty() {
                return None;
            }
            (self.inner.sequencer.next(), query.text.clone())
        };
        debug!(request = %id, "viewport changed, re-issuing autocomplete query");
        self.issue(id, text, region);
        Some(id)
    }

    /// Hides the list, forgets the query and invalidates in-flight requests
    pub fn dismiss(&self) {
        {
            let mut query = lock(&self.inner.query);
            query.text.clear();
            self.inner.sequencer.invalidate();
        }
        self.hide();
    }

    pub fn current(&self) -> Suggestions {
        self.inner.results.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Suggestions> {
        self.inner.results.subscribe()
    }

    /// Errors of current (non-stale) requests
    pub fn errors(&self) -> broadcast::Receiver<Notice> {
        self.inner.errors.subscribe()
    }

    /// Resolves once every issued request has finished or been dropped
    pub async fn idle(&self) {
        self.inner.in_flight.idle().await;
    }

    fn hide(&self) {
        self.inner.results.send_modify(|s| *s = Suggestions::default());
    }

    fn issue(&self, id: RequestId, text: String, region: CoordinateRegion) {
        let guard = self.inner.in_flight.begin();
        let inner = self.inner.clone();

        self.inner.runtime.spawn(async move {
            let _guard = guard;
            let settings = inner.settings;

            if !settings.debounce.is_zero() {
                tokio::time::sleep(settings.debounce).await;
                if !inner.sequencer.is_current(id) {
                    debug!(request = %id, "autocomplete superseded during debounce");
                    return;
                }
            }

            let result = bounded(settings.timeout, inner.provider.complete(&text, region)).await;
            inner.publish(id, text, result);
        });
    }
}

impl Inner {
    fn publish(
        &self,
        id: RequestId,
        text: String,
        result: Result<Vec<CompletionCandidate>, WorkflowError>,
    ) {
        match result {
            Ok(candidates) => {
                let count = candidates.len();
                let applied = self.results.send_if_modified(|s| {
                    if !self.sequencer.is_current(id) {
                        return false;
                    }
                    *s = Suggestions {
                        query: text,
                        visible: !candidates.is_empty(),
                        candidates,
                        request_id: Some(id),
                    };
                    true
                });
                if applied {
                    debug!(request = %id, count, "autocomplete results applied");
                } else {
                    debug!(error = %WorkflowError::Stale(id), "autocomplete results discarded");
                }
            }
            Err(err) => {
                if !self.sequencer.is_current(id) {
                    debug!(request = %id, error = %err, "stale autocomplete failure ignored");
                    return;
                }
                warn!(request = %id, error = %err, "autocomplete request failed");
                if let Some(notice) = err.to_notice() {
                    let _ = self.errors.send(notice);
                }
            }
        }
    }
}

fn lock(query: &Mutex<ActiveQuery>) -> std::sync::MutexGuard<'_, ActiveQuery> {
    match query.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
