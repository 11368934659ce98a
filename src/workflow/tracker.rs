use std::sync::Arc;
use tokio::sync::watch;

/// Counts requests that have been initiated but not yet applied or discarded.
///
/// Each request holds an [`InFlightGuard`]; the count drops when the guard does.
#[derive(Debug, Clone)]
pub struct InFlight {
    count: Arc<watch::Sender<usize>>,
}

impl Default for InFlight {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            count: Arc::new(tx),
        }
    }
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> InFlightGuard {
        self.count.send_modify(|n| *n += 1);
        InFlightGuard {
            count: self.count.clone(),
        }
    }

    pub fn pending(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once nothing is in flight
    pub async fn idle(&self) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
