//! Monotonic request sequencing.
//!
//! Every request that can change workflow state takes a [`RequestId`] from a
//! [`Sequencer`] at the moment it is initiated. When its result arrives it is applied
//! only if its id is still the latest one issued; otherwise it is stale and dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sequence number assigned at request initiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues strictly increasing request ids and answers "is this still the latest?"
#[derive(Debug, Default)]
pub struct Sequencer {
    latest: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the next id. Ids start at 1; 0 means "nothing issued yet".
    pub fn next(&self) -> RequestId {
        RequestId(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The highest id issued so far
    pub fn latest(&self) -> RequestId {
        RequestId(self.latest.load(Ordering::Acquire))
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.latest() == id
    }

    /// Invalidates everything in flight without starting a new request
    pub fn invalidate(&self) -> RequestId {
        self.next()
    }
}
