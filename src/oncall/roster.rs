//! Process-wide cache of the current on-call roster.
//!
//! The cache holds an `Arc` to an immutable [`OnCallRoster`]. Readers clone
//! the `Arc` and keep a consistent snapshot for as long as they need it; a
//! refresh builds a complete new roster off to the side and swaps the pointer
//! in one write. No reader ever sees a half-built roster.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::models::oncall::OnCallRoster;

/// Copy-and-swap holder for the latest roster snapshot.
#[derive(Debug, Clone)]
pub struct RosterCache {
    current: Arc<RwLock<Arc<OnCallRoster>>>,
}

impl RosterCache {
    /// An empty cache stamped with `created_at`.
    #[must_use]
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(OnCallRoster::empty(created_at)))),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<OnCallRoster> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the snapshot wholesale, returning the previous one.
    pub fn replace(&self, roster: impl Into<Arc<OnCallRoster>>) -> Arc<OnCallRoster> {
        let next = roster.into();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Whether the current snapshot holds no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
