//! Anti-forgery ("crumb") token management.
//!
//! Jenkins requires a crumb on state-mutating requests when CSRF protection is
//! enabled. The manager holds at most one crumb in memory, fetches it lazily,
//! and serializes concurrent fetches so racing mutating calls trigger a single
//! request to the crumb issuer.

use crate::error::JenkinsResult;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// A crumb as issued by `/crumbIssuer/api/json`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Crumb {
    /// Header name the crumb must be sent under (usually `Jenkins-Crumb`).
    #[serde(rename = "crumbRequestField")]
    pub field: String,
    #[serde(rename = "crumb")]
    pub value: String,
}

impl fmt::Debug for Crumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crumb")
            .field("field", &self.field)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Outcome of asking the server for a crumb.
#[derive(Debug, Clone)]
pub enum CrumbFetch {
    Issued(Crumb),
    /// The server has no crumb issuer, so mutating calls go out without one.
    NotRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CrumbState {
    Unset,
    Held(Crumb),
    NotRequired,
}

#[derive(Debug)]
pub struct CrumbManager {
    state: Mutex<CrumbState>,
    fetches: AtomicU64,
}

impl CrumbManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CrumbState::Unset),
            fetches: AtomicU64::new(0),
        }
    }

    /// Return the held crumb, fetching one first when none is held.
    ///
    /// The state lock is held across the fetch, so concurrent callers wait for
    /// the in-flight fetch instead of starting their own. A failed fetch leaves
    /// the manager unset.
    pub async fn current_or_fetch<F, Fut>(&self, fetch: F) -> JenkinsResult<Option<Crumb>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = JenkinsResult<CrumbFetch>>,
    {
        let mut state = self.state.lock().await;
        match &*state {
            CrumbState::Held(crumb) => return Ok(Some(crumb.clone())),
            CrumbState::NotRequired => return Ok(None),
            CrumbState::Unset => {}
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        match fetch().await? {
            CrumbFetch::Issued(crumb) => {
                debug!(field = %crumb.field, "Crumb acquired");
                *state = CrumbState::Held(crumb.clone());
                Ok(Some(crumb))
            }
            CrumbFetch::NotRequired => {
                debug!("Crumb issuer not available; mutating calls proceed without a crumb");
                *state = CrumbState::NotRequired;
                Ok(None)
            }
        }
    }

    /// Discard the crumb a rejected call was sent with.
    ///
    /// Only drops the state if it still matches what the caller observed; a
    /// crumb fetched by another caller after the rejection is kept. Returns
    /// whether the state was reset.
    pub async fn invalidate(&self, observed: Option<&Crumb>) -> bool {
        let mut state = self.state.lock().await;
        let stale = match (&*state, observed) {
            (CrumbState::Held(held), Some(seen)) => held == seen,
            (CrumbState::NotRequired, None) => true,
            _ => false,
        };
        if stale {
            debug!("Discarding rejected crumb");
            *state = CrumbState::Unset;
        }
        stale
    }

    /// Forget whatever is held, e.g. after the credentials were rejected.
    pub async fn clear(&self) {
        *self.state.lock().await = CrumbState::Unset;
    }

    pub async fn is_held(&self) -> bool {
        matches!(*self.state.lock().await, CrumbState::Held(_))
    }

    /// Number of fetches started since creation.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for CrumbManager {
    fn default() -> Self {
        Self::new()
    }
}
