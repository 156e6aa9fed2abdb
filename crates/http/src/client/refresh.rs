//! Single-flight coordination of access token refreshes
//!
//! When several authenticated calls are rejected at once, only the first one
//! starts a refresh; the others join it and observe the same outcome. The
//! slot is emptied as soon as that refresh finishes, so the next rejection
//! starts a fresh attempt.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Why a refresh produced no new access token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The refresh endpoint rejected the refresh credential (HTTP 401)
    #[error("refresh credential expired or invalid")]
    Rejected,

    /// Any other failure: transport, unexpected status, malformed body
    #[error("token refresh failed: {0}")]
    Failed(String),
}

/// New access token on success
pub type RefreshResult = Result<String, RefreshError>;

/// Handle to an in-flight refresh; every clone resolves to the same result
pub type RefreshHandle = Shared<BoxFuture<'static, RefreshResult>>;

/// Shared refresh state
///
/// Cloning yields another handle to the same state, so one coordinator can
/// be injected into several clients.
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    in_flight: Arc<Mutex<Option<RefreshHandle>>>,
    started: Arc<AtomicU64>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the refresh in flight, or start one with `start`
    ///
    /// `start` is only called when no refresh is running. The returned
    /// future is lazy; it makes progress when any holder awaits it.
    pub fn begin_or_join<F, Fut>(&self, start: F) -> RefreshHandle
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshResult> + Send + 'static,
    {
        let mut slot = lock(&self.in_flight);

        if let Some(handle) = slot.as_ref() {
            debug!("joining in-flight token refresh");
            return handle.clone();
        }

        let attempt = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(attempt, "starting token refresh");

        let refresh = start();
        let in_flight = Arc::clone(&self.in_flight);
        let handle = async move {
            let result = refresh.await;
            *lock(&in_flight) = None;
            result
        }
        .boxed()
        .shared();

        *slot = Some(handle.clone());
        handle
    }

    /// Whether a refresh is currently pending
    pub fn is_in_progress(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    /// Number of refreshes started over the coordinator's lifetime
    pub fn refresh_count(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("in_progress", &self.is_in_progress())
            .field("refresh_count", &self.refresh_count())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
