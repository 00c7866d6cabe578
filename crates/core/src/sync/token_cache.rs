//! Access-token cache with single-flight refresh
//!
//! Holds at most one credential. A credential is served until
//! `expires_at - refresh_margin`; after that the next caller refreshes it
//! through the [`CredentialIssuer`]. Callers that arrive while a refresh is
//! in flight wait for it and share its result, so N concurrent callers cost
//! at most one request to the authentication endpoint.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use contentsync_domain::{ContentSyncError, Credential, Result};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ports::CredentialIssuer;
use crate::time::{Clock, SystemClock};

#[derive(Default)]
struct CacheState {
    cached: Option<Credential>,
    /// Bumped every time a refresh completes, successfully or not.
    generation: u64,
    last_outcome: Option<Result<Credential>>,
}

/// Process-wide access-token cache
pub struct TokenCache<C: Clock = SystemClock> {
    issuer: Arc<dyn CredentialIssuer>,
    clock: C,
    refresh_margin: Duration,
    state: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
}

impl TokenCache<SystemClock> {
    /// Cache backed by the system clock. Tokens within `refresh_margin` of
    /// expiry are treated as stale.
    pub fn new(issuer: Arc<dyn CredentialIssuer>, refresh_margin: StdDuration) -> Self {
        Self::with_clock(issuer, refresh_margin, SystemClock)
    }
}

impl<C: Clock> TokenCache<C> {
    /// Cache with an injected clock, for tests.
    pub fn with_clock(
        issuer: Arc<dyn CredentialIssuer>,
        refresh_margin: StdDuration,
        clock: C,
    ) -> Self {
        let refresh_margin =
            Duration::from_std(refresh_margin).unwrap_or_else(|_| Duration::days(36_500));
        Self {
            issuer,
            clock,
            refresh_margin,
            state: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return a usable credential, refreshing it when missing or stale.
    ///
    /// A refreshed credential whose lifetime does not exceed the refresh
    /// margin is returned but not cached.
    #[instrument(skip_all)]
    pub async fn get_or_refresh(&self, cancel: &CancellationToken) -> Result<Credential> {
        let observed = {
            let state = self.state.read().await;
            if let Some(credential) = self.fresh(&state) {
                debug!(expires_at = %credential.expires_at, "Serving cached access token");
                return Ok(credential);
            }
            state.generation
        };

        let _refresh = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ContentSyncError::RunCancelled),
            guard = self.refresh_lock.lock() => guard,
        };

        {
            let state = self.state.read().await;
            if state.generation != observed {
                if let Some(outcome) = state.last_outcome.clone() {
                    debug!("Reusing result of concurrent token refresh");
                    return outcome;
                }
            }
            if let Some(credential) = self.fresh(&state) {
                return Ok(credential);
            }
        }

        let issued = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ContentSyncError::RunCancelled),
            issued = self.issuer.issue() => issued,
        };
        let outcome = issued.and_then(|grant| grant.into_credential(self.clock.now()));

        let mut state = self.state.write().await;
        state.generation = state.generation.wrapping_add(1);
        match &outcome {
            Ok(credential) => {
                let lifetime = credential.usable_lifetime(self.clock.now(), self.refresh_margin);
                if lifetime > Duration::zero() {
                    info!(
                        expires_at = %credential.expires_at,
                        cached_for_secs = lifetime.num_seconds(),
                        "Access token refreshed"
                    );
                    state.cached = Some(credential.clone());
                } else {
                    warn!(
                        expires_at = %credential.expires_at,
                        "Access token expires within the refresh margin, not caching it"
                    );
                    state.cached = None;
                }
            }
            Err(err) => warn!(error = %err, "Access token refresh failed"),
        }
        state.last_outcome = Some(outcome.clone());

        outcome
    }

    /// Install a credential obtained elsewhere.
    pub async fn seed(&self, credential: Credential) {
        self.state.write().await.cached = Some(credential);
    }

    /// Drop the cached credential so the next caller refreshes.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.cached = None;
        state.last_outcome = None;
    }

    /// The cached credential, fresh or not.
    pub async fn current(&self) -> Option<Credential> {
        self.state.read().await.cached.clone()
    }

    /// How long before expiry a cached token stops being served.
    pub fn refresh_margin(&self) -> Duration {
        self.refresh_margin
    }

    fn fresh(&self, state: &CacheState) -> Option<Credential> {
        state
            .cached
            .as_ref()
            .filter(|credential| credential.is_fresh(self.clock.now(), self.refresh_margin))
            .cloned()
    }
}
