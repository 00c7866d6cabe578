//! Access credentials issued by the authentication endpoint.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ContentSyncError, Result};

/// Token endpoint success payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenGrant {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,
    /// Base URL for REST calls made with this token.
    pub rest_instance_url: String,
}

impl AccessTokenGrant {
    /// Turn the grant into a credential anchored at `issued_at`.
    ///
    /// # Errors
    /// Returns `ContentSyncError::Decode` when `expires_in` puts the expiry
    /// outside the representable date range.
    pub fn into_credential(self, issued_at: DateTime<Utc>) -> Result<Credential> {
        let expires_at = Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                ContentSyncError::Decode(format!("expires_in out of range: {}", self.expires_in))
            })?;

        Ok(Credential {
            access_token: self.access_token,
            rest_instance_url: self.rest_instance_url,
            expires_at,
        })
    }
}

impl fmt::Debug for AccessTokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("rest_instance_url", &self.rest_instance_url)
            .finish()
    }
}

/// Bearer token plus the REST base URL it authorizes.
///
/// Immutable once issued; the token cache replaces it wholesale on refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Bearer token sent on page requests.
    pub access_token: String,
    /// REST base URL the token is valid for.
    pub rest_instance_url: String,
    /// Server-reported expiry, before any refresh margin.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Assemble a credential directly, mostly for tests and fakes.
    pub fn new(
        access_token: impl Into<String>,
        rest_instance_url: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            rest_instance_url: rest_instance_url.into(),
            expires_at,
        }
    }

    /// Time left before the credential should stop being served, i.e. before
    /// `expires_at - margin`. Zero or negative once that point has passed.
    pub fn usable_lifetime(&self, now: DateTime<Utc>, margin: Duration) -> Duration {
        self.expires_at
            .checked_sub_signed(margin)
            .map_or_else(Duration::zero, |stale_at| stale_at - now)
    }

    /// Whether the credential can still be served at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.usable_lifetime(now, margin) > Duration::zero()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("rest_instance_url", &self.rest_instance_url)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
