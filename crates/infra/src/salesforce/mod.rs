//! Marketing Cloud REST adapters
//!
//! [`MarketingCloudAuthClient`] implements the token endpoint port and
//! [`AssetQueryClient`] the asset query port. Both share one [`HttpClient`].
//!
//! [`HttpClient`]: crate::http::HttpClient

pub mod assets;
pub mod auth;

pub use assets::AssetQueryClient;
pub use auth::MarketingCloudAuthClient;

use contentsync_domain::{ContentSyncError, Result};
use url::Url;

/// Join an endpoint path onto a configured base URL, tolerating a trailing
/// slash on the base.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|err| ContentSyncError::Config(format!("invalid URL {raw}: {err}")))
}
