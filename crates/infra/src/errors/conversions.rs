//! Conversions from external infrastructure errors into domain errors.

use contentsync_domain::ContentSyncError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub ContentSyncError);

impl From<InfraError> for ContentSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<ContentSyncError> for InfraError {
    fn from(value: ContentSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoContentSyncError {
    fn into_content_sync(self) -> ContentSyncError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → ContentSyncError */
/* -------------------------------------------------------------------------- */

impl IntoContentSyncError for HttpError {
    fn into_content_sync(self) -> ContentSyncError {
        if self.is_decode() {
            return ContentSyncError::Decode(self.to_string());
        }

        if self.is_timeout() {
            return ContentSyncError::Transport("HTTP request timed out".into());
        }

        if self.is_connect() {
            return ContentSyncError::Transport(format!("HTTP connection failure: {self}"));
        }

        if let Some(status) = self.status() {
            return ContentSyncError::Transport(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            ));
        }

        ContentSyncError::Transport(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_content_sync())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json / io → ContentSyncError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(ContentSyncError::Decode(value.to_string()))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(ContentSyncError::Upload(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
