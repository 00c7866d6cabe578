//! Storage sinks for aggregated content blocks
//!
//! Every sink writes the full aggregate of a run as one JSON array, keyed by
//! the UTC date of the upload:
//!
//! ```text
//! [{prefix}/]{YYYY-MM-DD}/content-block.json
//! ```

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use contentsync_core::ContentUploader;
use contentsync_domain::constants::{CONTENT_BLOCK_OBJECT_NAME, STORAGE_DATE_FORMAT};
#[cfg(not(feature = "s3"))]
use contentsync_domain::ContentSyncError;
use contentsync_domain::{ContentBlock, Result, StorageConfig};
use tracing::info;

pub use local::LocalUploader;
#[cfg(feature = "s3")]
pub use s3::S3Uploader;

use crate::errors::InfraError;

/// Object key (or relative path) for an upload made at `at`.
pub fn object_key(prefix: &str, at: DateTime<Utc>) -> String {
    let date = at.format(STORAGE_DATE_FORMAT);
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{date}/{CONTENT_BLOCK_OBJECT_NAME}")
    } else {
        format!("{prefix}/{date}/{CONTENT_BLOCK_OBJECT_NAME}")
    }
}

/// Serialized upload body.
pub(crate) fn encode(blocks: &[ContentBlock]) -> Result<Vec<u8>> {
    serde_json::to_vec(blocks).map_err(|err| InfraError::from(err).into())
}

/// Build the sink selected by `config`.
pub async fn build_uploader(config: &StorageConfig) -> Result<Arc<dyn ContentUploader>> {
    match config {
        StorageConfig::Local { directory } => {
            info!(directory = %directory, "Using local storage sink");
            Ok(Arc::new(LocalUploader::new(directory)))
        }
        #[cfg(feature = "s3")]
        StorageConfig::S3(s3) => {
            info!(bucket = %s3.bucket, prefix = %s3.path_prefix, "Using S3 storage sink");
            Ok(Arc::new(S3Uploader::from_config(s3).await?))
        }
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3(_) => Err(ContentSyncError::Config(
            "S3 storage requires the `s3` feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn key_without_prefix_is_date_scoped() {
        assert_eq!(object_key("", noon()), "2024-03-09/content-block.json");
        assert_eq!(object_key("/", noon()), "2024-03-09/content-block.json");
    }

    #[test]
    fn key_prefix_is_trimmed() {
        assert_eq!(object_key("/sync/blocks/", noon()), "sync/blocks/2024-03-09/content-block.json");
    }

    #[test]
    fn body_is_a_json_array() {
        let body = encode(&[ContentBlock::new("a"), ContentBlock::new("b")]).unwrap();
        assert_eq!(String::from_utf8(body).unwrap(), r#"[{"content":"a"},{"content":"b"}]"#);
    }

    #[tokio::test]
    async fn local_config_builds_local_sink() {
        let config = StorageConfig::Local { directory: "./unused".into() };
        assert!(build_uploader(&config).await.is_ok());
    }
}
