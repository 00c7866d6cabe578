//! Local filesystem sink

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use contentsync_core::{Clock, ContentUploader, SystemClock};
use contentsync_domain::{ContentBlock, ContentSyncError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{encode, object_key};

/// Writes `{directory}/{YYYY-MM-DD}/content-block.json`.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// reader never sees a half-written aggregate. A second upload on the same
/// day replaces the first.
pub struct LocalUploader {
    directory: PathBuf,
    clock: Arc<dyn Clock>,
}

impl LocalUploader {
    /// Uploader rooted at `directory`, created on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into(), clock: Arc::new(SystemClock) }
    }

    /// Date folders follow `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Root of the date folders.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Destination for an upload made now.
    pub fn target_path(&self) -> PathBuf {
        self.directory.join(object_key("", self.clock.now()))
    }

    async fn write_atomically(target: &Path, body: Vec<u8>) -> std::io::Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut staged = StagedFile::next_to(target);
        tokio::fs::write(&staged.path, body).await?;
        tokio::fs::rename(&staged.path, target).await?;
        staged.committed = true;
        Ok(())
    }
}

/// Temporary sibling of the target file, removed on drop unless it was
/// renamed into place. Covers failed writes, failed renames and a write
/// future dropped by cancellation.
struct StagedFile {
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn next_to(target: &Path) -> Self {
        let path = target.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));
        Self { path, committed: false }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl ContentUploader for LocalUploader {
    #[instrument(skip_all, fields(blocks = blocks.len()))]
    async fn upload_content_blocks(
        &self,
        blocks: &[ContentBlock],
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ContentSyncError::RunCancelled);
        }

        let body = encode(blocks)?;
        let target = self.target_path();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ContentSyncError::RunCancelled),
            written = Self::write_atomically(&target, body) => {
                written.map_err(|err| {
                    ContentSyncError::Upload(format!("{}: {err}", target.display()))
                })?;
            }
        }

        info!(path = %target.display(), "Content blocks written");
        Ok(())
    }
}
