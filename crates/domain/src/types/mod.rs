//! Domain types and models

pub mod content;
pub mod credential;
pub mod sync_run;

pub use content::{ContentAssetsPage, ContentBlock, ContentBlocksRequest, PageSpec};
pub use credential::{AccessTokenGrant, Credential};
pub use sync_run::{PageFailure, SyncOutcome, SyncRunReport};
