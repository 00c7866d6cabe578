//! Content block records and the paginated query payloads that carry them.
//!
//! Field names follow the Marketing Cloud asset API (`pageSize`, `count`).
//! `query`, `sort` and `fields` are opaque to the sync engine and are passed
//! through unchanged on every page request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single content record. Only the sink attaches meaning to `content`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Raw block body.
    #[serde(default)]
    pub content: String,
}

impl ContentBlock {
    /// Block with the given body.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

/// 1-based page number and page size of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    /// 1-based page number.
    #[serde(default)]
    pub page: u32,
    /// Items per page.
    #[serde(rename = "pageSize", default)]
    pub page_size: u32,
}

/// Query payload sent to the asset query endpoint.
///
/// A zero `page_size` means "use the configured default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlocksRequest {
    /// Target page; rewritten for every page of a run.
    #[serde(default)]
    pub page: PageSpec,
    /// Filter expression, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    /// Sort clauses, passed through.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
    /// Fields to project, passed through.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ContentBlocksRequest {
    /// Request with only a page size set.
    pub fn with_page_size(page_size: u32) -> Self {
        Self { page: PageSpec { page: 0, page_size }, ..Self::default() }
    }

    /// Copy of this request addressed at `page` with `page_size`, keeping the
    /// pass-through payload intact.
    pub fn for_page(&self, page: u32, page_size: u32) -> Self {
        Self { page: PageSpec { page, page_size }, ..self.clone() }
    }
}

/// One page of results as returned by the asset query endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAssetsPage {
    /// Total matching items across all pages.
    #[serde(default)]
    pub count: u64,
    /// Page this response answers.
    #[serde(default)]
    pub page: u32,
    /// Page size the server applied, which may be smaller than requested.
    #[serde(rename = "pageSize", default)]
    pub page_size: u32,
    /// Blocks on this page.
    #[serde(default)]
    pub items: Vec<ContentBlock>,
}
