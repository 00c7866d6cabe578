//! Content block synchronization
//!
//! [`token_cache::TokenCache`] hands out bearer credentials,
//! [`service::ContentSyncService`] walks every page of the asset query and
//! [`ports`] describes the endpoints and sinks both of them talk to.

pub mod pagination;
pub mod ports;
pub mod service;
pub mod token_cache;
