//! # ContentSync application
//!
//! Binary layer - wires the ports from `contentsync-core` to the adapters in
//! `contentsync-infra` and owns process lifecycle.
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - [`AppContext`] is the only place concrete adapters are chosen
//! - [`telemetry`] installs the tracing subscriber

pub mod context;
pub mod telemetry;

pub use context::AppContext;
