//! Macro for implementing Display and FromStr for status enums
//!
//! Used for the small closed enums that travel through logs and environment
//! variables (run outcomes, storage backends). Parsing is case-insensitive and
//! output is always the lowercase form.
//!
//! # Example
//!
//! ```rust
//! use contentsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum RunPhase {
//!     Fetching,
//!     Uploading,
//! }
//!
//! impl_domain_status_conversions!(RunPhase {
//!     Fetching => "fetching",
//!     Uploading => "uploading",
//! });
//! ```

/// Implements Display and FromStr traits for status enums
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase string
///   representations
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
