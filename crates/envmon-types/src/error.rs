//! Error types for parsing envmon domain values.

use thiserror::Error;

/// Errors that can occur when converting raw values into domain types.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A position name that is not part of the fixed mapping.
    #[error("invalid position: {0}")]
    UnknownPosition(String),

    /// A stored position code that does not map to a variant.
    #[error("invalid position code: {0}")]
    UnknownPositionCode(i64),
}

/// Result type alias using envmon-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
