use thiserror::Error;

use crate::types::Point;

pub type Result<T> = std::result::Result<T, SifError>;

#[derive(Debug, Error)]
pub enum SifError {
    /// Path data that cannot be interpreted (no leading moveto, bad numbers, unknown command).
    #[error("malformed path data: {0}")]
    MalformedPath(String),

    /// Unknown layer kind or parameter name.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("cannot infer parameter type for {0}")]
    AmbiguousType(String),

    #[error("gradient `{from}` links to missing gradient `{to}`")]
    UnresolvedLink { from: String, to: String },

    #[error("gradient link chain starting at `{0}` is cyclic")]
    GradientCycle(String),

    #[error("gradient `{0}` has neither stops nor a link")]
    InvalidGradient(String),

    #[error("coordinate round-trip mismatch: expected {expected}, got {actual}")]
    RoundTripInvariant { expected: Point, actual: Point },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("svg parse error: {0}")]
    Svg(#[from] roxmltree::Error),

    #[error("xml write error: {0}")]
    Xml(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
