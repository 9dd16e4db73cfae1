//! Crate-level error types.

use std::fmt;

/// Errors produced by the `volren` crate.
///
/// Degenerate rays and other per-sample numerical edge cases are clamped
/// inline per the sampling invariants and never surface as an `Err` — this
/// enum only covers malformed input, resource failures, and calls made out
/// of the `init -> commit -> trace` sequence.
#[derive(Debug)]
pub enum VolRenError {
    /// A parameter was malformed: non-positive dimensions, NaN in a
    /// transform, a field of view outside `(0, 180)`, a zero-width transfer
    /// function window, and similar.
    InvalidInput(String),
    /// Allocation of a brick atlas, framebuffer, or environment mip chain
    /// failed.
    ResourceExhausted(String),
    /// An operation was invoked out of the required sequence, e.g. `trace()`
    /// before `commit()`, or `commit()` with no volume set.
    ProtocolMisuse(String),
    /// Failed to read a volume or environment file from disk.
    Io(std::io::Error),
    /// Failed to decode an image (environment map, transfer function LUT).
    Image(image::ImageError),
}

impl fmt::Display for VolRenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
            Self::ProtocolMisuse(msg) => write!(f, "protocol misuse: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Image(e) => write!(f, "image decode error: {e}"),
        }
    }
}

impl std::error::Error for VolRenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Image(e) => Some(e),
            Self::InvalidInput(_) | Self::ResourceExhausted(_) | Self::ProtocolMisuse(_) => None,
        }
    }
}

impl From<std::io::Error> for VolRenError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<image::ImageError> for VolRenError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VolRenError>;
