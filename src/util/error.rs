//! Error types for crosspick.

use thiserror::Error;

/// Result alias for crosspick operations.
pub type PickResult<T> = std::result::Result<T, PickError>;

/// Errors that can occur when preparing templates or running a correlation
/// sweep.
#[derive(Debug, Error, PartialEq)]
pub enum PickError {
    /// Malformed configuration: zero templates, non-positive angular step
    /// or range, bad mask parameters.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// Template dimensions exceed the image dimensions they must correlate
    /// against.
    #[error("invalid dimensions: template {tpl_width}x{tpl_height} does not fit image {img_width}x{img_height}")]
    InvalidDimensions {
        tpl_width: usize,
        tpl_height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// A buffer's length does not match the layout expected for the
    /// configured image size.
    #[error("dimension mismatch for {context}: expected {expected} elements, got {got}")]
    DimensionMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },
    /// An operation was invoked out of state-machine order.
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),
    /// A template has no usable signal within its mask support.
    #[error("degenerate template {index}: {reason}")]
    DegenerateTemplate { index: usize, reason: &'static str },
    /// Working buffers for the requested image size would overflow
    /// addressable memory. The picker instance remains usable.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
}
