use thiserror::Error;

use crate::engine::EngineError;
use crate::layout::LayoutError;

/// Status returned for a successful call
pub const STATUS_OK: i32 = 0;
/// Source image metadata could not be read
pub const STATUS_SOURCE_INFO_UNAVAILABLE: i32 = -1;
/// Pinning or locking a host buffer failed
pub const STATUS_PIN_FAILED: i32 = -2;
/// Source pixel format is not one of the recognized formats
pub const STATUS_UNSUPPORTED_FORMAT: i32 = -3;
/// A buffer is shorter than the layout it must hold
pub const STATUS_BUFFER_TOO_SMALL: i32 = -4;
/// Width/height are non-positive or odd
pub const STATUS_INVALID_DIMENSIONS: i32 = -5;
/// Dimensions exceed the configured limits
pub const STATUS_LIMIT_EXCEEDED: i32 = -6;
/// Native code panicked; reported instead of unwinding into the host
pub const STATUS_INTERNAL: i32 = -7;
/// The JPEG encoder rejected the frame
pub const STATUS_ENCODE_FAILED: i32 = -8;
/// Missing buffer or unrecognized enum value at the managed boundary
pub const STATUS_INVALID_ARGUMENT: i32 = i32::MIN;

/// Bridge-wide error type
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Source image info unavailable: {0}")]
    SourceInfoUnavailable(String),

    #[error("Failed to pin host buffer: {0}")]
    PinFailed(String),

    #[error("Unsupported source pixel format: {0}")]
    UnsupportedFormat(i32),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("JPEG encoding failed: {0}")]
    Encode(String),
}

impl BridgeError {
    /// Integer status reported across the managed boundary
    pub fn status(&self) -> i32 {
        match self {
            BridgeError::SourceInfoUnavailable(_) => STATUS_SOURCE_INFO_UNAVAILABLE,
            BridgeError::PinFailed(_) => STATUS_PIN_FAILED,
            BridgeError::UnsupportedFormat(_) => STATUS_UNSUPPORTED_FORMAT,
            BridgeError::Layout(LayoutError::BufferTooSmall { .. }) => STATUS_BUFFER_TOO_SMALL,
            BridgeError::Layout(_) => STATUS_INVALID_DIMENSIONS,
            BridgeError::LimitExceeded(_) => STATUS_LIMIT_EXCEEDED,
            BridgeError::InvalidArgument(_) => STATUS_INVALID_ARGUMENT,
            BridgeError::Engine(e) => e.code(),
            BridgeError::Encode(_) => STATUS_ENCODE_FAILED,
        }
    }

    /// Whether the failure happened before the engine was invoked
    pub fn is_local(&self) -> bool {
        !matches!(self, BridgeError::Engine(_))
    }
}

/// Collapse a dispatcher result into the integer status contract
pub fn status_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => STATUS_OK,
        Err(e) => e.status(),
    }
}

/// Result type alias for dispatcher operations
pub type Result<T> = std::result::Result<T, BridgeError>;
