use thiserror::Error;

/// Capture pipeline errors.
///
/// `WindowNotFound` and `CaptureFailed` are expected at runtime and retried
/// on the next tick. `InvalidBuffer` means two pipeline stages disagree on a
/// buffer's shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("window not found: {0:?}")]
    WindowNotFound(String),

    #[error("window enumeration failed: {0}")]
    Enumeration(String),

    #[error("window capture failed: {0}")]
    CaptureFailed(String),

    #[error("invalid pixel buffer: {0}")]
    InvalidBuffer(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CaptureError>;
