//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`EmberError`] covers all failure modes including:
//! - GPU initialization and resource creation failures
//! - Render pipeline sequencing violations
//! - Render target lifecycle violations
//! - Screenshot encoding and I/O errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, EmberError>`.
//!
//! Releasing a render target that does not belong to the pool is *not* an
//! error: the pool treats it as a tolerant no-op so that a double release
//! can never take down a frame. Everything in this enum, by contrast, is a
//! genuine failure that terminates the current frame.

use thiserror::Error;

/// The main error type for the Ember engine.
///
/// Each variant provides specific context about what went wrong and which
/// component detected it.
#[derive(Error, Debug)]
pub enum EmberError {
    // ========================================================================
    // GPU & Device Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Window system error.
    #[error("Window system error: {0}")]
    WindowError(#[from] raw_window_handle::HandleError),

    /// Event loop error (winit).
    #[cfg(feature = "winit")]
    #[error("Event loop error: {0}")]
    EventLoopError(#[from] winit::error::EventLoopError),

    /// GPU surface allocation failed. Not retried: the underlying cause
    /// (out of memory, device loss) is not transient within a frame.
    #[error("Render target creation failed: {0}")]
    SurfaceCreationFailed(String),

    /// A graphics technique (shader program) could not be resolved.
    #[error("{technique} technique handles could not be retrieved: {reason}")]
    TechniqueNotFound {
        /// The technique that failed to resolve.
        technique: &'static str,
        /// Why resolution failed.
        reason: String,
    },

    /// The backend does not support the requested operation.
    #[error("Unsupported backend operation: {0}")]
    Unsupported(String),

    // ========================================================================
    // Render Pipeline Sequencing Errors
    // ========================================================================
    /// A caller violated a documented precondition (for example passing a
    /// null destination render target to the pass sequencer).
    #[error("Precondition violated in {component}: {message}")]
    PreconditionViolation {
        /// The component that detected the violation.
        component: &'static str,
        /// Description of the violated precondition.
        message: String,
    },

    /// A render target was enabled while another was already active
    /// without going through the explicit multi-target API. This is a
    /// pipeline sequencing bug, not a recoverable runtime condition.
    #[error("Render target already active: {0}")]
    TargetAlreadyActive(&'static str),

    /// A render target's contents were read before the target was written
    /// and resolved.
    #[error("Render target read before resolve: {0}")]
    TargetNotResolved(&'static str),

    /// A render target handle did not refer to a live target.
    #[error("Invalid render target handle in {0}")]
    InvalidTarget(&'static str),

    /// The render target pool refused to grow past its configured capacity.
    #[error("Render target pool capacity exceeded ({capacity} targets)")]
    PoolCapacityExceeded {
        /// Configured maximum number of pooled targets.
        capacity: usize,
    },

    // ========================================================================
    // Screenshot & I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Screenshot image encoding error.
    #[error("Image encode error: {0}")]
    ImageEncodeError(String),
}

impl From<image::ImageError> for EmberError {
    fn from(err: image::ImageError) -> Self {
        EmberError::ImageEncodeError(err.to_string())
    }
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
