//! Error type shared by the RHI traits and every backend.

use thiserror::Error;

use crate::types::Extent2d;

/// RHI-level errors.
///
/// Candidate exhaustion (no suitable device, memory type, queue family or
/// present mode) is always reported as a typed variant; disqualification of
/// an individual candidate is handled by exclusion and never surfaces here.
#[derive(Error, Debug)]
pub enum RhiError {
    /// No enumerated physical device satisfies the capability request.
    #[error("no suitable physical device found")]
    NoSuitableDevice,

    /// No queue family can be assigned to the named role.
    #[error("no queue family can satisfy the {role} role")]
    NoSuitableQueueFamily { role: &'static str },

    /// No admissible memory type satisfies the required property flags.
    #[error("no admissible memory type satisfies the required properties")]
    NoSuitableMemoryType,

    /// None of the device-reported present modes is acceptable.
    #[error("none of the reported present modes is acceptable")]
    NoSuitablePresentMode,

    /// Required device extension not supported.
    #[error("required device extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// Surface creation failed.
    #[error("surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// The requested swapchain extent lies outside the device bounds.
    #[error("requested extent {requested:?} outside device bounds [{min:?}, {max:?}]")]
    IncompatibleExtent {
        requested: Extent2d,
        min: Extent2d,
        max: Extent2d,
    },

    /// A buffer was mapped while already mapped.
    #[error("buffer is already mapped")]
    AlreadyMapped,

    /// A buffer was unmapped without a prior map.
    #[error("buffer is not mapped")]
    NotMapped,

    /// A format or configuration the backend cannot express.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Invalid state or description.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An underlying driver call failed.
    #[error("driver error: {0}")]
    Driver(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RhiError>;
