//! Conversion helpers from raw Vulkan results.

use ash::vk;
use helion_rhi::RhiError;

/// Map a raw Vulkan result into the shared error type.
pub(crate) fn vk_err(err: vk::Result) -> RhiError {
    RhiError::Driver(err.to_string())
}
