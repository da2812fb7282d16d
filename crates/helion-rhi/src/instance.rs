//! Render instance abstraction.

use crate::device::{DeviceDesc, PresentTarget, RenderDevice};
use crate::error::Result;

/// Entry point of a rendering backend.
pub trait RenderInstance {
    /// Select a physical device satisfying the description and create a
    /// logical device for it, with a swapchain when a present target is
    /// supplied.
    fn create_device(
        &self,
        desc: &DeviceDesc,
        target: Option<&dyn PresentTarget>,
    ) -> Result<Box<dyn RenderDevice>>;

    /// Whether API validation was enabled at instance creation.
    fn debug_enabled(&self) -> bool;
}
