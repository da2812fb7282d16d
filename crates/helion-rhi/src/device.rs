//! Render device abstraction.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::buffer::{Buffer, BufferDesc};
use crate::error::Result;
use crate::image::{Image, ImageDesc, ImageView, ImageViewDesc};
use crate::swapchain::Swapchain;
use crate::types::{Extent2d, PresentMode};

/// Host window a device can present into.
pub trait PresentTarget: HasDisplayHandle + HasWindowHandle {
    /// Current framebuffer size in pixels.
    fn extent(&self) -> Extent2d;
}

/// Description of the device to create.
#[derive(Debug, Clone, Copy)]
pub struct DeviceDesc {
    /// Request a graphics queue.
    pub use_graphics: bool,
    /// Request a compute queue.
    pub use_compute: bool,
    /// Presentation pacing for the swapchain, when a present target is
    /// supplied at creation time.
    pub present_mode: PresentMode,
}

impl Default for DeviceDesc {
    fn default() -> Self {
        Self {
            use_graphics: true,
            use_compute: false,
            present_mode: PresentMode::VSync,
        }
    }
}

/// A ready-to-use logical device with its queues and optional swapchain.
///
/// All operations are synchronous and block until the underlying driver
/// call returns.
pub trait RenderDevice {
    /// Create a buffer resource.
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn Buffer>>;

    /// Create an image resource.
    fn create_image(&self, desc: &ImageDesc) -> Result<Box<dyn Image>>;

    /// Create a view over an image.
    fn create_image_view(&self, desc: &ImageViewDesc<'_>) -> Result<Box<dyn ImageView>>;

    /// The swapchain, when the device was created with a present target.
    fn swapchain(&self) -> Option<&dyn Swapchain>;

    /// Mutable access to the swapchain.
    fn swapchain_mut(&mut self) -> Option<&mut dyn Swapchain>;

    /// Block until the device is idle.
    fn wait_idle(&self) -> Result<()>;
}
