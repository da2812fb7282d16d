//! Swapchain abstraction.

use std::any::Any;

use crate::error::Result;
use crate::image::{ImageDesc, ImageView};
use crate::types::Extent2d;

/// A token signalled when rendering that targets a swapchain image has
/// finished; presentation waits on it.
pub trait RenderReceipt {
    /// Downcast support for backends.
    fn as_any(&self) -> &dyn Any;
}

/// The set of presentable images cycled between rendering and display.
///
/// Acquisition is blocking and synchronous: `acquire_next_image` returns
/// only once the driver has handed an image back.
pub trait Swapchain {
    /// Block until the next presentable image is available and return its
    /// index.
    fn acquire_next_image(&mut self) -> Result<u32>;

    /// Present the most recently acquired image once all receipts are
    /// signalled.
    fn present(&mut self, receipts: &[&dyn RenderReceipt]) -> Result<()>;

    /// Re-negotiate the swapchain for a new window extent.
    fn resize(&mut self, extent: Extent2d) -> Result<()>;

    /// Number of images in the swapchain.
    fn image_count(&self) -> u32;

    /// View over the image at the given index.
    fn image_view(&self, index: u32) -> &dyn ImageView;

    /// Description shared by all swapchain images.
    fn images_desc(&self) -> &ImageDesc;

    /// Current image extent.
    fn extent(&self) -> Extent2d;
}
