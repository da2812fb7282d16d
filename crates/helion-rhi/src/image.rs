//! Image and image view abstractions.

use std::any::Any;

use crate::types::{
    CpuAccess, Extent3d, GpuAccessRate, ImageAspect, ImageFormat, ImageType, ImageUsage,
    ImageViewType,
};

/// Description of an image resource.
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Pixel dimensions.
    pub dimensions: Extent3d,
    /// Number of array layers.
    pub layers: u32,
    /// Pixel format.
    pub format: ImageFormat,
    /// Dimensionality.
    pub image_type: ImageType,
    /// GPU-side usage.
    pub usage: ImageUsage,
    /// Host access the image must support.
    pub cpu_access: CpuAccess,
    /// Expected GPU access frequency.
    pub gpu_access_rate: GpuAccessRate,
}

/// A GPU image owned by a backend device, or borrowed from the driver
/// (swapchain images) in which case teardown skips destruction.
pub trait Image {
    /// The description the image was created with.
    fn desc(&self) -> &ImageDesc;

    /// Downcast support for backends.
    fn as_any(&self) -> &dyn Any;
}

/// Description of a view over an existing image.
pub struct ImageViewDesc<'a> {
    /// The image to view.
    pub image: &'a dyn Image,
    /// View dimensionality and layering.
    pub view_type: ImageViewType,
    /// Which aspect the view exposes.
    pub aspect: ImageAspect,
    /// First array layer.
    pub base_layer: u32,
    /// Number of array layers.
    pub layers: u32,
}

/// A view over an image.
pub trait ImageView {
    /// Downcast support for backends.
    fn as_any(&self) -> &dyn Any;
}

impl<'a> ImageViewDesc<'a> {
    /// A full-color 2D view over the whole image.
    #[must_use]
    pub fn color_2d(image: &'a dyn Image) -> Self {
        Self {
            image,
            view_type: ImageViewType::D2,
            aspect: ImageAspect::Color,
            base_layer: 0,
            layers: 1,
        }
    }
}
