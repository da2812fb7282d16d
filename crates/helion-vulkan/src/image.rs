//! Image and image view resources.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use helion_rhi::{
    Image, ImageAspect, ImageDesc, ImageFormat, ImageType, ImageUsage, ImageView, ImageViewDesc,
    ImageViewType, Result, RhiError,
};

use crate::error::vk_err;
use crate::memory::{select_memory_type, MemoryPreferences};

pub(crate) fn vk_format(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::R8 => vk::Format::R8_UNORM,
        ImageFormat::Rg8 => vk::Format::R8G8_UNORM,
        ImageFormat::Rgba8 => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        ImageFormat::Bgra8 => vk::Format::B8G8R8A8_UNORM,
        ImageFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        ImageFormat::Rgba16F => vk::Format::R16G16B16A16_SFLOAT,
        ImageFormat::Rgba32F => vk::Format::R32G32B32A32_SFLOAT,
        ImageFormat::Depth16 => vk::Format::D16_UNORM,
        ImageFormat::Depth32 => vk::Format::D32_SFLOAT,
        ImageFormat::Depth24Stencil8 => vk::Format::D24_UNORM_S8_UINT,
    }
}

pub(crate) fn format_from_vk(format: vk::Format) -> Option<ImageFormat> {
    match format {
        vk::Format::R8_UNORM => Some(ImageFormat::R8),
        vk::Format::R8G8_UNORM => Some(ImageFormat::Rg8),
        vk::Format::R8G8B8A8_UNORM => Some(ImageFormat::Rgba8),
        vk::Format::R8G8B8A8_SRGB => Some(ImageFormat::Rgba8Srgb),
        vk::Format::B8G8R8A8_UNORM => Some(ImageFormat::Bgra8),
        vk::Format::B8G8R8A8_SRGB => Some(ImageFormat::Bgra8Srgb),
        vk::Format::R16G16B16A16_SFLOAT => Some(ImageFormat::Rgba16F),
        vk::Format::R32G32B32A32_SFLOAT => Some(ImageFormat::Rgba32F),
        vk::Format::D16_UNORM => Some(ImageFormat::Depth16),
        vk::Format::D32_SFLOAT => Some(ImageFormat::Depth32),
        vk::Format::D24_UNORM_S8_UINT => Some(ImageFormat::Depth24Stencil8),
        _ => None,
    }
}

fn vk_image_type(image_type: ImageType) -> vk::ImageType {
    match image_type {
        ImageType::D1 => vk::ImageType::TYPE_1D,
        ImageType::D2 => vk::ImageType::TYPE_2D,
        ImageType::D3 => vk::ImageType::TYPE_3D,
    }
}

fn vk_view_type(view_type: ImageViewType) -> vk::ImageViewType {
    match view_type {
        ImageViewType::D1 => vk::ImageViewType::TYPE_1D,
        ImageViewType::D2 => vk::ImageViewType::TYPE_2D,
        ImageViewType::D3 => vk::ImageViewType::TYPE_3D,
        ImageViewType::D1Array => vk::ImageViewType::TYPE_1D_ARRAY,
        ImageViewType::D2Array => vk::ImageViewType::TYPE_2D_ARRAY,
        ImageViewType::Cube => vk::ImageViewType::CUBE,
        ImageViewType::CubeArray => vk::ImageViewType::CUBE_ARRAY,
    }
}

fn vk_aspect(aspect: ImageAspect) -> vk::ImageAspectFlags {
    match aspect {
        ImageAspect::Color => vk::ImageAspectFlags::COLOR,
        ImageAspect::Depth => vk::ImageAspectFlags::DEPTH,
        ImageAspect::Stencil => vk::ImageAspectFlags::STENCIL,
    }
}

pub(crate) fn vk_image_usage(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(ImageUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(ImageUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(ImageUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(ImageUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    flags
}

/// A Vulkan image, either owned (created and bound to memory selected by
/// the memory type selector) or borrowed from the driver (swapchain images,
/// whose teardown is skipped).
pub struct VulkanImage {
    device: Arc<ash::Device>,
    image: vk::Image,
    memory: Option<vk::DeviceMemory>,
    owning: bool,
    desc: ImageDesc,
}

impl VulkanImage {
    /// Create an owning image and bind it to freshly selected memory.
    ///
    /// # Safety
    /// The device must be valid; the queue family list must match the
    /// logical device.
    pub(crate) unsafe fn new(
        device: Arc<ash::Device>,
        memory_props: &vk::PhysicalDeviceMemoryProperties,
        queue_families: &[u32],
        desc: &ImageDesc,
    ) -> Result<Self> {
        if desc.usage.is_empty() {
            return Err(RhiError::InvalidState("image usage must not be empty".to_string()));
        }

        let mut flags = vk::ImageCreateFlags::empty();
        if desc.image_type == ImageType::D2 && desc.layers >= 6 {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        } else if desc.image_type == ImageType::D3 {
            flags |= vk::ImageCreateFlags::TYPE_2D_ARRAY_COMPATIBLE;
        }

        let sharing_mode = if queue_families.len() == 1 {
            vk::SharingMode::EXCLUSIVE
        } else {
            vk::SharingMode::CONCURRENT
        };

        let create_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk_image_type(desc.image_type))
            .format(vk_format(desc.format))
            .extent(vk::Extent3D {
                width: desc.dimensions.width,
                height: desc.dimensions.height,
                depth: desc.dimensions.depth,
            })
            .mip_levels(1)
            .array_layers(desc.layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk_image_usage(desc.usage))
            .sharing_mode(sharing_mode)
            .queue_family_indices(queue_families)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = device.create_image(&create_info, None).map_err(vk_err)?;

        let requirements = device.get_image_memory_requirements(image);
        let prefs = MemoryPreferences::for_access(desc.cpu_access, desc.gpu_access_rate);
        let type_count = memory_props.memory_type_count as usize;
        let selected = select_memory_type(
            &memory_props.memory_types[..type_count],
            requirements.memory_type_bits,
            &prefs,
        );
        let (type_index, _flags) = match selected {
            Ok(selected) => selected,
            Err(err) => {
                device.destroy_image(image, None);
                return Err(err);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(type_index);

        let memory = match device.allocate_memory(&alloc_info, None) {
            Ok(memory) => memory,
            Err(err) => {
                device.destroy_image(image, None);
                return Err(vk_err(err));
            }
        };

        if let Err(err) = device.bind_image_memory(image, memory, 0) {
            device.destroy_image(image, None);
            device.free_memory(memory, None);
            return Err(vk_err(err));
        }

        Ok(Self {
            device,
            image,
            memory: Some(memory),
            owning: true,
            desc: *desc,
        })
    }

    /// Wrap a driver-owned image handle; teardown skips destruction.
    pub(crate) fn from_raw(device: Arc<ash::Device>, image: vk::Image, desc: ImageDesc) -> Self {
        Self {
            device,
            image,
            memory: None,
            owning: false,
            desc,
        }
    }

    /// Raw image handle.
    #[must_use]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Whether this wrapper owns (and will destroy) the handle.
    #[must_use]
    pub fn is_owning(&self) -> bool {
        self.owning
    }
}

impl Image for VulkanImage {
    fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanImage {
    fn drop(&mut self) {
        if !self.owning {
            return;
        }
        unsafe {
            self.device.destroy_image(self.image, None);
            if let Some(memory) = self.memory.take() {
                self.device.free_memory(memory, None);
            }
        }
    }
}

/// An owning view over a Vulkan image.
pub struct VulkanImageView {
    device: Arc<ash::Device>,
    view: vk::ImageView,
}

impl VulkanImageView {
    /// Create a view over an image.
    ///
    /// # Safety
    /// The device must be valid and the image must outlive the view.
    pub(crate) unsafe fn new(
        device: Arc<ash::Device>,
        image: &VulkanImage,
        view_type: ImageViewType,
        aspect: ImageAspect,
        base_layer: u32,
        layers: u32,
    ) -> Result<Self> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image.handle())
            .view_type(vk_view_type(view_type))
            .format(vk_format(image.desc.format))
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk_aspect(aspect))
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(base_layer)
                    .layer_count(layers),
            );

        let view = device.create_image_view(&create_info, None).map_err(vk_err)?;

        Ok(Self { device, view })
    }

    /// Create a view from a backend-agnostic description.
    ///
    /// # Safety
    /// The device must be valid and the image must outlive the view.
    pub(crate) unsafe fn from_desc(
        device: Arc<ash::Device>,
        desc: &ImageViewDesc<'_>,
    ) -> Result<Self> {
        let image = desc
            .image
            .as_any()
            .downcast_ref::<VulkanImage>()
            .ok_or_else(|| RhiError::InvalidState("image from a foreign backend".to_string()))?;

        Self::new(
            device,
            image,
            desc.view_type,
            desc.aspect,
            desc.base_layer,
            desc.layers,
        )
    }

    /// Raw view handle.
    #[must_use]
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl ImageView for VulkanImageView {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_round_trip() {
        for format in [
            ImageFormat::Rgba8,
            ImageFormat::Rgba8Srgb,
            ImageFormat::Bgra8Srgb,
            ImageFormat::Depth32,
        ] {
            assert_eq!(format_from_vk(vk_format(format)), Some(format));
        }
    }

    #[test]
    fn exotic_formats_are_unmapped() {
        assert_eq!(format_from_vk(vk::Format::ASTC_4X4_UNORM_BLOCK), None);
    }
}
