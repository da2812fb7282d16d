//! Swapchain negotiation and management.

use std::sync::Arc;

use ash::vk;
use helion_rhi::{
    CpuAccess, Extent2d, Extent3d, GpuAccessRate, ImageAspect, ImageDesc, ImageType, ImageUsage,
    ImageView, ImageViewType, PresentMode, RenderReceipt, Result, RhiError, Swapchain,
};

use crate::error::vk_err;
use crate::image::{format_from_vk, VulkanImage, VulkanImageView};
use crate::surface::SurfaceDetails;
use crate::sync::{create_fence, reset_fence, wait_for_fence, VulkanReceipt};

/// Concrete swapchain configuration produced by [`negotiate`].
#[derive(Debug, Clone)]
pub struct SwapchainConfig {
    /// Chosen surface format and color space.
    pub format: vk::SurfaceFormatKHR,
    /// Chosen present mode.
    pub present_mode: vk::PresentModeKHR,
    /// Number of images to request.
    pub image_count: u32,
    /// Validated image extent.
    pub extent: vk::Extent2D,
    /// Sharing mode across the accessing queue families.
    pub sharing_mode: vk::SharingMode,
    /// Distinct queue families that will access the images.
    pub queue_families: Vec<u32>,
}

/// Select the surface format, preferring 8-bit sRGB RGBA.
///
/// Falls back to the first device-reported entry; an empty list is an
/// error.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    let first = available.first().ok_or_else(|| {
        RhiError::SwapchainCreation("device reports no surface formats".to_string())
    })?;

    Ok(available
        .iter()
        .find(|format| {
            format.format == vk::Format::R8G8B8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(*first))
}

/// Select the present mode.
///
/// VSync always maps to FIFO, which the platform guarantees. Otherwise
/// mailbox scores 1000 and immediate 100; if neither is available the
/// negotiation fails rather than silently degrading to FIFO.
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    requested: PresentMode,
) -> Result<vk::PresentModeKHR> {
    if available.is_empty() {
        return Err(RhiError::SwapchainCreation(
            "device reports no present modes".to_string(),
        ));
    }

    if requested == PresentMode::VSync {
        return Ok(vk::PresentModeKHR::FIFO);
    }

    let mut best_score = 0u32;
    let mut best = None;

    for &mode in available {
        let score = match mode {
            vk::PresentModeKHR::MAILBOX => 1000,
            vk::PresentModeKHR::IMMEDIATE => 100,
            _ => 0,
        };
        if score > best_score {
            best_score = score;
            best = Some(mode);
        }
    }

    best.ok_or(RhiError::NoSuitablePresentMode)
}

/// Image count: one more than the minimum, clamped to the maximum when the
/// device reports one (zero meaning unbounded).
#[must_use]
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count != 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

/// Validate the requested extent against the device bounds.
///
/// A `u32::MAX` sentinel in the current extent means the surface tracks the
/// window, and that dimension passes through unchecked.
pub fn validate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: Extent2d,
) -> Result<vk::Extent2D> {
    let current = capabilities.current_extent;
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;

    let width_ok = current.width == u32::MAX
        || (requested.width >= min.width && requested.width <= max.width);
    let height_ok = current.height == u32::MAX
        || (requested.height >= min.height && requested.height <= max.height);

    if !(width_ok && height_ok) {
        return Err(RhiError::IncompatibleExtent {
            requested,
            min: Extent2d::new(min.width, min.height),
            max: Extent2d::new(max.width, max.height),
        });
    }

    Ok(vk::Extent2D {
        width: requested.width,
        height: requested.height,
    })
}

/// Negotiate a concrete swapchain configuration against the device-reported
/// surface details.
pub fn negotiate(
    details: &SurfaceDetails,
    requested_mode: PresentMode,
    requested_extent: Extent2d,
    queue_families: &[u32],
) -> Result<SwapchainConfig> {
    let format = select_surface_format(&details.formats)?;
    let present_mode = select_present_mode(&details.present_modes, requested_mode)?;
    let image_count = select_image_count(&details.capabilities);
    let extent = validate_extent(&details.capabilities, requested_extent)?;

    let mut distinct: Vec<u32> = Vec::with_capacity(queue_families.len());
    for &family in queue_families {
        if !distinct.contains(&family) {
            distinct.push(family);
        }
    }

    let sharing_mode = if distinct.len() == 1 {
        vk::SharingMode::EXCLUSIVE
    } else {
        vk::SharingMode::CONCURRENT
    };

    Ok(SwapchainConfig {
        format,
        present_mode,
        image_count,
        extent,
        sharing_mode,
        queue_families: distinct,
    })
}

/// The set of presentable images for a surface, with the synchronous
/// acquire fence the sample render loop blocks on.
pub struct VulkanSwapchain {
    device: Arc<ash::Device>,
    loader: ash::khr::swapchain::Device,
    surface_loader: ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    present_queue: vk::Queue,
    present_mode: PresentMode,
    queue_families: Vec<u32>,
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    images: Vec<VulkanImage>,
    views: Vec<VulkanImageView>,
    images_desc: ImageDesc,
    acquire_fence: vk::Fence,
    current_index: Option<u32>,
}

struct Chain {
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    images: Vec<VulkanImage>,
    views: Vec<VulkanImageView>,
    images_desc: ImageDesc,
}

/// Negotiate and create the swapchain plus its image wrappers and views.
///
/// # Safety
/// All handles must be valid.
#[allow(clippy::too_many_arguments)]
unsafe fn create_chain(
    device: &Arc<ash::Device>,
    loader: &ash::khr::swapchain::Device,
    surface_loader: &ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    present_mode: PresentMode,
    queue_families: &[u32],
    extent: Extent2d,
) -> Result<Chain> {
    let details = SurfaceDetails::query(surface_loader, physical_device, surface)?;
    let config = negotiate(&details, present_mode, extent, queue_families)?;

    let create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(config.image_count)
        .image_format(config.format.format)
        .image_color_space(config.format.color_space)
        .image_extent(config.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(config.sharing_mode)
        .queue_family_indices(&config.queue_families)
        .pre_transform(details.capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(config.present_mode)
        .clipped(true);

    let swapchain = loader
        .create_swapchain(&create_info, None)
        .map_err(|e| RhiError::SwapchainCreation(e.to_string()))?;

    let format = match format_from_vk(config.format.format) {
        Some(format) => format,
        None => {
            loader.destroy_swapchain(swapchain, None);
            return Err(RhiError::Unsupported(format!(
                "surface format {:?}",
                config.format.format
            )));
        }
    };

    let images_desc = ImageDesc {
        dimensions: Extent3d::new(config.extent.width, config.extent.height, 1),
        layers: 1,
        format,
        image_type: ImageType::D2,
        usage: ImageUsage::COLOR_ATTACHMENT,
        cpu_access: CpuAccess::empty(),
        gpu_access_rate: GpuAccessRate::Frequent,
    };

    let raw_images = match loader.get_swapchain_images(swapchain) {
        Ok(images) => images,
        Err(err) => {
            loader.destroy_swapchain(swapchain, None);
            return Err(vk_err(err));
        }
    };

    let images: Vec<VulkanImage> = raw_images
        .into_iter()
        .map(|image| VulkanImage::from_raw(device.clone(), image, images_desc))
        .collect();

    let mut views = Vec::with_capacity(images.len());
    for image in &images {
        let view = match VulkanImageView::new(
            device.clone(),
            image,
            ImageViewType::D2,
            ImageAspect::Color,
            0,
            1,
        ) {
            Ok(view) => view,
            Err(err) => {
                views.clear();
                loader.destroy_swapchain(swapchain, None);
                return Err(err);
            }
        };
        views.push(view);
    }

    Ok(Chain {
        swapchain,
        format: config.format,
        images,
        views,
        images_desc,
    })
}

impl VulkanSwapchain {
    /// Create a swapchain for an existing surface.
    ///
    /// # Safety
    /// All handles must be valid and belong together.
    #[allow(clippy::too_many_arguments)]
    pub(crate) unsafe fn new(
        device: Arc<ash::Device>,
        loader: ash::khr::swapchain::Device,
        surface_loader: ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        present_queue: vk::Queue,
        queue_families: Vec<u32>,
        present_mode: PresentMode,
        extent: Extent2d,
    ) -> Result<Self> {
        let chain = create_chain(
            &device,
            &loader,
            &surface_loader,
            physical_device,
            surface,
            present_mode,
            &queue_families,
            extent,
        )?;

        let acquire_fence = match create_fence(&device, false) {
            Ok(fence) => fence,
            Err(err) => {
                drop(chain.views);
                drop(chain.images);
                loader.destroy_swapchain(chain.swapchain, None);
                return Err(err);
            }
        };

        Ok(Self {
            device,
            loader,
            surface_loader,
            physical_device,
            surface,
            present_queue,
            present_mode,
            queue_families,
            swapchain: chain.swapchain,
            format: chain.format,
            images: chain.images,
            views: chain.views,
            images_desc: chain.images_desc,
            acquire_fence,
            current_index: None,
        })
    }

    /// The negotiated surface format.
    #[must_use]
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// The raw swapchain handle.
    #[must_use]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// The swapchain image views, one per image.
    #[must_use]
    pub fn views(&self) -> &[VulkanImageView] {
        &self.views
    }

    /// Current image extent.
    #[must_use]
    pub fn vk_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.images_desc.dimensions.width,
            height: self.images_desc.dimensions.height,
        }
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self) -> Result<u32> {
        unsafe {
            reset_fence(&self.device, self.acquire_fence)?;
            let (index, _suboptimal) = self
                .loader
                .acquire_next_image(
                    self.swapchain,
                    u64::MAX,
                    vk::Semaphore::null(),
                    self.acquire_fence,
                )
                .map_err(vk_err)?;
            wait_for_fence(&self.device, self.acquire_fence)?;
            self.current_index = Some(index);
            Ok(index)
        }
    }

    fn present(&mut self, receipts: &[&dyn RenderReceipt]) -> Result<()> {
        let index = self.current_index.ok_or_else(|| {
            RhiError::InvalidState("present without an acquired image".to_string())
        })?;

        let semaphores: Vec<vk::Semaphore> = receipts
            .iter()
            .map(|receipt| {
                receipt
                    .as_any()
                    .downcast_ref::<VulkanReceipt>()
                    .map(VulkanReceipt::semaphore)
                    .ok_or_else(|| {
                        RhiError::InvalidState("receipt from a foreign backend".to_string())
                    })
            })
            .collect::<Result<_>>()?;

        let swapchains = [self.swapchain];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe {
            self.loader
                .queue_present(self.present_queue, &present_info)
                .map_err(vk_err)?;
        }

        Ok(())
    }

    fn resize(&mut self, extent: Extent2d) -> Result<()> {
        unsafe {
            self.views.clear();
            self.images.clear();
            self.loader.destroy_swapchain(self.swapchain, None);
            self.swapchain = vk::SwapchainKHR::null();

            let chain = create_chain(
                &self.device,
                &self.loader,
                &self.surface_loader,
                self.physical_device,
                self.surface,
                self.present_mode,
                &self.queue_families,
                extent,
            )?;

            self.swapchain = chain.swapchain;
            self.format = chain.format;
            self.images = chain.images;
            self.views = chain.views;
            self.images_desc = chain.images_desc;
            self.current_index = None;
        }
        Ok(())
    }

    fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    fn image_view(&self, index: u32) -> &dyn ImageView {
        &self.views[index as usize]
    }

    fn images_desc(&self) -> &ImageDesc {
        &self.images_desc
    }

    fn extent(&self) -> Extent2d {
        Extent2d::new(
            self.images_desc.dimensions.width,
            self.images_desc.dimensions.height,
        )
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.views.clear();
            self.images.clear();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            self.device.destroy_fence(self.acquire_fence, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn capabilities(min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        let mut caps = vk::SurfaceCapabilitiesKHR::default();
        caps.min_image_count = min_count;
        caps.max_image_count = max_count;
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        caps
    }

    #[test]
    fn preferred_format_wins_when_present() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = select_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn format_falls_back_to_first_reported() {
        let formats = [
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = select_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn empty_format_list_is_an_error() {
        assert!(select_surface_format(&[]).is_err());
    }

    #[test]
    fn vsync_always_yields_fifo() {
        let modes = [
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
        ];
        let chosen = select_present_mode(&modes, PresentMode::VSync).unwrap();
        assert_eq!(chosen, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn immediate_request_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        let chosen = select_present_mode(&modes, PresentMode::Immediate).unwrap();
        assert_eq!(chosen, vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn immediate_request_accepts_immediate() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        let chosen = select_present_mode(&modes, PresentMode::Immediate).unwrap();
        assert_eq!(chosen, vk::PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn fifo_only_without_vsync_request_is_an_error() {
        let modes = [vk::PresentModeKHR::FIFO];
        let err = select_present_mode(&modes, PresentMode::Immediate).unwrap_err();
        assert!(matches!(err, RhiError::NoSuitablePresentMode));
    }

    #[test]
    fn image_count_is_min_plus_one_when_unbounded() {
        assert_eq!(select_image_count(&capabilities(2, 0)), 3);
    }

    #[test]
    fn image_count_clamps_to_maximum() {
        assert_eq!(select_image_count(&capabilities(2, 2)), 2);
    }

    #[test]
    fn sentinel_extent_passes_through() {
        let caps = capabilities(2, 0);
        let extent = validate_extent(&caps, Extent2d::new(1280, 720)).unwrap();
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 720);
    }

    #[test]
    fn out_of_bounds_extent_is_rejected() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        caps.min_image_extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        caps.max_image_extent = vk::Extent2D {
            width: 1024,
            height: 768,
        };

        let err = validate_extent(&caps, Extent2d::new(1280, 720)).unwrap_err();
        assert!(matches!(err, RhiError::IncompatibleExtent { .. }));

        let ok = validate_extent(&caps, Extent2d::new(800, 600)).unwrap();
        assert_eq!(ok.width, 800);
    }

    #[test]
    fn sharing_is_exclusive_for_one_family() {
        let details = SurfaceDetails {
            capabilities: capabilities(2, 0),
            formats: vec![surface_format(
                vk::Format::R8G8B8A8_SRGB,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            )],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        let config =
            negotiate(&details, PresentMode::VSync, Extent2d::new(640, 480), &[0, 0]).unwrap();
        assert_eq!(config.sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert_eq!(config.queue_families, vec![0]);

        let config =
            negotiate(&details, PresentMode::VSync, Extent2d::new(640, 480), &[0, 1]).unwrap();
        assert_eq!(config.sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(config.queue_families, vec![0, 1]);
    }
}
