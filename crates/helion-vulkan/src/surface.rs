//! Surface queries for swapchain negotiation.

use ash::vk;
use helion_rhi::{PresentTarget, Result, RhiError};

use crate::error::vk_err;

/// Everything the device reports about a surface, queried in one pass and
/// consumed immutably by the swapchain negotiator.
#[derive(Debug, Clone, Default)]
pub struct SurfaceDetails {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported (format, color space) pairs, in device order.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceDetails {
    /// Query the details for a physical device / surface pair.
    ///
    /// # Safety
    /// The loader, physical device, and surface must be valid.
    pub unsafe fn query(
        surface_loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let capabilities = surface_loader
            .get_physical_device_surface_capabilities(physical_device, surface)
            .map_err(vk_err)?;
        let formats = surface_loader
            .get_physical_device_surface_formats(physical_device, surface)
            .map_err(vk_err)?;
        let present_modes = surface_loader
            .get_physical_device_surface_present_modes(physical_device, surface)
            .map_err(vk_err)?;

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }
}

/// Create a surface for a present target.
///
/// # Safety
/// The entry and instance must be valid; the target's handles must outlive
/// the surface.
pub unsafe fn create_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    target: &dyn PresentTarget,
) -> Result<vk::SurfaceKHR> {
    let display = target
        .display_handle()
        .map_err(|e| RhiError::SurfaceCreation(format!("no display handle: {e}")))?;
    let window = target
        .window_handle()
        .map_err(|e| RhiError::SurfaceCreation(format!("no window handle: {e}")))?;

    ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
        .map_err(|e| RhiError::SurfaceCreation(e.to_string()))
}
