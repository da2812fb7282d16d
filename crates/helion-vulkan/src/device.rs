//! Logical device creation and resource factories.
//!
//! `VulkanDevice` is the orchestrator: it enumerates physical devices,
//! drives the capability scorer and the queue planner, creates the logical
//! device, and hands out buffers, images, and the swapchain.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use helion_rhi::{
    Buffer, BufferDesc, DeviceDesc, Extent2d, Image, ImageDesc, ImageView, ImageViewDesc,
    PresentTarget, RenderDevice, Result, RhiError, Swapchain,
};

use crate::adapter::{select_device, DeviceFeatures, DeviceProfile, DeviceRequest};
use crate::buffer::VulkanBuffer;
use crate::error::vk_err;
use crate::image::{VulkanImage, VulkanImageView};
use crate::instance::VulkanInstance;
use crate::queue::{plan_queues, QueuePlan};
use crate::surface::create_surface;
use crate::swapchain::VulkanSwapchain;

/// Device extensions every logical device enables.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Features every logical device enables.
fn required_device_features() -> DeviceFeatures {
    DeviceFeatures::SAMPLER_ANISOTROPY
}

const QUEUE_PRIORITIES: [f32; 3] = [1.0, 1.0, 1.0];

/// A ready-to-use logical device with its queues and optional swapchain.
pub struct VulkanDevice {
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    memory_props: vk::PhysicalDeviceMemoryProperties,
    plan: QueuePlan,
    graphics_queue: Option<vk::Queue>,
    compute_queue: Option<vk::Queue>,
    present_queue: Option<vk::Queue>,
    queue_families: Vec<u32>,
    surface: Option<vk::SurfaceKHR>,
    surface_loader: ash::khr::surface::Instance,
    swapchain: Option<VulkanSwapchain>,
}

impl VulkanDevice {
    /// Select the best physical device for the description and create a
    /// logical device, with a swapchain when a present target is supplied.
    pub fn new(
        instance: &VulkanInstance,
        desc: &DeviceDesc,
        target: Option<&dyn PresentTarget>,
    ) -> Result<Self> {
        if !desc.use_graphics && !desc.use_compute {
            return Err(RhiError::InvalidState(
                "a device with no queues was requested".to_string(),
            ));
        }

        let surface_loader =
            ash::khr::surface::Instance::new(instance.entry(), instance.raw());

        let surface = match target {
            Some(target) => Some(unsafe {
                create_surface(instance.entry(), instance.raw(), target)?
            }),
            None => None,
        };
        let extent = target.map(PresentTarget::extent);

        let built = unsafe { Self::build(instance, desc, &surface_loader, surface, extent) };
        match built {
            Ok(device) => Ok(device),
            Err(err) => {
                if let Some(surface) = surface {
                    unsafe { surface_loader.destroy_surface(surface, None) };
                }
                Err(err)
            }
        }
    }

    /// # Safety
    /// The surface (when supplied) must belong to the instance.
    unsafe fn build(
        instance: &VulkanInstance,
        desc: &DeviceDesc,
        surface_loader: &ash::khr::surface::Instance,
        surface: Option<vk::SurfaceKHR>,
        extent: Option<Extent2d>,
    ) -> Result<Self> {
        let physical_devices = instance
            .raw()
            .enumerate_physical_devices()
            .map_err(vk_err)?;
        if physical_devices.is_empty() {
            return Err(RhiError::NoSuitableDevice);
        }

        let request = DeviceRequest {
            use_graphics: desc.use_graphics,
            use_compute: desc.use_compute,
            require_present: surface.is_some(),
            required_extensions: required_device_extensions(),
            required_features: required_device_features(),
        };

        let surface_ref = surface.map(|s| (surface_loader, s));
        let profiles = physical_devices
            .iter()
            .map(|&physical| DeviceProfile::query(instance.raw(), physical, surface_ref))
            .collect::<Result<Vec<_>>>()?;

        let selection = select_device(&profiles, &request)?;
        let physical_device = physical_devices[selection.device_index];
        let profile = &profiles[selection.device_index];

        tracing::info!(
            "selected GPU: {} (score {})",
            profile.name,
            selection.scored.score
        );

        let plan = plan_queues(
            &profile.families,
            &selection.scored.graphics_ranked,
            &selection.scored.compute_ranked,
            &request,
        )?;

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = plan
            .claims()
            .iter()
            .map(|&(family, count)| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&QUEUE_PRIORITIES[..count as usize])
            })
            .collect();

        let extension_names: Vec<*const i8> = request
            .required_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();
        let features = request.required_features.to_vk();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = instance
            .raw()
            .create_device(physical_device, &create_info, None)
            .map_err(vk_err)?;
        let device = Arc::new(device);

        let graphics_queue = plan
            .graphics
            .map(|slot| device.get_device_queue(slot.family, slot.index));
        let compute_queue = plan
            .compute
            .map(|slot| device.get_device_queue(slot.family, slot.index));
        let present_queue = plan
            .present
            .map(|slot| device.get_device_queue(slot.family, slot.index));

        let memory_props = instance
            .raw()
            .get_physical_device_memory_properties(physical_device);
        let queue_families = plan.distinct_families();

        let swapchain = match surface {
            Some(surface) => {
                let built = Self::build_swapchain(
                    instance,
                    &device,
                    surface_loader,
                    physical_device,
                    surface,
                    present_queue,
                    &queue_families,
                    desc,
                    extent,
                );
                match built {
                    Ok(swapchain) => Some(swapchain),
                    Err(err) => {
                        device.destroy_device(None);
                        return Err(err);
                    }
                }
            }
            None => None,
        };

        Ok(Self {
            physical_device,
            device,
            memory_props,
            plan,
            graphics_queue,
            compute_queue,
            present_queue,
            queue_families,
            surface,
            surface_loader: surface_loader.clone(),
            swapchain,
        })
    }

    /// # Safety
    /// All handles must be valid and belong together.
    #[allow(clippy::too_many_arguments)]
    unsafe fn build_swapchain(
        instance: &VulkanInstance,
        device: &Arc<ash::Device>,
        surface_loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        present_queue: Option<vk::Queue>,
        queue_families: &[u32],
        desc: &DeviceDesc,
        extent: Option<Extent2d>,
    ) -> Result<VulkanSwapchain> {
        let present_queue = present_queue.ok_or(RhiError::NoSuitableQueueFamily {
            role: "presentation",
        })?;
        let extent = extent.ok_or_else(|| {
            RhiError::InvalidState("present target supplied no extent".to_string())
        })?;

        let swapchain_loader = ash::khr::swapchain::Device::new(instance.raw(), device);

        VulkanSwapchain::new(
            device.clone(),
            swapchain_loader,
            surface_loader.clone(),
            physical_device,
            surface,
            present_queue,
            queue_families.to_vec(),
            desc.present_mode,
            extent,
        )
    }

    /// The Vulkan device handle.
    #[must_use]
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// The physical device handle.
    #[must_use]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The graphics queue, when one was requested.
    #[must_use]
    pub fn graphics_queue(&self) -> Option<vk::Queue> {
        self.graphics_queue
    }

    /// The compute queue, when one was requested.
    #[must_use]
    pub fn compute_queue(&self) -> Option<vk::Queue> {
        self.compute_queue
    }

    /// The presentation queue, when a present target was supplied.
    #[must_use]
    pub fn present_queue(&self) -> Option<vk::Queue> {
        self.present_queue
    }

    /// The queue allocation plan the device was created from.
    #[must_use]
    pub fn queue_plan(&self) -> &QueuePlan {
        &self.plan
    }

    /// Distinct queue family indices with at least one created queue.
    #[must_use]
    pub fn queue_families(&self) -> &[u32] {
        &self.queue_families
    }

    /// The concrete swapchain.
    #[must_use]
    pub fn vk_swapchain(&self) -> Option<&VulkanSwapchain> {
        self.swapchain.as_ref()
    }

    /// Mutable access to the concrete swapchain.
    pub fn vk_swapchain_mut(&mut self) -> Option<&mut VulkanSwapchain> {
        self.swapchain.as_mut()
    }

    /// Create a buffer resource.
    pub fn create_buffer(&self, desc: &BufferDesc) -> Result<VulkanBuffer> {
        unsafe {
            VulkanBuffer::new(
                self.device.clone(),
                &self.memory_props,
                &self.queue_families,
                desc,
            )
        }
    }

    /// Create an image resource.
    pub fn create_image(&self, desc: &ImageDesc) -> Result<VulkanImage> {
        unsafe {
            VulkanImage::new(
                self.device.clone(),
                &self.memory_props,
                &self.queue_families,
                desc,
            )
        }
    }

    /// Create a view over an image.
    pub fn create_image_view(&self, desc: &ImageViewDesc<'_>) -> Result<VulkanImageView> {
        unsafe { VulkanImageView::from_desc(self.device.clone(), desc) }
    }

    /// Block until the device is idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle().map_err(vk_err) }
    }
}

impl RenderDevice for VulkanDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn Buffer>> {
        Ok(Box::new(VulkanDevice::create_buffer(self, desc)?))
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<Box<dyn Image>> {
        Ok(Box::new(VulkanDevice::create_image(self, desc)?))
    }

    fn create_image_view(&self, desc: &ImageViewDesc<'_>) -> Result<Box<dyn ImageView>> {
        Ok(Box::new(VulkanDevice::create_image_view(self, desc)?))
    }

    fn swapchain(&self) -> Option<&dyn Swapchain> {
        self.swapchain.as_ref().map(|s| s as &dyn Swapchain)
    }

    fn swapchain_mut(&mut self) -> Option<&mut dyn Swapchain> {
        self.swapchain.as_mut().map(|s| s as &mut dyn Swapchain)
    }

    fn wait_idle(&self) -> Result<()> {
        VulkanDevice::wait_idle(self)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Swapchain teardown needs the device, so it goes first.
            self.swapchain = None;

            self.device.destroy_device(None);

            if let Some(surface) = self.surface.take() {
                self.surface_loader.destroy_surface(surface, None);
            }
        }
    }
}
