//! Synchronization primitives.

use std::any::Any;

use ash::vk;
use helion_rhi::{RenderReceipt, Result};

use crate::error::vk_err;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    device.create_semaphore(&create_info, None).map_err(vk_err)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    device.create_fence(&create_info, None).map_err(vk_err)
}

/// Block until a fence is signaled.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn wait_for_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device
        .wait_for_fences(&[fence], true, u64::MAX)
        .map_err(vk_err)
}

/// Reset a fence to the unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    device.reset_fences(&[fence]).map_err(vk_err)
}

/// Receipt over a semaphore signalled by a submitted batch; presentation
/// waits on it. The semaphore stays owned by the caller.
pub struct VulkanReceipt {
    semaphore: vk::Semaphore,
}

impl VulkanReceipt {
    /// Wrap a semaphore into a receipt.
    #[must_use]
    pub fn new(semaphore: vk::Semaphore) -> Self {
        Self { semaphore }
    }

    /// The wrapped semaphore.
    #[must_use]
    pub fn semaphore(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl RenderReceipt for VulkanReceipt {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
