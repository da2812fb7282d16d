//! Vulkan backend for the Helion render hardware interface.
//!
//! This crate provides:
//! - Instance creation with optional validation and debug messenger
//! - Physical device scoring and selection
//! - Queue family ranking and allocation planning
//! - Memory type selection with host cache policy tracking
//! - Surface/swapchain negotiation
//! - Buffer, image, and image view resources

pub mod adapter;
pub mod buffer;
pub mod device;
mod error;
pub mod image;
pub mod instance;
pub mod memory;
pub mod queue;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use adapter::{DeviceFeatures, DeviceProfile, DeviceRequest, QueueFamilyInfo};
pub use buffer::VulkanBuffer;
pub use device::VulkanDevice;
pub use image::{VulkanImage, VulkanImageView};
pub use instance::VulkanInstance;
pub use memory::{HostSyncPolicy, MemoryPreferences};
pub use queue::{QueuePlan, QueueSlot};
pub use surface::SurfaceDetails;
pub use swapchain::{SwapchainConfig, VulkanSwapchain};
pub use sync::VulkanReceipt;

pub use helion_rhi::{Result, RhiError};
