//! Backend-agnostic render hardware interface for the Helion renderer.
//!
//! This crate defines:
//! - Resource descriptors (buffers, images, views, swapchains)
//! - Capability and usage flag types shared by all backends
//! - The `RenderInstance`/`RenderDevice`/`Swapchain`/`Buffer`/`Image` traits
//! - The shared error type and the scoped buffer mapping guard
//!
//! Exactly one backend implements these traits today (`helion-vulkan`); the
//! contracts are written so a second backend can be added without touching
//! callers.

pub mod buffer;
pub mod device;
pub mod error;
pub mod image;
pub mod instance;
pub mod swapchain;
pub mod types;

pub use buffer::{Buffer, BufferDesc, MappedBuffer};
pub use device::{DeviceDesc, PresentTarget, RenderDevice};
pub use error::{Result, RhiError};
pub use image::{Image, ImageDesc, ImageView, ImageViewDesc};
pub use instance::RenderInstance;
pub use swapchain::{RenderReceipt, Swapchain};
pub use types::{
    BufferUsage, CpuAccess, Extent2d, Extent3d, GpuAccessRate, ImageAspect, ImageFormat, ImageType,
    ImageUsage, ImageViewType, PresentMode,
};
