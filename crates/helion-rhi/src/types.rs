//! Common resource and presentation types shared by all backends.

use bitflags::bitflags;

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    /// Create a new extent.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A width/height/depth triple in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3d {
    /// Create a new extent.
    #[must_use]
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// How often the GPU is expected to touch a resource.
///
/// `Frequent` steers allocations towards device-local memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuAccessRate {
    Rare,
    #[default]
    Frequent,
}

bitflags! {
    /// Host-side access a resource must support.
    ///
    /// Influences the memory type an allocation lands in and whether the
    /// owning resource performs cache flush/invalidate around mapping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CpuAccess: u8 {
        const WRITE = 1 << 0;
        const READ = 1 << 1;
    }
}

bitflags! {
    /// Ways a buffer may be used on the GPU.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const VERTEX = 1 << 2;
        const INDEX = 1 << 3;
        const UNIFORM = 1 << 4;
        const STORAGE = 1 << 5;
    }
}

bitflags! {
    /// Ways an image may be used on the GPU.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
    }
}

/// Presentation pacing requested for a swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentMode {
    /// Present as fast as possible, tearing allowed.
    Immediate,
    /// Lock presentation to the display refresh rate.
    #[default]
    VSync,
}

/// Pixel format of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    R8,
    Rg8,
    Rgba8,
    Rgba8Srgb,
    Bgra8,
    Bgra8Srgb,
    Rgba16F,
    Rgba32F,
    Depth16,
    Depth32,
    Depth24Stencil8,
}

/// Dimensionality of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    D1,
    D2,
    D3,
}

/// Dimensionality and layering of an image view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageViewType {
    D1,
    D2,
    D3,
    D1Array,
    D2Array,
    Cube,
    CubeArray,
}

/// Which aspect of an image a view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAspect {
    Color,
    Depth,
    Stencil,
}
