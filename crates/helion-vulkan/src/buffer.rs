//! Buffer resources.

use std::ptr::NonNull;
use std::sync::Arc;

use ash::vk;
use helion_rhi::{Buffer, BufferDesc, BufferUsage, Result, RhiError};

use crate::error::vk_err;
use crate::memory::{select_memory_type, HostSyncPolicy, MemoryPreferences};

fn vk_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    flags
}

/// A buffer bound to dedicated device memory.
///
/// The memory type is chosen by the memory type selector from the buffer's
/// host access and GPU rate; the resulting host sync policy is applied
/// around every map/unmap pair.
pub struct VulkanBuffer {
    device: Arc<ash::Device>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    desc: BufferDesc,
    sync: HostSyncPolicy,
    mapped: bool,
}

impl VulkanBuffer {
    /// Create a buffer and bind it to freshly selected memory.
    ///
    /// # Safety
    /// The device must be valid; the queue family list must match the
    /// logical device.
    pub(crate) unsafe fn new(
        device: Arc<ash::Device>,
        memory_props: &vk::PhysicalDeviceMemoryProperties,
        queue_families: &[u32],
        desc: &BufferDesc,
    ) -> Result<Self> {
        if desc.size == 0 {
            return Err(RhiError::InvalidState("buffer size must not be zero".to_string()));
        }
        if desc.usage.is_empty() {
            return Err(RhiError::InvalidState("buffer usage must not be empty".to_string()));
        }

        let sharing_mode = if queue_families.len() == 1 {
            vk::SharingMode::EXCLUSIVE
        } else {
            vk::SharingMode::CONCURRENT
        };

        let create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(vk_usage(desc.usage))
            .sharing_mode(sharing_mode)
            .queue_family_indices(queue_families);

        let buffer = device.create_buffer(&create_info, None).map_err(vk_err)?;

        let requirements = device.get_buffer_memory_requirements(buffer);
        let prefs = MemoryPreferences::for_access(desc.cpu_access, desc.gpu_access_rate);
        let type_count = memory_props.memory_type_count as usize;
        let selected = select_memory_type(
            &memory_props.memory_types[..type_count],
            requirements.memory_type_bits,
            &prefs,
        );
        let (type_index, actual_flags) = match selected {
            Ok(selected) => selected,
            Err(err) => {
                device.destroy_buffer(buffer, None);
                return Err(err);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(type_index);

        let memory = match device.allocate_memory(&alloc_info, None) {
            Ok(memory) => memory,
            Err(err) => {
                device.destroy_buffer(buffer, None);
                return Err(vk_err(err));
            }
        };

        if let Err(err) = device.bind_buffer_memory(buffer, memory, 0) {
            device.destroy_buffer(buffer, None);
            device.free_memory(memory, None);
            return Err(vk_err(err));
        }

        Ok(Self {
            device,
            buffer,
            memory,
            desc: *desc,
            sync: HostSyncPolicy::for_allocation(actual_flags, desc.cpu_access),
            mapped: false,
        })
    }

    /// Raw buffer handle.
    #[must_use]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// The host sync policy derived from the allocation's actual flags.
    #[must_use]
    pub fn sync_policy(&self) -> HostSyncPolicy {
        self.sync
    }

    fn whole_range(&self) -> vk::MappedMemoryRange<'static> {
        vk::MappedMemoryRange::default()
            .memory(self.memory)
            .offset(0)
            .size(vk::WHOLE_SIZE)
    }
}

impl Buffer for VulkanBuffer {
    fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    fn map(&mut self) -> Result<NonNull<u8>> {
        if self.mapped {
            return Err(RhiError::AlreadyMapped);
        }

        let ptr = unsafe {
            self.device
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
                .map_err(vk_err)?
        };

        let Some(ptr) = NonNull::new(ptr.cast()) else {
            unsafe { self.device.unmap_memory(self.memory) };
            return Err(RhiError::Driver("driver returned a null mapping".to_string()));
        };

        if self.sync.invalidate_after_map {
            let invalidated = unsafe {
                self.device
                    .invalidate_mapped_memory_ranges(&[self.whole_range()])
            };
            if let Err(err) = invalidated {
                unsafe { self.device.unmap_memory(self.memory) };
                return Err(vk_err(err));
            }
        }

        self.mapped = true;
        Ok(ptr)
    }

    fn unmap(&mut self) -> Result<()> {
        if !self.mapped {
            return Err(RhiError::NotMapped);
        }

        if self.sync.flush_before_unmap {
            unsafe {
                self.device
                    .flush_mapped_memory_ranges(&[self.whole_range()])
                    .map_err(vk_err)?;
            }
        }

        unsafe {
            self.device.unmap_memory(self.memory);
        }
        self.mapped = false;
        Ok(())
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
