//! Buffer abstraction and the scoped mapping guard.

use std::ptr::NonNull;

use crate::error::{Result, RhiError};
use crate::types::{BufferUsage, CpuAccess, GpuAccessRate};

/// Description of a buffer resource.
///
/// Owned by the resource for its whole lifetime; the `cpu_access` and
/// `gpu_access_rate` fields are consulted again at map/unmap time to decide
/// the cache flush/invalidate policy.
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc {
    /// Size in bytes.
    pub size: u64,
    /// GPU-side usage.
    pub usage: BufferUsage,
    /// Host access the buffer must support.
    pub cpu_access: CpuAccess,
    /// Expected GPU access frequency.
    pub gpu_access_rate: GpuAccessRate,
}

impl Default for BufferDesc {
    fn default() -> Self {
        Self {
            size: 0,
            usage: BufferUsage::empty(),
            cpu_access: CpuAccess::empty(),
            gpu_access_rate: GpuAccessRate::Frequent,
        }
    }
}

/// A GPU buffer owned by a backend device.
pub trait Buffer {
    /// The description the buffer was created with.
    fn desc(&self) -> &BufferDesc;

    /// Map the buffer for host access.
    ///
    /// Must be paired with exactly one [`Buffer::unmap`]; nested maps are an
    /// error. Prefer [`MappedBuffer`], which pairs the two automatically.
    fn map(&mut self) -> Result<NonNull<u8>>;

    /// Unmap a previously mapped buffer.
    fn unmap(&mut self) -> Result<()>;
}

/// Scoped mapping of a [`Buffer`].
///
/// Unmaps on drop, so every exit path releases the mapping exactly once.
pub struct MappedBuffer<'a> {
    buffer: &'a mut dyn Buffer,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'a> MappedBuffer<'a> {
    /// Map the given buffer for the lifetime of the guard.
    pub fn new(buffer: &'a mut dyn Buffer) -> Result<Self> {
        let len = buffer.desc().size as usize;
        let ptr = buffer.map()?;
        Ok(Self { buffer, ptr, len })
    }

    /// View the mapped memory as bytes.
    pub fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View the mapped memory as mutable bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Write a Pod slice at the given byte offset.
    pub fn write<T: bytemuck::NoUninit>(&mut self, offset: usize, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let end = offset
            .checked_add(bytes.len())
            .ok_or_else(|| RhiError::InvalidState("write range overflows".to_string()))?;
        if end > self.len {
            return Err(RhiError::InvalidState(
                "write range exceeds buffer size".to_string(),
            ));
        }
        self.bytes_mut()[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl Drop for MappedBuffer<'_> {
    fn drop(&mut self) {
        let _ = self.buffer.unmap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Host-memory stand-in used to exercise the guard contract.
    struct FakeBuffer {
        desc: BufferDesc,
        storage: Vec<u8>,
        maps: u32,
        unmaps: u32,
    }

    impl FakeBuffer {
        fn new(size: usize) -> Self {
            Self {
                desc: BufferDesc {
                    size: size as u64,
                    usage: BufferUsage::UNIFORM,
                    cpu_access: CpuAccess::WRITE,
                    gpu_access_rate: GpuAccessRate::Rare,
                },
                storage: vec![0; size],
                maps: 0,
                unmaps: 0,
            }
        }
    }

    impl Buffer for FakeBuffer {
        fn desc(&self) -> &BufferDesc {
            &self.desc
        }

        fn map(&mut self) -> Result<NonNull<u8>> {
            if self.maps != self.unmaps {
                return Err(RhiError::AlreadyMapped);
            }
            self.maps += 1;
            Ok(NonNull::new(self.storage.as_mut_ptr()).unwrap())
        }

        fn unmap(&mut self) -> Result<()> {
            if self.maps == self.unmaps {
                return Err(RhiError::NotMapped);
            }
            self.unmaps += 1;
            Ok(())
        }
    }

    #[test]
    fn guard_unmaps_exactly_once() {
        let mut buffer = FakeBuffer::new(16);
        {
            let _mapped = MappedBuffer::new(&mut buffer).unwrap();
        }
        assert_eq!(buffer.maps, 1);
        assert_eq!(buffer.unmaps, 1);
    }

    #[test]
    fn guard_write_lands_in_storage() {
        let mut buffer = FakeBuffer::new(8);
        {
            let mut mapped = MappedBuffer::new(&mut buffer).unwrap();
            mapped.write(2, &[0xAAu8, 0xBB]).unwrap();
        }
        assert_eq!(&buffer.storage[2..4], &[0xAA, 0xBB]);
    }

    #[test]
    fn out_of_range_write_is_rejected() {
        let mut buffer = FakeBuffer::new(4);
        let mut mapped = MappedBuffer::new(&mut buffer).unwrap();
        assert!(mapped.write(2, &[0u8; 4]).is_err());
    }

    #[test]
    fn nested_map_is_rejected() {
        let mut buffer = FakeBuffer::new(4);
        let first = buffer.map().unwrap();
        assert!(buffer.map().is_err());
        let _ = first;
        buffer.unmap().unwrap();
    }
}
