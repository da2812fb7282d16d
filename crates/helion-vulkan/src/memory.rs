//! Memory type selection and host cache policy tracking.

use ash::vk;
use helion_rhi::{CpuAccess, GpuAccessRate, Result, RhiError};

/// Property flags an allocation must and would like to have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryPreferences {
    /// Flags the chosen memory type must carry.
    pub required: vk::MemoryPropertyFlags,
    /// Flags that improve a memory type's score when present.
    pub preferred: vk::MemoryPropertyFlags,
}

impl MemoryPreferences {
    /// Derive property preferences from a host access / GPU rate pair.
    ///
    /// Frequent GPU access prefers device-local memory. Host reads require
    /// host-visible and prefer host-cached; host writes require
    /// host-visible; any host access prefers host-coherent.
    #[must_use]
    pub fn for_access(cpu_access: CpuAccess, gpu_access_rate: GpuAccessRate) -> Self {
        let mut required = vk::MemoryPropertyFlags::empty();
        let mut preferred = vk::MemoryPropertyFlags::empty();

        if gpu_access_rate == GpuAccessRate::Frequent {
            preferred |= vk::MemoryPropertyFlags::DEVICE_LOCAL;
        }
        if cpu_access.contains(CpuAccess::READ) {
            required |= vk::MemoryPropertyFlags::HOST_VISIBLE;
            preferred |= vk::MemoryPropertyFlags::HOST_CACHED;
        }
        if cpu_access.contains(CpuAccess::WRITE) {
            required |= vk::MemoryPropertyFlags::HOST_VISIBLE;
        }
        if cpu_access.intersects(CpuAccess::READ | CpuAccess::WRITE) {
            preferred |= vk::MemoryPropertyFlags::HOST_COHERENT;
        }

        Self {
            required,
            preferred,
        }
    }
}

/// Pick the best memory type among the admissible ones.
///
/// Types failing the required-flags check score zero and can never win;
/// among the rest, each preferred bit present adds 0.1. Ties go to the
/// lowest index. Returns the index and the type's actual property flags.
pub fn select_memory_type(
    types: &[vk::MemoryType],
    admissible_mask: u32,
    prefs: &MemoryPreferences,
) -> Result<(u32, vk::MemoryPropertyFlags)> {
    let mut best_score = 0.0f32;
    let mut best_index = None;

    for (index, memory_type) in types.iter().enumerate() {
        if admissible_mask & (1 << index) == 0 {
            continue;
        }

        let mut score = 0.0;
        if memory_type.property_flags.contains(prefs.required) {
            score = 1.0;
        }
        score += (memory_type.property_flags & prefs.preferred)
            .as_raw()
            .count_ones() as f32
            * 0.1
            * score;

        if score > best_score {
            best_score = score;
            best_index = Some(index as u32);
        }
    }

    best_index
        .map(|index| (index, types[index as usize].property_flags))
        .ok_or(RhiError::NoSuitableMemoryType)
}

/// Cache maintenance required around host access to a mapped allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostSyncPolicy {
    /// Invalidate the mapped range right after mapping.
    pub invalidate_after_map: bool,
    /// Flush the mapped range right before unmapping.
    pub flush_before_unmap: bool,
}

impl HostSyncPolicy {
    /// Derive the policy from the flags the allocation actually received.
    ///
    /// Host-coherent memory needs neither operation; otherwise reads need
    /// an invalidate and writes need a flush.
    #[must_use]
    pub fn for_allocation(flags: vk::MemoryPropertyFlags, cpu_access: CpuAccess) -> Self {
        if flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
            Self::default()
        } else if cpu_access.contains(CpuAccess::READ) {
            Self {
                invalidate_after_map: true,
                flush_before_unmap: false,
            }
        } else if cpu_access.contains(CpuAccess::WRITE) {
            Self {
                invalidate_after_map: false,
                flush_before_unmap: true,
            }
        } else {
            Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_type(flags: vk::MemoryPropertyFlags) -> vk::MemoryType {
        vk::MemoryType {
            property_flags: flags,
            heap_index: 0,
        }
    }

    #[test]
    fn write_rare_requires_host_visible() {
        let prefs = MemoryPreferences::for_access(CpuAccess::WRITE, GpuAccessRate::Rare);
        assert_eq!(prefs.required, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert_eq!(prefs.preferred, vk::MemoryPropertyFlags::HOST_COHERENT);
    }

    #[test]
    fn read_frequent_prefers_cached_device_local() {
        let prefs = MemoryPreferences::for_access(CpuAccess::READ, GpuAccessRate::Frequent);
        assert_eq!(prefs.required, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert_eq!(
            prefs.preferred,
            vk::MemoryPropertyFlags::DEVICE_LOCAL
                | vk::MemoryPropertyFlags::HOST_CACHED
                | vk::MemoryPropertyFlags::HOST_COHERENT
        );
    }

    #[test]
    fn gpu_only_has_no_required_flags() {
        let prefs = MemoryPreferences::for_access(CpuAccess::empty(), GpuAccessRate::Frequent);
        assert!(prefs.required.is_empty());
        assert_eq!(prefs.preferred, vk::MemoryPropertyFlags::DEVICE_LOCAL);
    }

    #[test]
    fn required_flags_exclude_candidates() {
        let types = [
            memory_type(vk::MemoryPropertyFlags::DEVICE_LOCAL),
            memory_type(
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ),
        ];
        let prefs = MemoryPreferences::for_access(CpuAccess::WRITE, GpuAccessRate::Rare);

        let (index, flags) = select_memory_type(&types, 0b11, &prefs).unwrap();
        assert_eq!(index, 1);
        assert!(flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
    }

    #[test]
    fn more_preferred_bits_never_rank_lower() {
        let types = [
            memory_type(vk::MemoryPropertyFlags::HOST_VISIBLE),
            memory_type(
                vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT
                    | vk::MemoryPropertyFlags::HOST_CACHED,
            ),
        ];
        let prefs = MemoryPreferences::for_access(CpuAccess::READ, GpuAccessRate::Rare);

        let (index, _) = select_memory_type(&types, 0b11, &prefs).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn ties_break_to_lowest_index() {
        let flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let types = [memory_type(flags), memory_type(flags)];
        let prefs = MemoryPreferences::for_access(CpuAccess::WRITE, GpuAccessRate::Rare);

        let (index, _) = select_memory_type(&types, 0b11, &prefs).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn admissible_mask_filters_types() {
        let flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let types = [memory_type(flags), memory_type(flags)];
        let prefs = MemoryPreferences::for_access(CpuAccess::WRITE, GpuAccessRate::Rare);

        let (index, _) = select_memory_type(&types, 0b10, &prefs).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let types = [memory_type(vk::MemoryPropertyFlags::DEVICE_LOCAL)];
        let prefs = MemoryPreferences::for_access(CpuAccess::WRITE, GpuAccessRate::Rare);

        let err = select_memory_type(&types, 0b1, &prefs).unwrap_err();
        assert!(matches!(err, RhiError::NoSuitableMemoryType));
    }

    #[test]
    fn non_coherent_write_allocation_flushes() {
        let policy = HostSyncPolicy::for_allocation(
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            CpuAccess::WRITE,
        );
        assert!(policy.flush_before_unmap);
        assert!(!policy.invalidate_after_map);
    }

    #[test]
    fn non_coherent_read_allocation_invalidates() {
        let policy = HostSyncPolicy::for_allocation(
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED,
            CpuAccess::READ | CpuAccess::WRITE,
        );
        assert!(policy.invalidate_after_map);
        assert!(!policy.flush_before_unmap);
    }

    #[test]
    fn coherent_allocation_needs_no_maintenance() {
        let policy = HostSyncPolicy::for_allocation(
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            CpuAccess::WRITE,
        );
        assert_eq!(policy, HostSyncPolicy::default());
    }
}
