//! Queue family ranking and allocation planning.

use ash::vk;
use helion_rhi::{Result, RhiError};

use crate::adapter::{DeviceRequest, QueueFamilyInfo};

/// Flag set a graphics role must be served by.
pub const GRAPHICS_FLAGS: vk::QueueFlags = vk::QueueFlags::from_raw(
    vk::QueueFlags::GRAPHICS.as_raw()
        | vk::QueueFlags::COMPUTE.as_raw()
        | vk::QueueFlags::TRANSFER.as_raw(),
);

/// Flag set a compute role must be served by.
pub const COMPUTE_FLAGS: vk::QueueFlags =
    vk::QueueFlags::from_raw(vk::QueueFlags::COMPUTE.as_raw() | vk::QueueFlags::TRANSFER.as_raw());

/// How well a family's flag set matches a requirement, in [0, 1].
///
/// Zero unless the family's flags are a superset of `required`; otherwise
/// matched-bits / sqrt(family-bits × required-bits), which penalizes
/// families advertising capabilities the requirement never asked for. An
/// exact match scores 1.0.
#[must_use]
pub fn suitability(flags: vk::QueueFlags, required: vk::QueueFlags) -> f32 {
    if required.is_empty() {
        return 0.0;
    }
    let matched = (flags & required).as_raw();
    if matched != required.as_raw() {
        return 0.0;
    }
    let matched_bits = matched.count_ones() as f32;
    let family_bits = flags.as_raw().count_ones() as f32;
    let required_bits = required.as_raw().count_ones() as f32;
    matched_bits / (family_bits * required_bits).sqrt()
}

/// Rank families by suitability for the required flag set, best first.
///
/// Families with zero suitability are excluded; the result may be empty.
#[must_use]
pub fn rank_families(families: &[QueueFamilyInfo], required: vk::QueueFlags) -> Vec<u32> {
    let mut ranked: Vec<u32> = families
        .iter()
        .filter(|family| suitability(family.flags, required) > 0.0)
        .map(|family| family.index)
        .collect();

    ranked.sort_by(|&a, &b| {
        let sa = suitability(families[a as usize].flags, required);
        let sb = suitability(families[b as usize].flags, required);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });

    ranked
}

/// One role's assignment: the family and the queue index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSlot {
    pub family: u32,
    pub index: u32,
}

/// Immutable queue allocation plan for logical device creation.
///
/// Built by a local accumulator; the family snapshot tables are never
/// mutated in place, so a claimed count can never exceed a family's
/// reported total.
#[derive(Debug, Clone, Default)]
pub struct QueuePlan {
    /// Graphics role assignment.
    pub graphics: Option<QueueSlot>,
    /// Compute role assignment.
    pub compute: Option<QueueSlot>,
    /// Presentation role assignment.
    pub present: Option<QueueSlot>,
    /// (family index, queues claimed) in creation order.
    claims: Vec<(u32, u32)>,
}

impl QueuePlan {
    /// Per-family claim list driving `VkDeviceQueueCreateInfo` entries.
    #[must_use]
    pub fn claims(&self) -> &[(u32, u32)] {
        &self.claims
    }

    /// Distinct queue family indices touched by any role, in claim order.
    #[must_use]
    pub fn distinct_families(&self) -> Vec<u32> {
        self.claims.iter().map(|&(family, _)| family).collect()
    }
}

/// Claim one queue from `family`, yielding its queue index, or `None` when
/// the family has no capacity left.
fn claim(
    claims: &mut Vec<(u32, u32)>,
    remaining: &mut [u32],
    family: u32,
) -> Option<QueueSlot> {
    let slot = remaining.get_mut(family as usize)?;
    if *slot == 0 {
        return None;
    }
    *slot -= 1;

    if let Some(entry) = claims.iter_mut().find(|(f, _)| *f == family) {
        let index = entry.1;
        entry.1 += 1;
        Some(QueueSlot { family, index })
    } else {
        claims.push((family, 1));
        Some(QueueSlot { family, index: 0 })
    }
}

/// Assign concrete queues to the requested roles.
///
/// Graphics takes the top-ranked family. Compute reuses the graphics family
/// with a second queue when they coincide and capacity remains, else falls
/// back to the second-ranked compute family. Presentation reuses the
/// graphics or compute family when possible, else claims the first
/// presentation-capable family in index order.
pub fn plan_queues(
    families: &[QueueFamilyInfo],
    graphics_ranked: &[u32],
    compute_ranked: &[u32],
    request: &DeviceRequest,
) -> Result<QueuePlan> {
    let mut remaining: Vec<u32> = families.iter().map(|family| family.count).collect();
    let mut claims: Vec<(u32, u32)> = Vec::with_capacity(3);

    let mut graphics = None;
    if request.use_graphics {
        let family = *graphics_ranked
            .first()
            .ok_or(RhiError::NoSuitableQueueFamily { role: "graphics" })?;
        graphics = Some(
            claim(&mut claims, &mut remaining, family)
                .ok_or(RhiError::NoSuitableQueueFamily { role: "graphics" })?,
        );
    }

    let mut compute = None;
    if request.use_compute {
        let top = *compute_ranked
            .first()
            .ok_or(RhiError::NoSuitableQueueFamily { role: "compute" })?;

        let slot = match graphics {
            Some(g) if g.family == top => {
                // Shared family: a second queue if one is left, else the
                // second-ranked compute family.
                claim(&mut claims, &mut remaining, top).or_else(|| {
                    compute_ranked
                        .get(1)
                        .and_then(|&f| claim(&mut claims, &mut remaining, f))
                })
            }
            _ => claim(&mut claims, &mut remaining, top),
        };

        compute = Some(slot.ok_or(RhiError::NoSuitableQueueFamily { role: "compute" })?);
    }

    let mut present = None;
    if request.require_present {
        let reuse = [graphics, compute]
            .into_iter()
            .flatten()
            .find(|slot| families[slot.family as usize].present_capable);

        let slot = if let Some(shared) = reuse {
            QueueSlot {
                family: shared.family,
                index: 0,
            }
        } else {
            families
                .iter()
                .filter(|family| family.present_capable)
                .find_map(|family| claim(&mut claims, &mut remaining, family.index))
                .ok_or(RhiError::NoSuitableQueueFamily {
                    role: "presentation",
                })?
        };

        present = Some(slot);
    }

    Ok(QueuePlan {
        graphics,
        compute,
        present,
        claims,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn family(index: u32, count: u32, flags: vk::QueueFlags, present: bool) -> QueueFamilyInfo {
        QueueFamilyInfo {
            index,
            count,
            flags,
            present_capable: present,
        }
    }

    fn request(graphics: bool, compute: bool, present: bool) -> DeviceRequest {
        DeviceRequest {
            use_graphics: graphics,
            use_compute: compute,
            require_present: present,
            ..DeviceRequest::default()
        }
    }

    #[test]
    fn exact_match_scores_one() {
        assert_relative_eq!(suitability(COMPUTE_FLAGS, COMPUTE_FLAGS), 1.0);
    }

    #[test]
    fn partial_match_scores_zero() {
        let compute_only = vk::QueueFlags::COMPUTE;
        assert_eq!(suitability(compute_only, COMPUTE_FLAGS), 0.0);
    }

    #[test]
    fn overly_general_family_is_penalized() {
        let general = GRAPHICS_FLAGS | vk::QueueFlags::SPARSE_BINDING;
        let focused = suitability(GRAPHICS_FLAGS, GRAPHICS_FLAGS);
        let padded = suitability(general, GRAPHICS_FLAGS);
        assert!(padded > 0.0);
        assert!(padded < focused);
    }

    #[test]
    fn ranking_excludes_non_supersets() {
        let families = [
            family(0, 1, vk::QueueFlags::TRANSFER, false),
            family(1, 1, GRAPHICS_FLAGS, false),
            family(2, 1, COMPUTE_FLAGS, false),
        ];
        let ranked = rank_families(&families, GRAPHICS_FLAGS);
        assert_eq!(ranked, vec![1]);
    }

    #[test]
    fn ranking_prefers_tighter_flag_sets() {
        let families = [
            family(0, 1, GRAPHICS_FLAGS | vk::QueueFlags::SPARSE_BINDING, false),
            family(1, 1, COMPUTE_FLAGS, false),
        ];
        let ranked = rank_families(&families, COMPUTE_FLAGS);
        assert_eq!(ranked, vec![1, 0]);
    }

    #[test]
    fn shared_family_claims_two_queues() {
        let families = [family(0, 2, GRAPHICS_FLAGS, true)];
        let graphics_ranked = rank_families(&families, GRAPHICS_FLAGS);
        let compute_ranked = rank_families(&families, COMPUTE_FLAGS);

        let plan =
            plan_queues(&families, &graphics_ranked, &compute_ranked, &request(true, true, true))
                .unwrap();

        assert_eq!(plan.graphics, Some(QueueSlot { family: 0, index: 0 }));
        assert_eq!(plan.compute, Some(QueueSlot { family: 0, index: 1 }));
        assert_eq!(plan.present, Some(QueueSlot { family: 0, index: 0 }));
        assert_eq!(plan.claims(), &[(0, 2)]);
    }

    #[test]
    fn exhausted_shared_family_falls_back_to_second_ranked() {
        let families = [
            family(0, 1, GRAPHICS_FLAGS, true),
            family(1, 1, COMPUTE_FLAGS | vk::QueueFlags::SPARSE_BINDING, false),
        ];
        // Both rankings put family 0 first; it only has one queue.
        let graphics_ranked = rank_families(&families, GRAPHICS_FLAGS);
        let compute_ranked = rank_families(&families, COMPUTE_FLAGS);
        assert_eq!(compute_ranked.first(), Some(&0));

        let plan =
            plan_queues(&families, &graphics_ranked, &compute_ranked, &request(true, true, false))
                .unwrap();

        assert_eq!(plan.graphics, Some(QueueSlot { family: 0, index: 0 }));
        assert_eq!(plan.compute, Some(QueueSlot { family: 1, index: 0 }));
        assert_eq!(plan.claims(), &[(0, 1), (1, 1)]);
    }

    #[test]
    fn single_queue_single_family_cannot_serve_both_roles() {
        let families = [family(0, 1, GRAPHICS_FLAGS, false)];
        let graphics_ranked = rank_families(&families, GRAPHICS_FLAGS);
        let compute_ranked = rank_families(&families, COMPUTE_FLAGS);

        let err =
            plan_queues(&families, &graphics_ranked, &compute_ranked, &request(true, true, false))
                .unwrap_err();
        assert!(matches!(
            err,
            RhiError::NoSuitableQueueFamily { role: "compute" }
        ));
    }

    #[test]
    fn dedicated_compute_family_gets_its_own_claim() {
        let families = [
            family(0, 1, GRAPHICS_FLAGS, true),
            family(1, 4, COMPUTE_FLAGS, false),
        ];
        let graphics_ranked = rank_families(&families, GRAPHICS_FLAGS);
        let compute_ranked = rank_families(&families, COMPUTE_FLAGS);
        assert_eq!(compute_ranked.first(), Some(&1));

        let plan =
            plan_queues(&families, &graphics_ranked, &compute_ranked, &request(true, true, true))
                .unwrap();

        assert_eq!(plan.graphics, Some(QueueSlot { family: 0, index: 0 }));
        assert_eq!(plan.compute, Some(QueueSlot { family: 1, index: 0 }));
        // Graphics family supports presentation, so it is reused.
        assert_eq!(plan.present, Some(QueueSlot { family: 0, index: 0 }));
        assert_eq!(plan.distinct_families(), vec![0, 1]);
    }

    #[test]
    fn presentation_scans_families_in_index_order() {
        let families = [
            family(0, 1, GRAPHICS_FLAGS, false),
            family(1, 1, vk::QueueFlags::TRANSFER, true),
            family(2, 1, vk::QueueFlags::TRANSFER, true),
        ];
        let graphics_ranked = rank_families(&families, GRAPHICS_FLAGS);

        let plan = plan_queues(&families, &graphics_ranked, &[], &request(true, false, true))
            .unwrap();

        assert_eq!(plan.present, Some(QueueSlot { family: 1, index: 0 }));
        assert_eq!(plan.claims(), &[(0, 1), (1, 1)]);
    }

    #[test]
    fn no_presentation_capable_family_is_an_error() {
        let families = [family(0, 1, GRAPHICS_FLAGS, false)];
        let graphics_ranked = rank_families(&families, GRAPHICS_FLAGS);

        let err = plan_queues(&families, &graphics_ranked, &[], &request(true, false, true))
            .unwrap_err();
        assert!(matches!(
            err,
            RhiError::NoSuitableQueueFamily {
                role: "presentation"
            }
        ));
    }
}
