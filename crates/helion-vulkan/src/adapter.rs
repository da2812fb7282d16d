//! Physical device profiling, scoring, and selection.

use std::collections::HashSet;
use std::ffi::CStr;

use ash::vk;
use bitflags::bitflags;
use helion_rhi::{Result, RhiError};

use crate::queue::{rank_families, COMPUTE_FLAGS, GRAPHICS_FLAGS};

/// Score sentinel marking a device that failed a hard requirement.
pub const DISQUALIFIED: f32 = -10_000.0;

bitflags! {
    /// Device features a capability request may require.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceFeatures: u32 {
        const SAMPLER_ANISOTROPY = 1 << 0;
        const GEOMETRY_SHADER = 1 << 1;
        const FILL_MODE_NON_SOLID = 1 << 2;
        const WIDE_LINES = 1 << 3;
    }
}

impl DeviceFeatures {
    /// Collect the subset of these features a device reports support for.
    #[must_use]
    pub fn supported_by(features: &vk::PhysicalDeviceFeatures) -> Self {
        let mut supported = Self::empty();
        if features.sampler_anisotropy == vk::TRUE {
            supported |= Self::SAMPLER_ANISOTROPY;
        }
        if features.geometry_shader == vk::TRUE {
            supported |= Self::GEOMETRY_SHADER;
        }
        if features.fill_mode_non_solid == vk::TRUE {
            supported |= Self::FILL_MODE_NON_SOLID;
        }
        if features.wide_lines == vk::TRUE {
            supported |= Self::WIDE_LINES;
        }
        supported
    }

    /// Express these features as the enable struct for device creation.
    #[must_use]
    pub fn to_vk(self) -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(self.contains(Self::SAMPLER_ANISOTROPY))
            .geometry_shader(self.contains(Self::GEOMETRY_SHADER))
            .fill_mode_non_solid(self.contains(Self::FILL_MODE_NON_SOLID))
            .wide_lines(self.contains(Self::WIDE_LINES))
    }
}

/// Capability mix a device must provide.
#[derive(Debug, Clone, Default)]
pub struct DeviceRequest {
    /// A graphics queue is needed.
    pub use_graphics: bool,
    /// A compute queue is needed.
    pub use_compute: bool,
    /// A presentation-capable queue is needed.
    pub require_present: bool,
    /// Extensions the device must advertise (exact name match).
    pub required_extensions: Vec<&'static CStr>,
    /// Features the device must support.
    pub required_features: DeviceFeatures,
}

/// Snapshot of one queue family, taken during profiling.
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyInfo {
    /// Family index as reported by the device.
    pub index: u32,
    /// Total queues the family offers.
    pub count: u32,
    /// Capability flags.
    pub flags: vk::QueueFlags,
    /// Whether the family can present to the requested surface.
    pub present_capable: bool,
}

/// Immutable snapshot of one physical device, built fresh per selection
/// pass and discarded after device creation.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    /// Device name for logging.
    pub name: String,
    /// Reported device type.
    pub device_type: vk::PhysicalDeviceType,
    /// Available extension names.
    pub extensions: HashSet<String>,
    /// Supported features, restricted to the ones we can request.
    pub features: DeviceFeatures,
    /// Queue family table, indexed by family index.
    pub families: Vec<QueueFamilyInfo>,
}

impl DeviceProfile {
    /// Query a profile from a live physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid, and `surface` (when
    /// supplied) must belong to `surface_loader`.
    pub unsafe fn query(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        surface: Option<(&ash::khr::surface::Instance, vk::SurfaceKHR)>,
    ) -> Result<Self> {
        let properties = instance.get_physical_device_properties(physical_device);
        let features = instance.get_physical_device_features(physical_device);
        let family_properties =
            instance.get_physical_device_queue_family_properties(physical_device);

        let extensions: HashSet<String> = instance
            .enumerate_device_extension_properties(physical_device)
            .unwrap_or_default()
            .iter()
            .filter_map(|ext| {
                CStr::from_ptr(ext.extension_name.as_ptr())
                    .to_str()
                    .ok()
                    .map(String::from)
            })
            .collect();

        let name = CStr::from_ptr(properties.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        let mut families = Vec::with_capacity(family_properties.len());
        for (index, family) in family_properties.iter().enumerate() {
            let index = index as u32;
            let present_capable = match surface {
                Some((loader, surface)) => loader
                    .get_physical_device_surface_support(physical_device, index, surface)
                    .unwrap_or(false),
                None => false,
            };
            families.push(QueueFamilyInfo {
                index,
                count: family.queue_count,
                flags: family.queue_flags,
                present_capable,
            });
        }

        Ok(Self {
            name,
            device_type: properties.device_type,
            extensions,
            features: DeviceFeatures::supported_by(&features),
            families,
        })
    }
}

/// Outcome of scoring one profile: the score plus the queue rankings the
/// planner will consume.
#[derive(Debug, Clone)]
pub struct ScoredProfile {
    pub score: f32,
    pub graphics_ranked: Vec<u32>,
    pub compute_ranked: Vec<u32>,
}

impl ScoredProfile {
    fn disqualified() -> Self {
        Self {
            score: DISQUALIFIED,
            graphics_ranked: Vec::new(),
            compute_ranked: Vec::new(),
        }
    }
}

/// Score a device profile against a capability request.
///
/// Missing extensions, missing features, or an unsatisfiable queue role
/// disqualify the device outright. Otherwise the score rewards discrete
/// GPUs, a presentation-capable top graphics family, and a dedicated
/// compute family.
#[must_use]
pub fn score_profile(profile: &DeviceProfile, request: &DeviceRequest) -> ScoredProfile {
    for extension in &request.required_extensions {
        let Ok(name) = extension.to_str() else {
            return ScoredProfile::disqualified();
        };
        if !profile.extensions.contains(name) {
            return ScoredProfile::disqualified();
        }
    }

    if !profile.features.contains(request.required_features) {
        return ScoredProfile::disqualified();
    }

    let mut graphics_ranked = Vec::new();
    if request.use_graphics {
        graphics_ranked = rank_families(&profile.families, GRAPHICS_FLAGS);
        if graphics_ranked.is_empty() {
            return ScoredProfile::disqualified();
        }
    }

    let mut compute_ranked = Vec::new();
    if request.use_compute {
        compute_ranked = rank_families(&profile.families, COMPUTE_FLAGS);
        if compute_ranked.is_empty() {
            return ScoredProfile::disqualified();
        }
    }

    if request.require_present && !profile.families.iter().any(|f| f.present_capable) {
        return ScoredProfile::disqualified();
    }

    let mut score = if profile.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        1000.0
    } else {
        10.0
    };

    if request.require_present && request.use_graphics {
        let top_graphics = graphics_ranked[0];
        if profile.families[top_graphics as usize].present_capable {
            score += 1000.0;
        }
    }

    if request.use_graphics
        && request.use_compute
        && graphics_ranked.first() != compute_ranked.first()
    {
        score += 100.0;
    }

    ScoredProfile {
        score,
        graphics_ranked,
        compute_ranked,
    }
}

/// The chosen device among all enumerated profiles.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Index into the profile list passed to [`select_device`].
    pub device_index: usize,
    /// Scoring outcome for the winner.
    pub scored: ScoredProfile,
}

/// Pick the highest-scoring profile; ties break to enumeration order.
pub fn select_device(profiles: &[DeviceProfile], request: &DeviceRequest) -> Result<Selection> {
    let mut best: Option<Selection> = None;

    for (device_index, profile) in profiles.iter().enumerate() {
        let scored = score_profile(profile, request);
        let beats_best = best
            .as_ref()
            .map_or(true, |current| scored.score > current.scored.score);
        if beats_best {
            best = Some(Selection {
                device_index,
                scored,
            });
        }
    }

    match best {
        Some(selection) if selection.scored.score >= 0.0 => Ok(selection),
        _ => Err(RhiError::NoSuitableDevice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPCHAIN_EXT: &str = "VK_KHR_swapchain";

    fn profile(
        device_type: vk::PhysicalDeviceType,
        extensions: &[&str],
        features: DeviceFeatures,
        families: Vec<QueueFamilyInfo>,
    ) -> DeviceProfile {
        DeviceProfile {
            name: "test".to_string(),
            device_type,
            extensions: extensions.iter().map(|s| (*s).to_string()).collect(),
            features,
            families,
        }
    }

    fn family(index: u32, flags: vk::QueueFlags, present: bool) -> QueueFamilyInfo {
        QueueFamilyInfo {
            index,
            count: 4,
            flags,
            present_capable: present,
        }
    }

    fn request() -> DeviceRequest {
        DeviceRequest {
            use_graphics: true,
            use_compute: true,
            require_present: true,
            required_extensions: vec![ash::khr::swapchain::NAME],
            required_features: DeviceFeatures::SAMPLER_ANISOTROPY,
        }
    }

    #[test]
    fn missing_extension_disqualifies() {
        let profile = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![family(0, GRAPHICS_FLAGS, true)],
        );
        assert_eq!(score_profile(&profile, &request()).score, DISQUALIFIED);
    }

    #[test]
    fn missing_feature_disqualifies() {
        let profile = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[SWAPCHAIN_EXT],
            DeviceFeatures::empty(),
            vec![family(0, GRAPHICS_FLAGS, true)],
        );
        assert_eq!(score_profile(&profile, &request()).score, DISQUALIFIED);
    }

    #[test]
    fn no_presentation_capable_family_disqualifies() {
        let profile = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[SWAPCHAIN_EXT],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![family(0, GRAPHICS_FLAGS, false)],
        );
        assert_eq!(score_profile(&profile, &request()).score, DISQUALIFIED);
    }

    #[test]
    fn integrated_device_scores_positive_baseline() {
        let profile = profile(
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            &[SWAPCHAIN_EXT],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![family(0, GRAPHICS_FLAGS, true)],
        );
        let scored = score_profile(&profile, &request());
        assert!(scored.score > 0.0);
    }

    #[test]
    fn dedicated_compute_family_earns_bonus() {
        let shared = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[SWAPCHAIN_EXT],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![family(0, GRAPHICS_FLAGS, true)],
        );
        let split = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[SWAPCHAIN_EXT],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![
                family(0, GRAPHICS_FLAGS, true),
                family(1, COMPUTE_FLAGS, false),
            ],
        );
        assert!(
            score_profile(&split, &request()).score > score_profile(&shared, &request()).score
        );
    }

    #[test]
    fn discrete_device_wins_regardless_of_order() {
        let integrated_missing_ext = profile(
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            &[],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![family(0, GRAPHICS_FLAGS, true)],
        );
        let discrete = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[SWAPCHAIN_EXT],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![family(0, GRAPHICS_FLAGS, true)],
        );

        let selection =
            select_device(&[integrated_missing_ext.clone(), discrete.clone()], &request())
                .unwrap();
        assert_eq!(selection.device_index, 1);

        let selection =
            select_device(&[discrete, integrated_missing_ext], &request()).unwrap();
        assert_eq!(selection.device_index, 0);
    }

    #[test]
    fn ties_break_to_enumeration_order() {
        let a = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[SWAPCHAIN_EXT],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![family(0, GRAPHICS_FLAGS, true)],
        );
        let selection = select_device(&[a.clone(), a], &request()).unwrap();
        assert_eq!(selection.device_index, 0);
    }

    #[test]
    fn all_disqualified_is_an_error() {
        let profile = profile(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            &[],
            DeviceFeatures::SAMPLER_ANISOTROPY,
            vec![family(0, GRAPHICS_FLAGS, true)],
        );
        let err = select_device(&[profile], &request()).unwrap_err();
        assert!(matches!(err, RhiError::NoSuitableDevice));

        let err = select_device(&[], &request()).unwrap_err();
        assert!(matches!(err, RhiError::NoSuitableDevice));
    }

    #[test]
    fn winner_satisfies_required_extensions() {
        let candidates = [
            profile(
                vk::PhysicalDeviceType::DISCRETE_GPU,
                &[],
                DeviceFeatures::SAMPLER_ANISOTROPY,
                vec![family(0, GRAPHICS_FLAGS, true)],
            ),
            profile(
                vk::PhysicalDeviceType::INTEGRATED_GPU,
                &[SWAPCHAIN_EXT],
                DeviceFeatures::SAMPLER_ANISOTROPY,
                vec![family(0, GRAPHICS_FLAGS, true)],
            ),
        ];
        let selection = select_device(&candidates, &request()).unwrap();
        assert!(candidates[selection.device_index]
            .extensions
            .contains(SWAPCHAIN_EXT));
    }
}
