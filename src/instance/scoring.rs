use {
    crate::pretty_wrappers::PrettyHex,
    ash::vk,
    indoc::indoc,
};

/// The properties of a physical device which decide whether, and how much,
/// the renderer wants to use it.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub sampler_anisotropy: bool,
    pub fill_mode_non_solid: bool,
    pub geometry_shader: bool,
    pub max_image_dimension_2d: u32,
    pub max_image_dimension_3d: u32,
    pub max_memory_allocation_count: u32,
    pub max_vertex_output_components: u32,
    pub extensions: Vec<String>,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
}

impl std::fmt::Display for DeviceCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            indoc!(
                "
                {} ({:?}, vendor {}, device {})
                  anisotropy: {}, fill mode non solid: {}, geometry: {}
                  max image 2D: {}, max image 3D: {}
                  max allocations: {}, max vertex outputs: {}
                  surface formats: {}, present modes: {}"
            ),
            self.name,
            self.device_type,
            PrettyHex(self.vendor_id),
            PrettyHex(self.device_id),
            self.sampler_anisotropy,
            self.fill_mode_non_solid,
            self.geometry_shader,
            self.max_image_dimension_2d,
            self.max_image_dimension_3d,
            self.max_memory_allocation_count,
            self.max_vertex_output_components,
            self.surface_format_count,
            self.present_mode_count,
        ))
    }
}

/// Score a device. Higher is better, zero means unusable.
///
/// Devices without sampler anisotropy or without one of the required
/// extensions score zero.
pub fn score_device(
    device: &DeviceCapabilities,
    required_extensions: &[String],
) -> u64 {
    if !device.sampler_anisotropy {
        log::debug!("{} does not support sampler anisotropy", device.name);
        return 0;
    }
    if let Some(missing) = required_extensions
        .iter()
        .find(|required| !device.extensions.contains(required))
    {
        log::warn!(
            "{} does not support the required extension {}",
            device.name,
            missing
        );
        return 0;
    }

    let mut score: u64 = 0;
    if device.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score = score.saturating_add(1000);
    }
    if device.fill_mode_non_solid {
        score = score.saturating_add(500);
    }
    if device.geometry_shader {
        score = score.saturating_add(500);
    }
    [
        device.max_image_dimension_2d,
        device.max_image_dimension_3d,
        device.max_memory_allocation_count,
        device.max_vertex_output_components,
    ]
    .into_iter()
    .fold(score, |score, limit| score.saturating_add(limit as u64))
}

/// Pick the index of the best scoring device.
///
/// Devices which cannot present, because the surface reports no formats or
/// no present modes for them, are skipped with a warning. Returns None when
/// nothing is left or the best score is zero.
pub fn pick_best(
    candidates: &[DeviceCapabilities],
    required_extensions: &[String],
) -> Option<usize> {
    let (index, score) = candidates
        .iter()
        .enumerate()
        .filter(|(_, device)| {
            let can_present = device.surface_format_count > 0
                && device.present_mode_count > 0;
            if !can_present {
                log::warn!(
                    "Skipping {}, the surface reports {} formats and {} \
                     present modes",
                    device.name,
                    device.surface_format_count,
                    device.present_mode_count
                );
            }
            can_present
        })
        .map(|(index, device)| {
            let score = score_device(device, required_extensions);
            log::debug!("Device {} scored {}", device.name, score);
            (index, score)
        })
        .fold(None, |best: Option<(usize, u64)>, (index, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((index, score)),
        })?;
    (score > 0).then_some(index)
}

/// What a queue family can do.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct QueueFamilySupport {
    pub graphics: bool,
    pub present: bool,
}

/// The queue families the renderer submits and presents with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// True when one queue does both graphics and presentation.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Choose distinct graphics and present families when the device has them,
/// otherwise a single family which does both.
pub fn select_queue_families(
    families: &[QueueFamilySupport],
) -> Option<QueueFamilies> {
    let indexed = || {
        families
            .iter()
            .enumerate()
            .map(|(index, support)| (index as u32, *support))
    };
    let graphics = indexed().find(|(_, support)| support.graphics)?.0;
    if let Some((present, _)) =
        indexed().find(|(index, support)| support.present && *index != graphics)
    {
        return Some(QueueFamilies { graphics, present });
    }
    indexed()
        .find(|(_, support)| support.graphics && support.present)
        .map(|(index, _)| QueueFamilies {
            graphics: index,
            present: index,
        })
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    fn swapchain_extension() -> Vec<String> {
        vec!["VK_KHR_swapchain".to_owned()]
    }

    fn device(name: &str) -> DeviceCapabilities {
        DeviceCapabilities {
            name: name.to_owned(),
            device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
            sampler_anisotropy: true,
            max_image_dimension_2d: 16384,
            max_image_dimension_3d: 2048,
            max_memory_allocation_count: 4096,
            max_vertex_output_components: 128,
            extensions: swapchain_extension(),
            surface_format_count: 2,
            present_mode_count: 1,
            ..DeviceCapabilities::default()
        }
    }

    #[test]
    fn test_score_adds_features_and_limits() {
        let integrated = device("integrated");
        let discrete = DeviceCapabilities {
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            fill_mode_non_solid: true,
            geometry_shader: true,
            ..device("discrete")
        };
        let limits = 16384 + 2048 + 4096 + 128;
        assert_eq!(score_device(&integrated, &swapchain_extension()), limits);
        assert_eq!(
            score_device(&discrete, &swapchain_extension()),
            limits + 2000
        );
    }

    #[test]
    fn test_missing_anisotropy_or_extension_scores_zero() {
        let no_anisotropy = DeviceCapabilities {
            sampler_anisotropy: false,
            ..device("a")
        };
        let no_swapchain = DeviceCapabilities {
            extensions: vec![],
            ..device("b")
        };
        assert_eq!(score_device(&no_anisotropy, &swapchain_extension()), 0);
        assert_eq!(score_device(&no_swapchain, &swapchain_extension()), 0);
    }

    #[test]
    fn test_large_limits_do_not_overflow() {
        let huge = DeviceCapabilities {
            max_image_dimension_2d: u32::MAX,
            max_image_dimension_3d: u32::MAX,
            max_memory_allocation_count: u32::MAX,
            max_vertex_output_components: u32::MAX,
            ..device("huge")
        };
        assert_eq!(score_device(&huge, &[]), 4 * u32::MAX as u64);
    }

    #[test]
    fn test_pick_best_prefers_discrete() {
        let candidates = vec![
            device("integrated"),
            DeviceCapabilities {
                device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
                ..device("discrete")
            },
        ];
        assert_eq!(pick_best(&candidates, &swapchain_extension()), Some(1));
    }

    #[test]
    fn test_pick_best_skips_devices_which_cannot_present() {
        let candidates = vec![
            DeviceCapabilities {
                device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
                present_mode_count: 0,
                ..device("headless")
            },
            device("integrated"),
        ];
        assert_eq!(pick_best(&candidates, &swapchain_extension()), Some(1));
    }

    #[test]
    fn test_pick_best_fails_when_every_score_is_zero() {
        let candidates = vec![DeviceCapabilities {
            sampler_anisotropy: false,
            ..device("old")
        }];
        assert_eq!(pick_best(&candidates, &swapchain_extension()), None);
        assert_eq!(pick_best(&[], &swapchain_extension()), None);
    }

    #[test]
    fn test_ties_keep_the_first_device() {
        let candidates = vec![device("first"), device("second")];
        assert_eq!(pick_best(&candidates, &[]), Some(0));
    }

    #[test]
    fn test_distinct_queue_families_are_preferred() {
        let families = [
            QueueFamilySupport {
                graphics: true,
                present: true,
            },
            QueueFamilySupport {
                graphics: false,
                present: true,
            },
        ];
        let selected = select_queue_families(&families).unwrap();
        assert_eq!(
            selected,
            QueueFamilies {
                graphics: 0,
                present: 1
            }
        );
        assert!(!selected.is_shared());
    }

    #[test]
    fn test_shared_queue_family_fallback() {
        let families = [
            QueueFamilySupport {
                graphics: false,
                present: false,
            },
            QueueFamilySupport {
                graphics: true,
                present: true,
            },
        ];
        let selected = select_queue_families(&families).unwrap();
        assert!(selected.is_shared());
        assert_eq!(selected.graphics, 1);
    }

    #[test]
    fn test_no_graphics_family() {
        let families = [QueueFamilySupport {
            graphics: false,
            present: true,
        }];
        assert_eq!(select_queue_families(&families), None);
    }
}
