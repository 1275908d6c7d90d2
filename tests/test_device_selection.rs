//! Tests for physical device and queue family selection.

use {
    ash::vk,
    deng_vulkan::instance::{
        pick_best, score_device, select_queue_families, DeviceCapabilities,
        QueueFamilySupport,
    },
    pretty_assertions::assert_eq,
};

mod common;

fn required() -> Vec<String> {
    vec!["VK_KHR_swapchain".to_owned()]
}

fn candidate(
    name: &str,
    device_type: vk::PhysicalDeviceType,
) -> DeviceCapabilities {
    DeviceCapabilities {
        name: name.to_owned(),
        vendor_id: 0x10de,
        device_id: 0x2484,
        device_type,
        sampler_anisotropy: true,
        fill_mode_non_solid: true,
        geometry_shader: true,
        max_image_dimension_2d: 32768,
        max_image_dimension_3d: 16384,
        max_memory_allocation_count: 4096,
        max_vertex_output_components: 128,
        extensions: vec![
            "VK_KHR_swapchain".to_owned(),
            "VK_KHR_maintenance1".to_owned(),
        ],
        surface_format_count: 3,
        present_mode_count: 2,
    }
}

#[test]
fn test_laptop_with_hybrid_graphics() {
    common::setup_logger();

    let integrated =
        candidate("integrated", vk::PhysicalDeviceType::INTEGRATED_GPU);
    let discrete = DeviceCapabilities {
        max_image_dimension_2d: 16384,
        max_image_dimension_3d: 2048,
        ..candidate("discrete", vk::PhysicalDeviceType::DISCRETE_GPU)
    };
    let software = DeviceCapabilities {
        sampler_anisotropy: false,
        ..candidate("llvmpipe", vk::PhysicalDeviceType::CPU)
    };
    for device in [&integrated, &discrete, &software] {
        log::info!("{}", device);
    }

    assert_eq!(score_device(&software, &required()), 0);
    assert!(
        score_device(&integrated, &required())
            > score_device(&discrete, &required()),
        "larger limits outweigh the discrete bonus"
    );
    assert_eq!(
        pick_best(&[software, discrete, integrated], &required()),
        Some(2)
    );
}

#[test]
fn test_headless_devices_are_never_picked() {
    common::setup_logger();

    let headless = DeviceCapabilities {
        surface_format_count: 0,
        ..candidate("headless", vk::PhysicalDeviceType::DISCRETE_GPU)
    };
    let without_swapchain = DeviceCapabilities {
        extensions: vec![],
        ..candidate("compute", vk::PhysicalDeviceType::DISCRETE_GPU)
    };
    assert_eq!(pick_best(&[headless, without_swapchain], &required()), None);
}

#[test]
fn test_queue_families_of_common_drivers() {
    common::setup_logger();

    // graphics, compute, transfer with presentation everywhere
    let shared = [
        QueueFamilySupport {
            graphics: true,
            present: true,
        },
        QueueFamilySupport {
            graphics: false,
            present: true,
        },
        QueueFamilySupport::default(),
    ];
    let families = select_queue_families(&shared);
    assert_eq!(families.map(|families| families.graphics), Some(0));
    assert_eq!(families.map(|families| families.present), Some(1));

    let single = [QueueFamilySupport {
        graphics: true,
        present: true,
    }];
    let selected = select_queue_families(&single);
    assert_eq!(selected.map(|families| families.is_shared()), Some(true));
}
