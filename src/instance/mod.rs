//! Instance, surface, and logical device creation.

mod creator;
mod debug;
mod scoring;

pub use self::{
    creator::{InstanceCreator, PhysicalDeviceInfo},
    debug::{messenger_create_info, severity_level},
    scoring::{
        pick_best, score_device, select_queue_families, DeviceCapabilities,
        QueueFamilies, QueueFamilySupport,
    },
};
