use {
    crate::{
        frame::{FrameQueues, SurfaceContext},
        instance::{
            debug::messenger_create_info, pick_best, select_queue_families,
            DeviceCapabilities, QueueFamilies, QueueFamilySupport,
        },
        pipeline::DeviceIdentity,
        pretty_wrappers::PrettyHex,
        MemoryProperties, RendererConfig, RendererError,
    },
    anyhow::Context,
    ash::vk,
    indoc::indoc,
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    std::ffi::{c_char, CStr, CString},
};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

type DebugMessenger =
    (ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT);

/// The properties of the chosen physical device the rest of the renderer
/// needs to know about.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub name: String,
    pub api_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub pipeline_cache_uuid: [u8; vk::UUID_SIZE],
    pub min_uniform_alignment: u64,
    pub max_sampler_anisotropy: f32,
}

impl PhysicalDeviceInfo {
    fn new(properties: &vk::PhysicalDeviceProperties) -> Self {
        Self {
            name: device_name(properties),
            api_version: properties.api_version,
            vendor_id: properties.vendor_id,
            device_id: properties.device_id,
            device_type: properties.device_type,
            pipeline_cache_uuid: properties.pipeline_cache_uuid,
            min_uniform_alignment: properties
                .limits
                .min_uniform_buffer_offset_alignment,
            max_sampler_anisotropy: properties.limits.max_sampler_anisotropy,
        }
    }
}

impl std::fmt::Display for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            indoc!(
                "
                {} ({:?})
                  api version: {}.{}.{}
                  vendor: {}, device: {}
                  min uniform alignment: {}
                  max sampler anisotropy: {}"
            ),
            self.name,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            PrettyHex(self.vendor_id),
            PrettyHex(self.device_id),
            self.min_uniform_alignment,
            self.max_sampler_anisotropy,
        ))
    }
}

/// The Vulkan instance, window surface, and logical device.
///
/// Owns every object it creates. Everything else in the renderer borrows
/// clones of the device function table and must be destroyed before this
/// is dropped.
pub struct InstanceCreator {
    _entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<DebugMessenger>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue_families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    info: PhysicalDeviceInfo,
    memory_properties: MemoryProperties,
}

// Public API
// ----------

impl InstanceCreator {
    /// Create the instance, a surface for the window, and a logical device
    /// on the best scoring physical device.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the window must outlive the returned value
    ///   - every object created from the device must be destroyed before
    ///     this value is dropped
    pub unsafe fn new<W>(
        window: &W,
        config: &RendererConfig,
    ) -> Result<Self, RendererError>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display_handle = window
            .display_handle()
            .map_err(|error| {
                anyhow::anyhow!(
                    "Unable to get the window's display handle: {:?}",
                    error
                )
            })?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|error| {
                anyhow::anyhow!("Unable to get the window handle: {:?}", error)
            })?
            .as_raw();

        let entry = ash::Entry::load().map_err(|error| {
            anyhow::anyhow!("Unable to load the Vulkan library: {}", error)
        })?;

        let (instance, debug_enabled) =
            create_instance(&entry, display_handle, config)?;
        let debug = if debug_enabled {
            create_messenger(&entry, &instance)
        } else {
            None
        };
        let surface_loader =
            ash::khr::surface::Instance::new(&entry, &instance);

        let surface = match ash_window::create_surface(
            &entry,
            &instance,
            display_handle,
            window_handle,
            None,
        ) {
            Ok(surface) => surface,
            Err(result) => {
                destroy_instance(&instance, debug.as_ref());
                return Err(anyhow::Error::new(result)
                    .context("Unable to create the window surface")
                    .into());
            }
        };

        let selected = select_physical_device(
            &instance,
            &surface_loader,
            surface,
            &config.required_device_extensions,
        );
        let (physical_device, capabilities, queue_families) = match selected
        {
            Ok(selected) => selected,
            Err(error) => {
                surface_loader.destroy_surface(surface, None);
                destroy_instance(&instance, debug.as_ref());
                return Err(error);
            }
        };

        let properties =
            instance.get_physical_device_properties(physical_device);
        let info = PhysicalDeviceInfo::new(&properties);
        log::info!("Selected physical device:\n{}", info);

        let device = match create_logical_device(
            &instance,
            physical_device,
            &capabilities,
            queue_families,
            &config.required_device_extensions,
        ) {
            Ok(device) => device,
            Err(error) => {
                surface_loader.destroy_surface(surface, None);
                destroy_instance(&instance, debug.as_ref());
                return Err(error);
            }
        };
        let graphics_queue =
            device.get_device_queue(queue_families.graphics, 0);
        let present_queue = device.get_device_queue(queue_families.present, 0);

        let memory_properties =
            MemoryProperties::new(&instance, physical_device);
        log::debug!("{}", memory_properties);

        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
            physical_device,
            device,
            queue_families,
            graphics_queue,
            present_queue,
            info,
            memory_properties,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn info(&self) -> &PhysicalDeviceInfo {
        &self.info
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    pub fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    /// What the swapchain needs to query and target the window surface.
    pub fn surface_context(&self) -> SurfaceContext {
        SurfaceContext {
            instance: self.instance.clone(),
            surface_loader: self.surface_loader.clone(),
            surface: self.surface,
            physical_device: self.physical_device,
            graphics_family: self.queue_families.graphics,
            present_family: self.queue_families.present,
        }
    }

    pub fn frame_queues(&self) -> FrameQueues {
        FrameQueues {
            graphics_family: self.queue_families.graphics,
            graphics: self.graphics_queue,
            present: self.present_queue,
        }
    }

    /// The identifiers a pipeline cache blob must carry to be reused on this
    /// device.
    pub fn device_identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: self.info.vendor_id,
            device_id: self.info.device_id,
            pipeline_cache_uuid: self.info.pipeline_cache_uuid,
        }
    }
}

impl Drop for InstanceCreator {
    fn drop(&mut self) {
        unsafe {
            if let Err(error) = self.device.device_wait_idle() {
                log::warn!("Unable to wait for the device to idle: {}", error);
            }
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            destroy_instance(&self.instance, self.debug.as_ref());
        }
    }
}

// Private API
// -----------

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    properties
        .device_name_as_c_str()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unnamed device".to_owned())
}

/// Create the instance with the window system extensions. Returns true when
/// the validation layer and debug utils were enabled.
unsafe fn create_instance(
    entry: &ash::Entry,
    display_handle: raw_window_handle::RawDisplayHandle,
    config: &RendererConfig,
) -> Result<(ash::Instance, bool), RendererError> {
    let mut extensions: Vec<*const c_char> =
        ash_window::enumerate_required_extensions(display_handle)
            .context("Unable to list the window system extensions")?
            .to_vec();
    let mut layers: Vec<*const c_char> = vec![];

    let debug_enabled =
        config.enable_validation && validation_available(entry);
    if debug_enabled {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    } else if config.enable_validation {
        log::warn!("Validation was requested but the layer is not installed");
    }

    let application_name = CString::new(config.application_name.clone())
        .context("The application name contains a nul byte")?;
    let app_info = vk::ApplicationInfo::default()
        .application_name(&application_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(c"DENG")
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_1);

    let mut debug_info = messenger_create_info();
    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);
    if debug_enabled {
        // report problems with instance creation itself
        create_info = create_info.push_next(&mut debug_info);
    }

    let instance = entry
        .create_instance(&create_info, None)
        .context("Unable to create the Vulkan instance")?;
    Ok((instance, debug_enabled))
}

unsafe fn validation_available(entry: &ash::Entry) -> bool {
    let layers = entry
        .enumerate_instance_layer_properties()
        .unwrap_or_default();
    let extensions = entry
        .enumerate_instance_extension_properties(None)
        .unwrap_or_default();
    let has_layer = layers
        .iter()
        .any(|layer| layer.layer_name_as_c_str() == Ok(VALIDATION_LAYER));
    let has_debug_utils = extensions.iter().any(|extension| {
        extension.extension_name_as_c_str() == Ok(ash::ext::debug_utils::NAME)
    });
    has_layer && has_debug_utils
}

/// A failed messenger only costs the validation output.
unsafe fn create_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
) -> Option<DebugMessenger> {
    let loader = ash::ext::debug_utils::Instance::new(entry, instance);
    match loader.create_debug_utils_messenger(&messenger_create_info(), None) {
        Ok(messenger) => Some((loader, messenger)),
        Err(result) => {
            log::warn!("Unable to create the debug messenger: {}", result);
            None
        }
    }
}

unsafe fn destroy_instance(
    instance: &ash::Instance,
    debug: Option<&DebugMessenger>,
) {
    if let Some((loader, messenger)) = debug {
        loader.destroy_debug_utils_messenger(*messenger, None);
    }
    instance.destroy_instance(None);
}

fn required_extension_names(extra: &[String]) -> Vec<String> {
    let mut names =
        vec![ash::khr::swapchain::NAME.to_string_lossy().into_owned()];
    for name in extra {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

/// Query everything scoring needs to know about one physical device.
unsafe fn query_capabilities(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> DeviceCapabilities {
    let properties = instance.get_physical_device_properties(physical_device);
    let features = instance.get_physical_device_features(physical_device);
    let extensions = instance
        .enumerate_device_extension_properties(physical_device)
        .unwrap_or_default()
        .iter()
        .filter_map(|extension| {
            extension
                .extension_name_as_c_str()
                .ok()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .collect();
    let surface_format_count = surface_loader
        .get_physical_device_surface_formats(physical_device, surface)
        .map(|formats| formats.len())
        .unwrap_or(0);
    let present_mode_count = surface_loader
        .get_physical_device_surface_present_modes(physical_device, surface)
        .map(|modes| modes.len())
        .unwrap_or(0);
    let limits = &properties.limits;

    DeviceCapabilities {
        name: device_name(&properties),
        vendor_id: properties.vendor_id,
        device_id: properties.device_id,
        device_type: properties.device_type,
        sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
        fill_mode_non_solid: features.fill_mode_non_solid == vk::TRUE,
        geometry_shader: features.geometry_shader == vk::TRUE,
        max_image_dimension_2d: limits.max_image_dimension2_d,
        max_image_dimension_3d: limits.max_image_dimension3_d,
        max_memory_allocation_count: limits.max_memory_allocation_count,
        max_vertex_output_components: limits.max_vertex_output_components,
        extensions,
        surface_format_count,
        present_mode_count,
    }
}

unsafe fn queue_family_support(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Vec<QueueFamilySupport> {
    instance
        .get_physical_device_queue_family_properties(physical_device)
        .iter()
        .enumerate()
        .map(|(index, family)| QueueFamilySupport {
            graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present: surface_loader
                .get_physical_device_surface_support(
                    physical_device,
                    index as u32,
                    surface,
                )
                .unwrap_or(false),
        })
        .collect()
}

type SelectedDevice = (vk::PhysicalDevice, DeviceCapabilities, QueueFamilies);

/// Score every physical device and keep the best one which has usable
/// queue families.
unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    required_extensions: &[String],
) -> Result<SelectedDevice, RendererError> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .context("Unable to enumerate physical devices")?;
    let required = required_extension_names(required_extensions);

    let mut candidates = vec![];
    for physical_device in physical_devices {
        let capabilities = query_capabilities(
            instance,
            surface_loader,
            surface,
            physical_device,
        );
        log::trace!("Found physical device:\n{}", capabilities);
        let support = queue_family_support(
            instance,
            surface_loader,
            surface,
            physical_device,
        );
        match select_queue_families(&support) {
            Some(families) => {
                candidates.push((physical_device, capabilities, families))
            }
            None => log::warn!(
                "Skipping {}, no queue family can draw and present",
                capabilities.name
            ),
        }
    }

    let capabilities: Vec<DeviceCapabilities> = candidates
        .iter()
        .map(|(_, capabilities, _)| capabilities.clone())
        .collect();
    let best = pick_best(&capabilities, &required)
        .ok_or(RendererError::NoSuitableDevice)?;
    Ok(candidates.swap_remove(best))
}

unsafe fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    capabilities: &DeviceCapabilities,
    queue_families: QueueFamilies,
    required_extensions: &[String],
) -> Result<ash::Device, RendererError> {
    let priorities = [1.0];
    let mut queue_infos = vec![vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_families.graphics)
        .queue_priorities(&priorities)];
    if !queue_families.is_shared() {
        queue_infos.push(
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_families.present)
                .queue_priorities(&priorities),
        );
    }

    let features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(true)
        .geometry_shader(capabilities.geometry_shader)
        .fill_mode_non_solid(capabilities.fill_mode_non_solid);

    let extension_names = required_extension_names(required_extensions)
        .into_iter()
        .map(CString::new)
        .collect::<Result<Vec<_>, _>>()
        .context("A device extension name contains a nul byte")?;
    let extension_ptrs: Vec<*const c_char> =
        extension_names.iter().map(|name| name.as_ptr()).collect();

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extension_ptrs)
        .enabled_features(&features);
    let device = instance
        .create_device(physical_device, &create_info, None)
        .with_context(|| {
            format!(
                "Unable to create a logical device on {}",
                capabilities.name
            )
        })?;
    Ok(device)
}
