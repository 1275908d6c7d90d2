use {crate::RendererError, anyhow::Context, ash::vk};

/// Everything needed to (re)create a swapchain for the window surface.
#[derive(Clone)]
pub struct SurfaceContext {
    pub instance: ash::Instance,
    pub surface_loader: ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_family: u32,
    pub present_family: u32,
}

/// Prefer 8 bit BGRA sRGB, otherwise take whatever the surface lists first.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

/// Mailbox when available, FIFO is always supported.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|mode| *mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's current extent, or the desired extent clamped to the
/// surface limits when the surface lets the swapchain decide.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more image than the minimum, bounded by the maximum when there is one.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// The window's swapchain and a color view for each of its images.
pub struct Swapchain {
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
}

// Public API
// ----------

impl Swapchain {
    /// Create a swapchain for the surface.
    ///
    /// # Params
    ///
    /// * `device` - the logical device
    /// * `context` - the surface and queue families to present with
    /// * `desired` - the framebuffer size requested by the window
    /// * `previous` - the swapchain being replaced, if any
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - `destroy()` must be called before the device is destroyed
    ///   - `previous` must not be used for presentation afterwards
    pub unsafe fn new(
        device: &ash::Device,
        context: &SurfaceContext,
        desired: vk::Extent2D,
        previous: Option<&Swapchain>,
    ) -> Result<Self, RendererError> {
        let loader =
            ash::khr::swapchain::Device::new(&context.instance, device);
        let capabilities = context
            .surface_loader
            .get_physical_device_surface_capabilities(
                context.physical_device,
                context.surface,
            )
            .context("Unable to query the surface capabilities")?;
        let formats = context
            .surface_loader
            .get_physical_device_surface_formats(
                context.physical_device,
                context.surface,
            )
            .context("Unable to query the surface formats")?;
        let present_modes = context
            .surface_loader
            .get_physical_device_surface_present_modes(
                context.physical_device,
                context.surface,
            )
            .context("Unable to query the surface present modes")?;

        let format = choose_surface_format(&formats).ok_or(
            RendererError::Swapchain(vk::Result::ERROR_FORMAT_NOT_SUPPORTED),
        )?;
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&capabilities, desired);

        let queue_family_indices =
            [context.graphics_family, context.present_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(context.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(
                previous
                    .map(|swapchain| swapchain.swapchain)
                    .unwrap_or(vk::SwapchainKHR::null()),
            );
        create_info = if context.graphics_family != context.present_family {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = loader
            .create_swapchain(&create_info, None)
            .map_err(RendererError::Swapchain)?;

        let mut created = Self {
            loader,
            swapchain,
            format,
            extent,
            images: vec![],
            image_views: vec![],
        };
        if let Err(error) = created.create_image_views(device) {
            created.destroy(device);
            return Err(error);
        }

        log::debug!(
            "Created swapchain {}x{} with {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            created.images.len(),
            format.format,
            present_mode
        );
        Ok(created)
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Acquire the next image, None when the swapchain is out of date.
    ///
    /// # Safety
    ///
    /// Unsafe because the semaphore must be unsignaled with no pending
    /// signal operation.
    pub unsafe fn acquire_next_image(
        &self,
        image_available: vk::Semaphore,
    ) -> Result<Option<u32>, RendererError> {
        match self.loader.acquire_next_image(
            self.swapchain,
            u64::MAX,
            image_available,
            vk::Fence::null(),
        ) {
            Ok((index, _suboptimal)) => Ok(Some(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(error) => Err(RendererError::Swapchain(error)),
        }
    }

    /// Present an image. Returns true when the swapchain is suboptimal or
    /// out of date and should be recreated.
    ///
    /// # Safety
    ///
    /// Unsafe because the image must have been acquired and rendered.
    pub unsafe fn present(
        &self,
        queue: vk::Queue,
        render_finished: vk::Semaphore,
        image_index: u32,
    ) -> Result<bool, RendererError> {
        let wait_semaphores = [render_finished];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        match self.loader.queue_present(queue, &present_info) {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(error) => Err(RendererError::Swapchain(error)),
        }
    }

    /// # Safety
    ///
    /// Unsafe because the swapchain images must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        for view in self.image_views.drain(..) {
            device.destroy_image_view(view, None);
        }
        self.images.clear();
        self.loader.destroy_swapchain(self.swapchain, None);
        self.swapchain = vk::SwapchainKHR::null();
    }
}

// Private API
// -----------

impl Swapchain {
    unsafe fn create_image_views(
        &mut self,
        device: &ash::Device,
    ) -> Result<(), RendererError> {
        self.images = self
            .loader
            .get_swapchain_images(self.swapchain)
            .context("Unable to get the swapchain images")?;
        for image in &self.images {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(*image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = device
                .create_image_view(&create_info, None)
                .context("Unable to create a swapchain image view")?;
            self.image_views.push(view);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    fn surface_format(
        format: vk::Format,
        color_space: vk::ColorSpaceKHR,
    ) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn test_prefers_srgb_bgra() {
        let formats = [
            surface_format(
                vk::Format::R8G8B8A8_UNORM,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            ),
            surface_format(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            ),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_falls_back_to_the_first_format() {
        let formats = [surface_format(
            vk::Format::R8G8B8A8_UNORM,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        )];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn test_present_mode_preference() {
        assert_eq!(
            choose_present_mode(&[
                vk::PresentModeKHR::FIFO,
                vk::PresentModeKHR::MAILBOX
            ]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_is_clamped_when_the_surface_allows_any_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 16,
                height: 16,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        };
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 4096,
                height: 8,
            },
        );
        assert_eq!(extent.width, 1024);
        assert_eq!(extent.height, 16);
    }

    #[test]
    fn test_current_extent_wins() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 1,
                height: 1,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_image_count() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);
        capabilities.max_image_count = 2;
        assert_eq!(choose_image_count(&capabilities), 2);
    }
}
