use {anyhow::Context, ash::vk};

/// The synchronization primitives owned by one frame-in-flight slot.
#[derive(Debug, Copy, Clone)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,

    /// Created signaled so the first wait on the slot returns immediately.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create the semaphores and fence for a slot.
    ///
    /// # Safety
    ///
    /// Unsafe because `destroy()` must be called before the device is
    /// destroyed.
    pub unsafe fn new(device: &ash::Device) -> anyhow::Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let image_available = device
            .create_semaphore(&semaphore_info, None)
            .context("Unable to create the image available semaphore")?;
        let render_finished =
            match device.create_semaphore(&semaphore_info, None) {
                Ok(semaphore) => semaphore,
                Err(error) => {
                    device.destroy_semaphore(image_available, None);
                    return Err(error).context(
                        "Unable to create the render finished semaphore",
                    );
                }
            };
        let fence_info = vk::FenceCreateInfo::default()
            .flags(vk::FenceCreateFlags::SIGNALED);
        let in_flight = match device.create_fence(&fence_info, None) {
            Ok(fence) => fence,
            Err(error) => {
                device.destroy_semaphore(image_available, None);
                device.destroy_semaphore(render_finished, None);
                return Err(error)
                    .context("Unable to create the in flight fence");
            }
        };
        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// # Safety
    ///
    /// Unsafe because the primitives must not be in use by the device.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}
