use {anyhow::Context, ash::vk};

/// Records and submits short-lived command buffers for transfers and layout
/// transitions, blocking until the GPU has finished executing them.
pub struct OneTimeCommands {
    device: ash::Device,
    queue: vk::Queue,
    pool: vk::CommandPool,
}

// Public API
// ----------

impl OneTimeCommands {
    /// Create a transient command pool for the given queue family.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    /// - the pool must be destroyed with `destroy()` before the device
    /// - the queue must belong to `queue_family_index`
    pub unsafe fn new(
        device: ash::Device,
        queue_family_index: u32,
        queue: vk::Queue,
    ) -> anyhow::Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )
            .queue_family_index(queue_family_index);
        let pool = device
            .create_command_pool(&create_info, None)
            .context("Unable to create the one-time command pool")?;
        Ok(Self {
            device,
            queue,
            pool,
        })
    }

    /// Record commands with `record`, submit them, and wait for completion.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    /// - every resource referenced by the recorded commands must be alive
    ///   until this call returns
    pub unsafe fn submit<F>(&self, record: F) -> anyhow::Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffers = self
            .device
            .allocate_command_buffers(&allocate_info)
            .context("Unable to allocate a one-time command buffer")?;
        let command_buffer = command_buffers[0];

        let result = self.record_and_wait(command_buffer, record);

        self.device
            .free_command_buffers(self.pool, &command_buffers);
        result
    }

    /// Destroy the command pool.
    ///
    /// # Safety
    ///
    /// Unsafe because no submitted work may still be executing.
    pub unsafe fn destroy(&mut self) {
        self.device.destroy_command_pool(self.pool, None);
        self.pool = vk::CommandPool::null();
    }
}

// Private API
// -----------

impl OneTimeCommands {
    unsafe fn record_and_wait<F>(
        &self,
        command_buffer: vk::CommandBuffer,
        record: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .context("Unable to begin a one-time command buffer")?;

        record(&self.device, command_buffer);

        self.device
            .end_command_buffer(command_buffer)
            .context("Unable to end a one-time command buffer")?;

        let fence = self
            .device
            .create_fence(&vk::FenceCreateInfo::default(), None)
            .context("Unable to create a one-time submission fence")?;

        let command_buffers = [command_buffer];
        let submit_info =
            vk::SubmitInfo::default().command_buffers(&command_buffers);
        let result = self
            .device
            .queue_submit(self.queue, &[submit_info], fence)
            .context("Unable to submit one-time commands")
            .and_then(|_| {
                self.device
                    .wait_for_fences(&[fence], true, u64::MAX)
                    .context("Error waiting for one-time commands")
            });

        self.device.destroy_fence(fence, None);
        result
    }
}
