use {
    crate::RendererError,
    anyhow::Context,
    ash::vk,
    std::sync::{Arc, Mutex},
};

/// A single binding update for a descriptor set.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DescriptorWrite {
    Buffer {
        binding: u32,
        descriptor_type: vk::DescriptorType,
        buffer: vk::Buffer,
        offset: u64,
        range: u64,
    },
    Image {
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
    },
}

/// Move a descriptor device into an Arc<Mutex<>> so it can be inspected
/// while a descriptor allocator owns it.
pub fn into_shared<T: DescriptorDevice>(device: T) -> Arc<Mutex<T>> {
    Arc::new(Mutex::new(device))
}

/// The graphics API calls made by the descriptor allocator.
pub trait DescriptorDevice {
    /// # Safety
    ///
    /// Unsafe because the layout must be destroyed before the device.
    unsafe fn create_set_layout(
        &mut self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout, RendererError>;

    /// # Safety
    ///
    /// Unsafe because no pool or pipeline layout may still use the layout.
    unsafe fn destroy_set_layout(&mut self, layout: vk::DescriptorSetLayout);

    /// # Safety
    ///
    /// Unsafe because the pool must be destroyed before the device.
    unsafe fn create_pool(
        &mut self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, RendererError>;

    /// # Safety
    ///
    /// Unsafe because every set allocated from the pool becomes invalid and
    /// none may be referenced by pending GPU work.
    unsafe fn destroy_pool(&mut self, pool: vk::DescriptorPool);

    /// # Safety
    ///
    /// Unsafe because the sets are only valid while `pool` is alive.
    unsafe fn allocate_sets(
        &mut self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        count: u32,
    ) -> Result<Vec<vk::DescriptorSet>, RendererError>;

    /// # Safety
    ///
    /// Unsafe because the set must not be in use by pending GPU work.
    unsafe fn write_set(
        &mut self,
        set: vk::DescriptorSet,
        writes: &[DescriptorWrite],
    );

    /// Block until the device has finished all submitted work.
    ///
    /// # Safety
    ///
    /// Unsafe because it is a device-level synchronization point.
    unsafe fn wait_idle(&mut self) -> Result<(), RendererError>;
}

/// The Vulkan implementation of [DescriptorDevice].
#[derive(Clone)]
pub struct AshDescriptorDevice {
    device: ash::Device,
}

impl AshDescriptorDevice {
    pub fn new(device: ash::Device) -> Self {
        Self { device }
    }
}

impl DescriptorDevice for AshDescriptorDevice {
    unsafe fn create_set_layout(
        &mut self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout, RendererError> {
        let create_info =
            vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        self.device
            .create_descriptor_set_layout(&create_info, None)
            .map_err(RendererError::DescriptorSetLayoutCreation)
    }

    unsafe fn destroy_set_layout(&mut self, layout: vk::DescriptorSetLayout) {
        self.device.destroy_descriptor_set_layout(layout, None);
    }

    unsafe fn create_pool(
        &mut self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, RendererError> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        self.device
            .create_descriptor_pool(&create_info, None)
            .map_err(|result| {
                RendererError::DescriptorPoolCreation(max_sets, result)
            })
    }

    unsafe fn destroy_pool(&mut self, pool: vk::DescriptorPool) {
        self.device.destroy_descriptor_pool(pool, None);
    }

    unsafe fn allocate_sets(
        &mut self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        count: u32,
    ) -> Result<Vec<vk::DescriptorSet>, RendererError> {
        let layouts = vec![layout; count as usize];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        self.device
            .allocate_descriptor_sets(&allocate_info)
            .map_err(|result| {
                RendererError::DescriptorSetAllocation(count, result)
            })
    }

    unsafe fn write_set(
        &mut self,
        set: vk::DescriptorSet,
        writes: &[DescriptorWrite],
    ) {
        // One info of each kind per write so every write can borrow the info
        // at its own index.
        let buffer_infos: Vec<vk::DescriptorBufferInfo> = writes
            .iter()
            .map(|write| match *write {
                DescriptorWrite::Buffer {
                    buffer,
                    offset,
                    range,
                    ..
                } => vk::DescriptorBufferInfo {
                    buffer,
                    offset,
                    range,
                },
                DescriptorWrite::Image { .. } => {
                    vk::DescriptorBufferInfo::default()
                }
            })
            .collect();
        let image_infos: Vec<vk::DescriptorImageInfo> = writes
            .iter()
            .map(|write| match *write {
                DescriptorWrite::Image {
                    image_view,
                    sampler,
                    ..
                } => vk::DescriptorImageInfo {
                    sampler,
                    image_view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
                DescriptorWrite::Buffer { .. } => {
                    vk::DescriptorImageInfo::default()
                }
            })
            .collect();

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .enumerate()
            .map(|(index, write)| match *write {
                DescriptorWrite::Buffer {
                    binding,
                    descriptor_type,
                    ..
                } => vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(descriptor_type)
                    .buffer_info(std::slice::from_ref(&buffer_infos[index])),
                DescriptorWrite::Image { binding, .. } => {
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(binding)
                        .dst_array_element(0)
                        .descriptor_type(
                            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                        )
                        .image_info(std::slice::from_ref(&image_infos[index]))
                }
            })
            .collect();

        self.device.update_descriptor_sets(&vk_writes, &[]);
    }

    unsafe fn wait_idle(&mut self) -> Result<(), RendererError> {
        self.device
            .device_wait_idle()
            .context("Error waiting for the device to go idle")?;
        Ok(())
    }
}

impl<T> DescriptorDevice for Arc<Mutex<T>>
where
    T: DescriptorDevice,
{
    unsafe fn create_set_layout(
        &mut self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout, RendererError> {
        self.lock().unwrap().create_set_layout(bindings)
    }

    unsafe fn destroy_set_layout(&mut self, layout: vk::DescriptorSetLayout) {
        self.lock().unwrap().destroy_set_layout(layout)
    }

    unsafe fn create_pool(
        &mut self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, RendererError> {
        self.lock().unwrap().create_pool(max_sets, pool_sizes)
    }

    unsafe fn destroy_pool(&mut self, pool: vk::DescriptorPool) {
        self.lock().unwrap().destroy_pool(pool)
    }

    unsafe fn allocate_sets(
        &mut self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
        count: u32,
    ) -> Result<Vec<vk::DescriptorSet>, RendererError> {
        self.lock().unwrap().allocate_sets(pool, layout, count)
    }

    unsafe fn write_set(
        &mut self,
        set: vk::DescriptorSet,
        writes: &[DescriptorWrite],
    ) {
        self.lock().unwrap().write_set(set, writes)
    }

    unsafe fn wait_idle(&mut self) -> Result<(), RendererError> {
        self.lock().unwrap().wait_idle()
    }
}
