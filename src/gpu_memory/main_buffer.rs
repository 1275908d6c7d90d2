use {
    crate::{
        command::OneTimeCommands,
        gpu_memory::{
            align_up, BufferDataType, ManagedBuffer, RegionAllocator,
        },
        pretty_wrappers::PrettySize,
        AllocatorError, MemoryProperties,
    },
    anyhow::Context,
    ash::vk,
};

/// The capacity a buffer grows to when it must hold `required_bytes`.
pub fn grown_capacity(required_bytes: u64) -> u64 {
    required_bytes + required_bytes / 2
}

/// The capacity the staging buffer grows to for an upload of
/// `upload_bytes`, rounded to the minimum uniform alignment.
pub fn grown_staging_capacity(upload_bytes: u64, alignment: u64) -> u64 {
    align_up(upload_bytes * 3 / 2, alignment.max(1))
}

/// The device-local buffer shared by all vertex, index, and uniform data,
/// paired with the host-visible staging buffer used to upload into it.
///
/// Regions of the main buffer are handed out by a [RegionAllocator]. When a
/// request cannot be satisfied the main buffer is replaced by a larger one
/// and the old contents are copied over on the GPU.
pub struct MainBuffer {
    device: ash::Device,
    memory_properties: MemoryProperties,
    main: ManagedBuffer,
    staging: ManagedBuffer,
    regions: RegionAllocator,
    min_uniform_alignment: u64,

    /// Buffers replaced by growth which are destroyed at the next safe point.
    retired: Vec<ManagedBuffer>,
}

// Public API
// ----------

impl MainBuffer {
    /// Create the main and staging buffers.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    /// - `destroy()` must be called before the device is destroyed
    pub unsafe fn new(
        device: ash::Device,
        memory_properties: MemoryProperties,
        main_size: u64,
        staging_size: u64,
        min_uniform_alignment: u64,
    ) -> Result<Self, AllocatorError> {
        let main = Self::create_main(&device, &memory_properties, main_size)?;
        let staging = match Self::create_staging(
            &device,
            &memory_properties,
            staging_size,
        ) {
            Ok(staging) => staging,
            Err(error) => {
                let mut main = main;
                main.destroy(&device);
                return Err(error);
            }
        };
        Ok(Self {
            device,
            memory_properties,
            main,
            staging,
            regions: RegionAllocator::new(main_size),
            min_uniform_alignment: min_uniform_alignment.max(1),
            retired: vec![],
        })
    }

    /// The raw main buffer handle. This changes whenever the buffer grows.
    pub fn raw(&self) -> vk::Buffer {
        self.main.raw()
    }

    pub fn capacity(&self) -> u64 {
        self.main.size_in_bytes()
    }

    pub fn regions(&self) -> &RegionAllocator {
        &self.regions
    }

    /// The alignment used for allocations of the given data type.
    pub fn alignment_for(&self, data_type: BufferDataType) -> u64 {
        data_type.alignment(self.min_uniform_alignment)
    }

    /// Reserve a region of the main buffer, growing it when no free region
    /// is large enough.
    ///
    /// # Safety
    ///
    /// Unsafe because growth waits for the device to go idle and replaces the
    /// main buffer handle. Descriptor sets referencing the old handle must be
    /// rewritten before their next use.
    pub unsafe fn allocate(
        &mut self,
        size: u64,
        data_type: BufferDataType,
        commands: &OneTimeCommands,
    ) -> Result<u64, AllocatorError> {
        let alignment = self.alignment_for(data_type);
        match self.regions.request_memory(size, alignment) {
            Ok(offset) => Ok(offset),
            Err(AllocatorError::OutOfRegions(_, _)) => {
                let required = align_up(
                    self.regions.high_water_mark(),
                    alignment,
                ) + align_up(size.max(1), alignment);
                self.grow_main(required, commands)?;
                self.regions.request_memory(size, alignment)
            }
            Err(error) => Err(error),
        }
    }

    /// Release a region previously returned by `allocate()`.
    pub fn deallocate(&mut self, offset: u64) -> Result<(), AllocatorError> {
        self.regions.free_memory(offset)
    }

    /// Upload `data` into the main buffer at `offset` through the staging
    /// buffer.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    /// - GPU commands reading the destination range must not be executing
    /// - the staging buffer or the main buffer may be replaced
    pub unsafe fn write(
        &mut self,
        data: &[u8],
        offset: u64,
        commands: &OneTimeCommands,
    ) -> Result<(), AllocatorError> {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u64;
        if size > self.staging.size_in_bytes() {
            self.grow_staging(size)?;
        }
        if size + offset > self.main.size_in_bytes() {
            self.grow_main(size + offset, commands)?;
        }

        self.staging.write_bytes(0, data)?;
        let (src, dst) = (self.staging.raw(), self.main.raw());
        commands
            .submit(|device, command_buffer| {
                device.cmd_copy_buffer(
                    command_buffer,
                    src,
                    dst,
                    &[vk::BufferCopy {
                        src_offset: 0,
                        dst_offset: offset,
                        size,
                    }],
                );
            })
            .with_context(|| {
                format!(
                    "Unable to copy {} into the main buffer at {}",
                    PrettySize(size),
                    offset
                )
            })?;
        Ok(())
    }

    /// Destroy buffers which were replaced by growth.
    ///
    /// # Safety
    ///
    /// Unsafe because this waits for the device to go idle when there is
    /// anything to release.
    pub unsafe fn release_retired(&mut self) -> Result<(), AllocatorError> {
        if self.retired.is_empty() {
            return Ok(());
        }
        self.device
            .device_wait_idle()
            .context("Error waiting for the device before releasing buffers")?;
        for mut buffer in self.retired.drain(..) {
            log::trace!("Releasing retired {:?}", buffer);
            buffer.destroy(&self.device);
        }
        Ok(())
    }

    /// Destroy every buffer owned by this object.
    ///
    /// # Safety
    ///
    /// Unsafe because the device must be idle.
    pub unsafe fn destroy(&mut self) {
        for mut buffer in self.retired.drain(..) {
            buffer.destroy(&self.device);
        }
        self.main.destroy(&self.device);
        self.staging.destroy(&self.device);
    }
}

// Private API
// -----------

impl MainBuffer {
    unsafe fn create_main(
        device: &ash::Device,
        memory_properties: &MemoryProperties,
        size: u64,
    ) -> Result<ManagedBuffer, AllocatorError> {
        ManagedBuffer::new(
            device,
            memory_properties,
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::INDEX_BUFFER
                | vk::BufferUsageFlags::UNIFORM_BUFFER
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::TRANSFER_SRC
                | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
    }

    unsafe fn create_staging(
        device: &ash::Device,
        memory_properties: &MemoryProperties,
        size: u64,
    ) -> Result<ManagedBuffer, AllocatorError> {
        ManagedBuffer::new(
            device,
            memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Replace the staging buffer with a larger one. The staging buffer never
    /// holds data between uploads so nothing is copied.
    unsafe fn grow_staging(
        &mut self,
        upload_bytes: u64,
    ) -> Result<(), AllocatorError> {
        let new_size =
            grown_staging_capacity(upload_bytes, self.min_uniform_alignment);
        log::debug!(
            "Growing the staging buffer from {} to {}",
            PrettySize(self.staging.size_in_bytes()),
            PrettySize(new_size)
        );
        self.device
            .device_wait_idle()
            .context("Error waiting for the device before staging growth")?;
        let staging = Self::create_staging(
            &self.device,
            &self.memory_properties,
            new_size,
        )?;
        let mut old = std::mem::replace(&mut self.staging, staging);
        old.destroy(&self.device);
        Ok(())
    }

    /// Replace the main buffer with one which holds at least
    /// `required_bytes`, copying the old contents on the GPU.
    unsafe fn grow_main(
        &mut self,
        required_bytes: u64,
        commands: &OneTimeCommands,
    ) -> Result<(), AllocatorError> {
        let new_size = grown_capacity(required_bytes)
            .max(self.main.size_in_bytes() + 1);
        log::debug!(
            "Growing the main buffer from {} to {}",
            PrettySize(self.main.size_in_bytes()),
            PrettySize(new_size)
        );

        // The old buffer may still be read by in-flight frames.
        self.device
            .device_wait_idle()
            .context("Error waiting for the device before buffer growth")?;

        let new_main =
            Self::create_main(&self.device, &self.memory_properties, new_size)?;
        let (src, dst) = (self.main.raw(), new_main.raw());
        let copy_size = self.main.size_in_bytes();
        let copied = commands.submit(|device, command_buffer| {
            device.cmd_copy_buffer(
                command_buffer,
                src,
                dst,
                &[vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: copy_size,
                }],
            );
        });
        if let Err(error) = copied {
            let mut new_main = new_main;
            new_main.destroy(&self.device);
            return Err(error
                .context("Unable to migrate the main buffer contents")
                .into());
        }

        let old = std::mem::replace(&mut self.main, new_main);
        self.retired.push(old);
        self.regions.extend(new_size);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn test_grown_capacity_is_one_and_a_half_times() {
        assert_eq!(grown_capacity(1000), 1500);
        assert_eq!(grown_capacity(4096), 6144);
        assert_eq!(grown_capacity(1), 1);
    }

    #[test]
    fn test_staging_growth_respects_uniform_alignment() {
        assert_eq!(grown_staging_capacity(100, 256), 256);
        assert_eq!(grown_staging_capacity(1000, 256), 1536);
        assert_eq!(grown_staging_capacity(10, 0), 15);
    }
}
