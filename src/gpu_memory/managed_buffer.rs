use {
    crate::{pretty_wrappers::PrettySize, AllocatorError, MemoryProperties},
    anyhow::Context,
    ash::vk,
    std::ffi::c_void,
};

/// A Vulkan buffer bound to its own dedicated device memory allocation.
///
/// Host visible buffers are mapped for their entire lifetime.
pub struct ManagedBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size_in_bytes: u64,
    usage: vk::BufferUsageFlags,
    properties: vk::MemoryPropertyFlags,
    host_ptr: *mut c_void,
}

// Public API
// ----------

impl ManagedBuffer {
    /// Create a buffer and allocate memory for it.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    /// - the buffer must be destroyed with `destroy()` before the device
    pub unsafe fn new(
        device: &ash::Device,
        memory_properties: &MemoryProperties,
        size_in_bytes: u64,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Self, AllocatorError> {
        let create_info = vk::BufferCreateInfo::default()
            .size(size_in_bytes)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = device
            .create_buffer(&create_info, None)
            .with_context(|| {
                format!("Error creating a buffer with {:#?}", create_info)
            })?;

        let requirements = device.get_buffer_memory_requirements(buffer);
        let memory_type_index = match memory_properties
            .find_type_index(requirements.memory_type_bits, properties)
        {
            Ok(index) => index,
            Err(error) => {
                device.destroy_buffer(buffer, None);
                return Err(error);
            }
        };

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = match device.allocate_memory(&allocate_info, None) {
            Ok(memory) => memory,
            Err(result) => {
                device.destroy_buffer(buffer, None);
                return Err(anyhow::Error::new(result)
                    .context(format!(
                        "Unable to allocate {} of buffer memory",
                        PrettySize(requirements.size)
                    ))
                    .into());
            }
        };

        let mut managed = Self {
            buffer,
            memory,
            size_in_bytes,
            usage,
            properties,
            host_ptr: std::ptr::null_mut(),
        };

        let bound = device
            .bind_buffer_memory(buffer, memory, 0)
            .context("Error binding buffer memory");
        let mapped = bound.and_then(|_| {
            if properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
                device
                    .map_memory(
                        memory,
                        0,
                        vk::WHOLE_SIZE,
                        vk::MemoryMapFlags::empty(),
                    )
                    .context("Unable to map a host visible buffer")
            } else {
                Ok(std::ptr::null_mut())
            }
        });
        match mapped {
            Ok(ptr) => managed.host_ptr = ptr,
            Err(error) => {
                managed.destroy(device);
                return Err(error.into());
            }
        }

        log::trace!("Created {:?}", managed);
        Ok(managed)
    }

    /// The raw buffer handle.
    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }

    /// The size requested when the buffer was created.
    pub fn size_in_bytes(&self) -> u64 {
        self.size_in_bytes
    }

    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Copy `data` into the mapped buffer at `offset`.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    /// - no GPU command that reads this range may be executing
    pub unsafe fn write_bytes(
        &mut self,
        offset: u64,
        data: &[u8],
    ) -> Result<(), AllocatorError> {
        if self.host_ptr.is_null() {
            return Err(AllocatorError::RuntimeError(anyhow::anyhow!(
                "Attempted to write into a buffer which is not host visible!"
            )));
        }
        if offset + data.len() as u64 > self.size_in_bytes {
            return Err(AllocatorError::RuntimeError(anyhow::anyhow!(
                "Write of {} at offset {} overflows a buffer of {}",
                PrettySize(data.len() as u64),
                offset,
                PrettySize(self.size_in_bytes)
            )));
        }
        std::ptr::copy_nonoverlapping(
            data.as_ptr(),
            (self.host_ptr as *mut u8).add(offset as usize),
            data.len(),
        );
        Ok(())
    }

    /// Destroy the buffer and free its memory.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    /// - it is an error to destroy the buffer while GPU commands still
    ///   reference it
    /// - the buffer handle must not be used after this call
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if !self.host_ptr.is_null() {
            device.unmap_memory(self.memory);
            self.host_ptr = std::ptr::null_mut();
        }
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
        self.buffer = vk::Buffer::null();
        self.memory = vk::DeviceMemory::null();
    }
}

impl std::fmt::Debug for ManagedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedBuffer")
            .field("buffer", &self.buffer)
            .field("size_in_bytes", &PrettySize(self.size_in_bytes))
            .field("usage", &self.usage)
            .field("properties", &self.properties)
            .field("mapped", &!self.host_ptr.is_null())
            .finish()
    }
}
