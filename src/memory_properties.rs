use {
    crate::{
        pretty_wrappers::{PrettyBitflag, PrettySize},
        AllocatorError,
    },
    ash::vk,
    indoc::indoc,
};

/// The memory types and heaps reported by a physical device.
#[derive(Debug, Clone)]
pub struct MemoryProperties {
    types: Vec<vk::MemoryType>,
    heaps: Vec<vk::MemoryHeap>,
}

impl MemoryProperties {
    /// Get the memory properties for the given physical device.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Self {
        let properties = unsafe {
            instance.get_physical_device_memory_properties(physical_device)
        };
        Self::from_raw(
            &properties.memory_types
                [0..properties.memory_type_count as usize],
            &properties.memory_heaps
                [0..properties.memory_heap_count as usize],
        )
    }

    /// Build memory properties from already-queried types and heaps.
    pub fn from_raw(
        types: &[vk::MemoryType],
        heaps: &[vk::MemoryHeap],
    ) -> Self {
        Self {
            types: types.to_vec(),
            heaps: heaps.to_vec(),
        }
    }

    /// All of the currently usable memory heaps on this system.
    pub fn heaps(&self) -> &[vk::MemoryHeap] {
        &self.heaps
    }

    /// All of the currently usable memory types on this system.
    pub fn types(&self) -> &[vk::MemoryType] {
        &self.types
    }

    /// Find the first memory type allowed by `memory_type_bits` which has
    /// every one of the requested property flags.
    pub fn find_type_index(
        &self,
        memory_type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    ) -> Result<u32, AllocatorError> {
        self.types
            .iter()
            .enumerate()
            .find(|(index, memory_type)| {
                let is_required_type = (1 << index) & memory_type_bits != 0;
                is_required_type && memory_type.property_flags.contains(flags)
            })
            .map(|(index, _)| index as u32)
            .ok_or(AllocatorError::NoSupportedTypeForProperties(
                PrettyBitflag(memory_type_bits),
                flags,
            ))
    }
}

impl std::fmt::Display for MemoryProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("# Memory Properties\n\n")?;
        f.write_str("## Memory Types\n\n")?;

        for (index, memory_type) in self.types.iter().enumerate() {
            f.write_fmt(format_args!(
                indoc!(
                    "
                        [{}] property_flags: {:#?}
                                heap_index: {}

                        "
                ),
                index, memory_type.property_flags, memory_type.heap_index,
            ))?;
        }

        f.write_str("\n## Memory Heaps\n\n")?;

        for (index, heap) in self.heaps.iter().enumerate() {
            f.write_fmt(format_args!(
                indoc!(
                    "
                        [{}] flags: {:#?}
                             size: {}

                        "
                ),
                index,
                heap.flags,
                PrettySize(heap.size),
            ))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use {super::*, assert2::assert, pretty_assertions::assert_eq};

    fn properties() -> MemoryProperties {
        MemoryProperties::from_raw(
            &[
                vk::MemoryType {
                    property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                    heap_index: 0,
                },
                vk::MemoryType {
                    property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                        | vk::MemoryPropertyFlags::HOST_COHERENT,
                    heap_index: 1,
                },
            ],
            &[
                vk::MemoryHeap {
                    size: 1024 * 1024,
                    flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
                },
                vk::MemoryHeap {
                    size: 1024,
                    flags: vk::MemoryHeapFlags::empty(),
                },
            ],
        )
    }

    #[test]
    fn test_find_type_index_respects_type_bits() {
        let properties = properties();
        assert_eq!(
            properties
                .find_type_index(0b11, vk::MemoryPropertyFlags::HOST_VISIBLE)
                .unwrap(),
            1
        );
        assert_eq!(
            properties
                .find_type_index(0b11, vk::MemoryPropertyFlags::empty())
                .unwrap(),
            0
        );
        assert_eq!(
            properties
                .find_type_index(0b10, vk::MemoryPropertyFlags::empty())
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_find_type_index_fails_without_matching_flags() {
        let properties = properties();
        assert!(
            let Err(AllocatorError::NoSupportedTypeForProperties(_, _)) =
                properties.find_type_index(
                    0b01,
                    vk::MemoryPropertyFlags::HOST_VISIBLE
                )
        );
    }
}
