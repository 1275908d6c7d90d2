use {
    crate::descriptor::{
        texture_registry::{SamplerKind, TextureId, TextureRegistry},
        DescriptorWrite,
    },
    ash::vk,
};

/// The kind of resource bound at a descriptor binding.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformDataType {
    Buffer,
    StorageBuffer,
    ImageSampler2D,
    ImageSampler3D,
}

impl UniformDataType {
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Self::Buffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            Self::ImageSampler2D | Self::ImageSampler3D => {
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            }
        }
    }
}

/// Which descriptor set a binding lives in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformUsage {
    /// Shared by every mesh drawn with the shader.
    PerShader,

    /// Unique to each mesh.
    PerMesh,
}

/// Whether a buffer binding has one copy of its data or one copy per frame
/// in flight laid out back to back.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformBuffering {
    Single,
    PerFrame,
}

/// Where a binding's data lives in the main buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct UniformBlock {
    pub binding: u32,
    pub offset: u64,
    pub size: u64,
}

/// Describes one descriptor binding used by a shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformDataLayout {
    pub block: UniformBlock,
    pub data_type: UniformDataType,
    pub usage: UniformUsage,
    pub stages: vk::ShaderStageFlags,
    pub buffering: UniformBuffering,
}

impl UniformDataLayout {
    /// A uniform buffer binding with a single copy of its data.
    pub fn buffer(
        binding: u32,
        offset: u64,
        size: u64,
        stages: vk::ShaderStageFlags,
        usage: UniformUsage,
    ) -> Self {
        Self {
            block: UniformBlock {
                binding,
                offset,
                size,
            },
            data_type: UniformDataType::Buffer,
            usage,
            stages,
            buffering: UniformBuffering::Single,
        }
    }

    /// A storage buffer binding with one copy of its data per frame in
    /// flight.
    pub fn storage_buffer(
        binding: u32,
        offset: u64,
        size: u64,
        stages: vk::ShaderStageFlags,
        usage: UniformUsage,
    ) -> Self {
        Self {
            data_type: UniformDataType::StorageBuffer,
            buffering: UniformBuffering::PerFrame,
            ..Self::buffer(binding, offset, size, stages, usage)
        }
    }

    /// A combined image sampler for a 2D texture.
    pub fn sampler_2d(
        binding: u32,
        stages: vk::ShaderStageFlags,
        usage: UniformUsage,
    ) -> Self {
        Self {
            data_type: UniformDataType::ImageSampler2D,
            ..Self::buffer(binding, 0, 0, stages, usage)
        }
    }

    /// A combined image sampler for a cubemap texture.
    pub fn sampler_3d(
        binding: u32,
        stages: vk::ShaderStageFlags,
        usage: UniformUsage,
    ) -> Self {
        Self {
            data_type: UniformDataType::ImageSampler3D,
            ..Self::buffer(binding, 0, 0, stages, usage)
        }
    }

    /// Override the buffering mode.
    pub fn with_buffering(self, buffering: UniformBuffering) -> Self {
        Self { buffering, ..self }
    }
}

/// The data source for a planned binding.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BindingSource {
    Buffer {
        offset: u64,
        size: u64,
        buffering: UniformBuffering,
    },
    Texture {
        /// Index into the texture id list supplied when the set is written.
        slot: usize,
        kind: SamplerKind,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PlannedBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub stages: vk::ShaderStageFlags,
    pub source: BindingSource,
}

/// The bindings of one usage class in ascending binding order.
///
/// Layout creation, pool sizing, and descriptor writes all iterate this same
/// list, so the n-th texture id is always consumed by the n-th sampler
/// binding.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BindingPlan {
    bindings: Vec<PlannedBinding>,
}

impl BindingPlan {
    pub fn new(layouts: &[UniformDataLayout], usage: UniformUsage) -> Self {
        let mut selected: Vec<&UniformDataLayout> =
            layouts.iter().filter(|layout| layout.usage == usage).collect();
        selected.sort_by_key(|layout| layout.block.binding);

        let mut texture_slot = 0;
        let bindings = selected
            .into_iter()
            .map(|layout| {
                let source = match layout.data_type {
                    UniformDataType::Buffer
                    | UniformDataType::StorageBuffer => BindingSource::Buffer {
                        offset: layout.block.offset,
                        size: layout.block.size,
                        buffering: layout.buffering,
                    },
                    UniformDataType::ImageSampler2D => {
                        texture_slot += 1;
                        BindingSource::Texture {
                            slot: texture_slot - 1,
                            kind: SamplerKind::Sampler2D,
                        }
                    }
                    UniformDataType::ImageSampler3D => {
                        texture_slot += 1;
                        BindingSource::Texture {
                            slot: texture_slot - 1,
                            kind: SamplerKind::SamplerCube,
                        }
                    }
                };
                PlannedBinding {
                    binding: layout.block.binding,
                    descriptor_type: layout.data_type.descriptor_type(),
                    stages: layout.stages,
                    source,
                }
            })
            .collect();

        Self { bindings }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> &[PlannedBinding] {
        &self.bindings
    }

    /// The number of texture ids consumed when writing a set.
    pub fn texture_count(&self) -> usize {
        self.bindings
            .iter()
            .filter(|binding| {
                matches!(binding.source, BindingSource::Texture { .. })
            })
            .count()
    }

    /// Descriptor set layout bindings, one descriptor per binding.
    pub fn layout_bindings(
        &self,
    ) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings
            .iter()
            .map(|planned| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(planned.binding)
                    .descriptor_type(planned.descriptor_type)
                    .descriptor_count(1)
                    .stage_flags(planned.stages)
            })
            .collect()
    }

    /// Pool sizes for a pool which holds `set_count` sets of this plan.
    pub fn pool_sizes(&self, set_count: u32) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = vec![];
        for planned in &self.bindings {
            let existing = sizes
                .iter_mut()
                .find(|size| size.ty == planned.descriptor_type);
            match existing {
                Some(size) => size.descriptor_count += set_count,
                None => sizes.push(vk::DescriptorPoolSize {
                    ty: planned.descriptor_type,
                    descriptor_count: set_count,
                }),
            }
        }
        sizes
    }

    /// Build the writes for one descriptor set.
    ///
    /// Texture bindings never fail: an id which is missing, unknown, or of
    /// the wrong kind resolves to the registry's placeholder for the
    /// binding's sampler kind.
    pub fn writes(
        &self,
        buffer: vk::Buffer,
        frame_index: usize,
        textures: &[TextureId],
        registry: &TextureRegistry,
    ) -> Vec<DescriptorWrite> {
        self.bindings
            .iter()
            .map(|planned| match planned.source {
                BindingSource::Buffer {
                    offset,
                    size,
                    buffering,
                } => {
                    let offset = match buffering {
                        UniformBuffering::Single => offset,
                        UniformBuffering::PerFrame => {
                            offset + frame_index as u64 * size
                        }
                    };
                    DescriptorWrite::Buffer {
                        binding: planned.binding,
                        descriptor_type: planned.descriptor_type,
                        buffer,
                        offset,
                        range: size,
                    }
                }
                BindingSource::Texture { slot, kind } => {
                    let handles =
                        registry.resolve(textures.get(slot).copied(), kind);
                    DescriptorWrite::Image {
                        binding: planned.binding,
                        image_view: handles.image_view,
                        sampler: handles.sampler,
                    }
                }
            })
            .collect()
    }
}
