//! Descriptor set layouts, pools, and set updates.

mod allocator;
mod device;
mod fake_device;
mod pool_family;
mod texture_registry;
mod uniform_layout;

pub use self::{
    allocator::DescriptorAllocator,
    device::{
        into_shared, AshDescriptorDevice, DescriptorDevice, DescriptorWrite,
    },
    fake_device::FakeDescriptorDevice,
    pool_family::{
        DescriptorSetHandle, MergeGrowth, MeshPoolFamily, PoolFamilyState,
    },
    texture_registry::{
        SamplerKind, TextureEntry, TextureHandles, TextureId, TextureKind,
        TextureRegistry,
    },
    uniform_layout::{
        BindingPlan, BindingSource, PlannedBinding, UniformBlock,
        UniformBuffering, UniformDataLayout, UniformDataType, UniformUsage,
    },
};
