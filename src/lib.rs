//! The Vulkan resource core of the DENG renderer: device selection, a single
//! main buffer for vertex, index, and uniform data, descriptor pools which
//! grow and merge, cached graphics pipelines, and frames in flight.

pub mod descriptor;
pub mod frame;
pub mod gpu_memory;
pub mod instance;
pub mod pipeline;
pub mod renderer;

mod command;
mod config;
mod error;
mod memory_properties;
mod mesh;
mod pretty_wrappers;
mod texture;

pub use self::{
    command::OneTimeCommands,
    config::{DescriptorConfig, RendererConfig, MAX_FRAMES_IN_FLIGHT},
    error::{AllocatorError, RendererError, ShaderError},
    memory_properties::MemoryProperties,
    mesh::{DrawCommand, FramebufferId, MeshId, MeshReference, ShaderId},
    renderer::{VulkanRenderer, WINDOW_FRAMEBUFFER},
    texture::{GpuTexture, TextureResource},
};
