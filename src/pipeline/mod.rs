//! Shader modules, graphics pipelines, and the on-disk pipeline cache.

mod cache_header;
mod cache_store;
mod compiler;
mod creator;
mod fixed_function;
mod shader;

pub use self::{
    cache_header::{
        validate_cache_blob, DeviceIdentity, PipelineCacheHeader,
        PIPELINE_CACHE_HEADER_SIZE,
    },
    cache_store::{
        CacheStore, FileCacheStore, MemoryCacheStore, PipelineCacheKey,
    },
    compiler::compile_glsl,
    creator::{
        prepare_pipeline_inputs, PipelineCreator, PipelineInputs,
        StageBytecode,
    },
    fixed_function::{
        descriptor_set_layouts, push_constant_range, vertex_input_descriptions,
        FixedFunctionState,
    },
    shader::{
        fetch_bytecode, CullMode, FakeShaderSource, FileSystemShader,
        PrimitiveMode, PushConstant, ShaderBytecodeSource, ShaderConfig,
        ShaderModule, ShaderStage, VertexAttribute, VertexAttributeType,
        Viewport,
    },
};
