use {
    crate::pretty_wrappers::{PrettyBitflag, PrettySize},
    ash::vk,
    thiserror::Error,
};

#[derive(Error, Debug)]
pub enum AllocatorError {
    #[error("No memory type for bits {0} and flags {1:#?}")]
    NoSupportedTypeForProperties(PrettyBitflag, vk::MemoryPropertyFlags),

    #[error("No free region can hold {0} with alignment {1}")]
    OutOfRegions(PrettySize, u64),

    #[error("No region was allocated at offset {0}")]
    UnknownRegion(u64),

    #[error("Alignment must be a non-zero value")]
    ZeroAlignment,

    #[error(transparent)]
    RuntimeError(#[from] anyhow::Error),
}

/// Failures produced while fetching shader bytecode.
///
/// The distinction matters to the caller: a missing source and an invalid
/// source map to different renderer errors, and both are tolerated for the
/// geometry stage.
#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("Unable to read shader {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to compile shader {path}: {message}")]
    Compile { path: String, message: String },
}

#[derive(Error, Debug)]
pub enum RendererError {
    #[error("No physical device satisfies the renderer requirements")]
    NoSuitableDevice,

    #[error("Unable to create a descriptor set layout")]
    DescriptorSetLayoutCreation(#[source] vk::Result),

    #[error("Unable to create a descriptor pool for {0} sets")]
    DescriptorPoolCreation(u32, #[source] vk::Result),

    #[error("Unable to allocate {0} descriptor sets")]
    DescriptorSetAllocation(u32, #[source] vk::Result),

    #[error("Unable to create a pipeline layout")]
    PipelineLayoutCreation(#[source] vk::Result),

    #[error("Unable to create a graphics pipeline for shader {0}")]
    PipelineCreation(String, #[source] vk::Result),

    #[error("Shader source code is missing")]
    ShaderSourceMissing(#[source] ShaderError),

    #[error("Shader source code is invalid")]
    ShaderSourceInvalid(#[source] ShaderError),

    #[error("Swapchain operation failed")]
    Swapchain(#[source] vk::Result),

    #[error("No mesh is registered with id {0}")]
    UnknownMesh(usize),

    #[error("No shader is registered with id {0}")]
    UnknownShader(usize),

    #[error("No framebuffer is registered with id {0}")]
    UnknownFramebuffer(usize),

    #[error("Invalid renderer configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    #[error(transparent)]
    RuntimeError(#[from] anyhow::Error),
}

impl From<ShaderError> for RendererError {
    /// Translate a shader failure into the renderer error taxonomy.
    fn from(error: ShaderError) -> Self {
        match error {
            ShaderError::Io { .. } => Self::ShaderSourceMissing(error),
            ShaderError::Compile { .. } => Self::ShaderSourceInvalid(error),
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, assert2::assert};

    #[test]
    fn test_io_errors_become_missing_source() {
        let error = ShaderError::Io {
            path: "shaders/missing.vert".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(
            let RendererError::ShaderSourceMissing(_) =
                RendererError::from(error)
        );
    }

    #[test]
    fn test_compile_errors_become_invalid_source() {
        let error = ShaderError::Compile {
            path: "shaders/broken.frag".into(),
            message: "unexpected token".into(),
        };
        let renderer_error: RendererError = error.into();
        assert_eq!(
            renderer_error.to_string(),
            "Shader source code is invalid"
        );
    }
}
