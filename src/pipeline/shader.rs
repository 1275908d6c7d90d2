use {
    crate::{
        descriptor::{TextureId, UniformDataLayout},
        pipeline::compile_glsl,
        ShaderError,
    },
    ash::vk,
    std::path::{Path, PathBuf},
};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
}

impl ShaderStage {
    pub fn stage_flags(&self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Geometry => vk::ShaderStageFlags::GEOMETRY,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// The file extension used for GLSL sources of this stage.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::Geometry => "geom",
            Self::Fragment => "frag",
        }
    }
}

/// The type of one vertex attribute.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexAttributeType {
    Float,
    Double,
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Vec2Float,
    Vec2Double,
    Vec2Byte,
    Vec2UnsignedByte,
    Vec2Short,
    Vec2UnsignedShort,
    Vec2Int,
    Vec2UnsignedInt,
    Vec3Float,
    Vec3Double,
    Vec3Byte,
    Vec3UnsignedByte,
    Vec3Short,
    Vec3UnsignedShort,
    Vec3Int,
    Vec3UnsignedInt,
    Vec4Float,
    Vec4Double,
    Vec4Byte,
    Vec4UnsignedByte,
    Vec4Short,
    Vec4UnsignedShort,
    Vec4Int,
    Vec4UnsignedInt,
}

impl VertexAttributeType {
    pub fn format(&self) -> vk::Format {
        match self {
            Self::Float => vk::Format::R32_SFLOAT,
            Self::Double => vk::Format::R64_SFLOAT,
            Self::Byte => vk::Format::R8_SINT,
            Self::UnsignedByte => vk::Format::R8_UINT,
            Self::Short => vk::Format::R16_SINT,
            Self::UnsignedShort => vk::Format::R16_UINT,
            Self::Int => vk::Format::R32_SINT,
            Self::UnsignedInt => vk::Format::R32_UINT,

            Self::Vec2Float => vk::Format::R32G32_SFLOAT,
            Self::Vec2Double => vk::Format::R64G64_SFLOAT,
            Self::Vec2Byte => vk::Format::R8G8_SNORM,
            Self::Vec2UnsignedByte => vk::Format::R8G8_UNORM,
            Self::Vec2Short => vk::Format::R16G16_SINT,
            Self::Vec2UnsignedShort => vk::Format::R16G16_UINT,
            Self::Vec2Int => vk::Format::R32G32_SINT,
            Self::Vec2UnsignedInt => vk::Format::R32G32_UINT,

            Self::Vec3Float => vk::Format::R32G32B32_SFLOAT,
            Self::Vec3Double => vk::Format::R64G64B64_SFLOAT,
            Self::Vec3Byte => vk::Format::R8G8B8_SNORM,
            Self::Vec3UnsignedByte => vk::Format::R8G8B8_UNORM,
            Self::Vec3Short => vk::Format::R16G16B16_SINT,
            Self::Vec3UnsignedShort => vk::Format::R16G16B16_UINT,
            Self::Vec3Int => vk::Format::R32G32B32_SINT,
            Self::Vec3UnsignedInt => vk::Format::R32G32B32_UINT,

            Self::Vec4Float => vk::Format::R32G32B32A32_SFLOAT,
            Self::Vec4Double => vk::Format::R64G64B64A64_SFLOAT,
            Self::Vec4Byte => vk::Format::R8G8B8A8_SNORM,
            Self::Vec4UnsignedByte => vk::Format::R8G8B8A8_UNORM,
            Self::Vec4Short => vk::Format::R16G16B16A16_SINT,
            Self::Vec4UnsignedShort => vk::Format::R16G16B16A16_UINT,
            Self::Vec4Int => vk::Format::R32G32B32A32_SINT,
            Self::Vec4UnsignedInt => vk::Format::R32G32B32A32_UINT,
        }
    }
}

/// A vertex attribute and the distance in bytes between consecutive
/// elements.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub attribute_type: VertexAttributeType,
    pub stride: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum PrimitiveMode {
    Points,
    Lines,
    #[default]
    Triangles,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The fixed-function configuration of a shader's pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShaderConfig {
    pub primitive_mode: PrimitiveMode,
    pub cull_mode: CullMode,
    pub enable_blend: bool,
    pub enable_depth_testing: bool,
    pub enable_indexing: bool,

    /// Use each draw command's scissor instead of the full framebuffer.
    pub enable_scissor: bool,

    /// Replaces the flipped full-framebuffer viewport.
    pub custom_viewport: Option<Viewport>,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            primitive_mode: PrimitiveMode::Triangles,
            cull_mode: CullMode::None,
            enable_blend: false,
            enable_depth_testing: true,
            enable_indexing: true,
            enable_scissor: false,
            custom_viewport: None,
        }
    }
}

/// A push constant block shared by every draw with the shader.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PushConstant {
    pub stages: vk::ShaderStageFlags,
    pub data: Vec<u8>,
}

/// Supplies SPIR-V for each shader stage.
pub trait ShaderBytecodeSource {
    /// A stable description of the stage's source, None when the shader
    /// does not have the stage. Used to key the pipeline cache.
    fn source_identity(&self, stage: ShaderStage) -> Option<String>;

    /// Previously compiled bytecode for the stage, None when there is none.
    fn compiled_bytecode(
        &self,
        stage: ShaderStage,
    ) -> Result<Option<Vec<u32>>, ShaderError>;

    /// Compile the stage from source.
    fn compile(&mut self, stage: ShaderStage) -> Result<Vec<u32>, ShaderError>;
}

/// Everything the renderer needs to build a pipeline for a shader.
pub struct ShaderModule {
    pub name: String,
    pub source: Box<dyn ShaderBytecodeSource>,
    pub attributes: Vec<VertexAttribute>,
    pub uniform_layouts: Vec<UniformDataLayout>,
    pub config: ShaderConfig,
    pub push_constant: Option<PushConstant>,

    /// Textures for the per-shader sampler bindings, in binding order.
    pub texture_ids: Vec<TextureId>,
}

impl ShaderModule {
    /// A shader with default fixed-function state and no inputs.
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn ShaderBytecodeSource>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            attributes: vec![],
            uniform_layouts: vec![],
            config: ShaderConfig::default(),
            push_constant: None,
            texture_ids: vec![],
        }
    }
}

impl std::fmt::Debug for ShaderModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderModule")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("uniform_layouts", &self.uniform_layouts)
            .field("config", &self.config)
            .field("push_constant", &self.push_constant)
            .field("texture_ids", &self.texture_ids)
            .finish()
    }
}

/// Get bytecode for one stage.
///
/// When `reuse_compiled` is set, previously compiled bytecode is used and
/// the source is only compiled when there is none. Otherwise the source is
/// always compiled, falling back to previously compiled bytecode if the
/// compilation fails.
pub fn fetch_bytecode(
    source: &mut dyn ShaderBytecodeSource,
    stage: ShaderStage,
    reuse_compiled: bool,
) -> Result<Vec<u32>, ShaderError> {
    if reuse_compiled {
        if let Some(bytecode) = source.compiled_bytecode(stage)? {
            return Ok(bytecode);
        }
    }
    match source.compile(stage) {
        Ok(bytecode) => Ok(bytecode),
        Err(error) => match source.compiled_bytecode(stage) {
            Ok(Some(bytecode)) if !reuse_compiled => {
                log::warn!(
                    "{}, using previously compiled {:?} bytecode",
                    error,
                    stage
                );
                Ok(bytecode)
            }
            _ => Err(error),
        },
    }
}

/// Shader stages stored next to each other on disk as `<name>.vert`,
/// `<name>.geom`, and `<name>.frag` with compiled bytecode in
/// `<name>.<stage>.spv`.
#[derive(Debug, Clone)]
pub struct FileSystemShader {
    directory: PathBuf,
    name: String,
}

impl FileSystemShader {
    pub fn new(directory: impl AsRef<Path>, name: impl Into<String>) -> Self {
        Self {
            directory: directory.as_ref().to_owned(),
            name: name.into(),
        }
    }

    pub fn source_path(&self, stage: ShaderStage) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.name, stage.extension()))
    }

    pub fn bytecode_path(&self, stage: ShaderStage) -> PathBuf {
        self.directory
            .join(format!("{}.{}.spv", self.name, stage.extension()))
    }

    fn io_error(path: &Path, source: std::io::Error) -> ShaderError {
        ShaderError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl ShaderBytecodeSource for FileSystemShader {
    fn source_identity(&self, stage: ShaderStage) -> Option<String> {
        let source_path = self.source_path(stage);
        match std::fs::read_to_string(&source_path) {
            Ok(source) => Some(source),
            Err(_) => {
                let bytecode_path = self.bytecode_path(stage);
                // Stages shipped only as bytecode are identified by path.
                bytecode_path
                    .exists()
                    .then(|| bytecode_path.display().to_string())
            }
        }
    }

    fn compiled_bytecode(
        &self,
        stage: ShaderStage,
    ) -> Result<Option<Vec<u32>>, ShaderError> {
        let path = self.bytecode_path(stage);
        let mut file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None)
            }
            Err(error) => return Err(Self::io_error(&path, error)),
        };
        ash::util::read_spv(&mut file)
            .map(Some)
            .map_err(|error| Self::io_error(&path, error))
    }

    fn compile(&mut self, stage: ShaderStage) -> Result<Vec<u32>, ShaderError> {
        let source_path = self.source_path(stage);
        let source = std::fs::read_to_string(&source_path)
            .map_err(|error| Self::io_error(&source_path, error))?;
        let bytecode = compile_glsl(
            &source,
            stage,
            &source_path.display().to_string(),
        )?;

        let bytecode_path = self.bytecode_path(stage);
        let bytes: Vec<u8> =
            bytecode.iter().flat_map(|word| word.to_le_bytes()).collect();
        if let Err(error) = std::fs::write(&bytecode_path, bytes) {
            log::warn!(
                "Unable to write compiled shader {}: {}",
                bytecode_path.display(),
                error
            );
        }
        Ok(bytecode)
    }
}

/// A fake shader source with in-memory bytecode which counts compilations.
#[derive(Debug, Clone, Default)]
pub struct FakeShaderSource {
    /// Source text per stage, absent stages are not part of the shader.
    pub sources: Vec<(ShaderStage, String)>,

    /// Bytecode returned by `compiled_bytecode()`.
    pub compiled: Vec<(ShaderStage, Vec<u32>)>,

    /// Stages whose compilation fails with a compile error.
    pub invalid: Vec<ShaderStage>,

    /// Every stage compiled, in order.
    pub compiled_stages: Vec<ShaderStage>,
}

impl FakeShaderSource {
    /// A shader with vertex and fragment sources and precompiled bytecode
    /// for both.
    pub fn with_vertex_and_fragment() -> Self {
        Self {
            sources: vec![
                (ShaderStage::Vertex, "vertex".to_owned()),
                (ShaderStage::Fragment, "fragment".to_owned()),
            ],
            compiled: vec![
                (ShaderStage::Vertex, vec![0x0723_0203, 1]),
                (ShaderStage::Fragment, vec![0x0723_0203, 2]),
            ],
            ..Self::default()
        }
    }
}

impl ShaderBytecodeSource for FakeShaderSource {
    fn source_identity(&self, stage: ShaderStage) -> Option<String> {
        self.sources
            .iter()
            .find(|(source_stage, _)| *source_stage == stage)
            .map(|(_, source)| source.clone())
    }

    fn compiled_bytecode(
        &self,
        stage: ShaderStage,
    ) -> Result<Option<Vec<u32>>, ShaderError> {
        Ok(self
            .compiled
            .iter()
            .find(|(compiled_stage, _)| *compiled_stage == stage)
            .map(|(_, bytecode)| bytecode.clone()))
    }

    fn compile(&mut self, stage: ShaderStage) -> Result<Vec<u32>, ShaderError> {
        self.compiled_stages.push(stage);
        if self.source_identity(stage).is_none() {
            return Err(ShaderError::Io {
                path: format!("fake.{}", stage.extension()),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        if self.invalid.contains(&stage) {
            return Err(ShaderError::Compile {
                path: format!("fake.{}", stage.extension()),
                message: "invalid source".to_owned(),
            });
        }
        Ok(vec![0x0723_0203, 100 + stage as u32])
    }
}

#[cfg(test)]
mod test {
    use {super::*, assert2::assert, pretty_assertions::assert_eq};

    #[test]
    fn test_reuse_compiled_skips_compilation() -> Result<(), ShaderError> {
        let mut source = FakeShaderSource::with_vertex_and_fragment();
        let bytecode = fetch_bytecode(&mut source, ShaderStage::Vertex, true)?;
        assert_eq!(bytecode, vec![0x0723_0203, 1]);
        assert!(source.compiled_stages.is_empty());
        Ok(())
    }

    #[test]
    fn test_without_reuse_sources_are_compiled() -> Result<(), ShaderError> {
        let mut source = FakeShaderSource::with_vertex_and_fragment();
        fetch_bytecode(&mut source, ShaderStage::Vertex, false)?;
        fetch_bytecode(&mut source, ShaderStage::Fragment, false)?;
        assert_eq!(
            source.compiled_stages,
            vec![ShaderStage::Vertex, ShaderStage::Fragment]
        );
        Ok(())
    }

    #[test]
    fn test_failed_compile_falls_back_to_compiled_bytecode() {
        let mut source = FakeShaderSource::with_vertex_and_fragment();
        source.invalid.push(ShaderStage::Fragment);
        assert!(
            let Ok(bytecode) =
                fetch_bytecode(&mut source, ShaderStage::Fragment, false)
        );
        assert_eq!(bytecode, vec![0x0723_0203, 2]);
    }

    #[test]
    fn test_missing_stage_is_an_io_error() {
        let mut source = FakeShaderSource::with_vertex_and_fragment();
        assert!(
            let Err(ShaderError::Io { .. }) =
                fetch_bytecode(&mut source, ShaderStage::Geometry, true)
        );
    }

    #[test]
    fn test_file_system_shader_paths() {
        let shader = FileSystemShader::new("shaders", "mesh");
        assert_eq!(
            shader.source_path(ShaderStage::Geometry),
            PathBuf::from("shaders/mesh.geom")
        );
        assert_eq!(
            shader.bytecode_path(ShaderStage::Fragment),
            PathBuf::from("shaders/mesh.frag.spv")
        );
    }

    #[test]
    fn test_file_system_shader_reads_bytecode() -> anyhow::Result<()> {
        let directory = tempfile::tempdir()?;
        let shader = FileSystemShader::new(directory.path(), "quad");
        assert!(shader.compiled_bytecode(ShaderStage::Vertex)?.is_none());
        assert!(shader.source_identity(ShaderStage::Vertex).is_none());

        let words: Vec<u8> = [0x0723_0203_u32, 0x0001_0000]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        std::fs::write(shader.bytecode_path(ShaderStage::Vertex), words)?;

        assert_eq!(
            shader.compiled_bytecode(ShaderStage::Vertex)?,
            Some(vec![0x0723_0203, 0x0001_0000])
        );
        assert!(shader.source_identity(ShaderStage::Vertex).is_some());
        Ok(())
    }
}
