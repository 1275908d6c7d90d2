use crate::{pipeline::ShaderStage, ShaderError};

/// Compile GLSL source for one stage into SPIR-V words.
///
/// Geometry shaders are not supported by the GLSL frontend and must be
/// supplied as precompiled SPIR-V.
pub fn compile_glsl(
    source: &str,
    stage: ShaderStage,
    path: &str,
) -> Result<Vec<u32>, ShaderError> {
    let compile_error = |message: String| ShaderError::Compile {
        path: path.to_owned(),
        message,
    };

    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
        ShaderStage::Geometry => {
            return Err(compile_error(
                "geometry shaders must be provided as SPIR-V".to_owned(),
            ))
        }
    };

    let module = naga::front::glsl::Frontend::default()
        .parse(&naga::front::glsl::Options::from(naga_stage), source)
        .map_err(|error| compile_error(error.to_string()))?;

    let info = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|error| compile_error(error.to_string()))?;

    naga::back::spv::write_vec(
        &module,
        &info,
        &naga::back::spv::Options::default(),
        None,
    )
    .map_err(|error| compile_error(error.to_string()))
}

#[cfg(test)]
mod test {
    use {super::*, assert2::assert};

    #[test]
    fn test_compile_vertex_shader() {
        let source = "#version 450\n\
            layout(location = 0) in vec3 position;\n\
            void main() {\n\
                gl_Position = vec4(position, 1.0);\n\
            }\n";
        assert!(
            let Ok(words) =
                compile_glsl(source, ShaderStage::Vertex, "test.vert")
        );
        assert_eq!(words[0], 0x0723_0203);
    }

    #[test]
    fn test_invalid_source_is_a_compile_error() {
        assert!(
            let Err(ShaderError::Compile { path, .. }) = compile_glsl(
                "#version 450\nvoid main() { this is not glsl }",
                ShaderStage::Fragment,
                "broken.frag"
            )
        );
        assert_eq!(path, "broken.frag");
    }

    #[test]
    fn test_geometry_stage_is_rejected() {
        assert!(
            let Err(ShaderError::Compile { .. }) =
                compile_glsl("", ShaderStage::Geometry, "a.geom")
        );
    }
}
