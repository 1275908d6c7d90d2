use {crate::RendererError, ash::vk};

/// Identifies a mesh pushed to the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub usize);

/// Identifies a shader pushed to the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub usize);

/// Identifies a framebuffer. The window framebuffer is created with the
/// renderer context.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub usize);

/// One draw of a mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawCommand {
    /// The main buffer offset of each vertex attribute, in the order the
    /// shader declares them.
    pub attribute_offsets: Vec<u64>,

    /// The main buffer offset of the UINT32 indices when the shader draws
    /// indexed.
    pub index_offset: Option<u64>,

    /// The number of indices, or of vertices for non-indexed draws.
    pub draw_count: u32,

    /// Only used when the shader enables scissoring.
    pub scissor: Option<vk::Rect2D>,
}

/// A drawable unit: a shader and the draw commands which use it.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshReference {
    pub name: String,
    pub shader: ShaderId,
    pub commands: Vec<DrawCommand>,
}

impl MeshReference {
    pub fn new(name: impl Into<String>, shader: ShaderId) -> Self {
        Self {
            name: name.into(),
            shader,
            commands: vec![],
        }
    }

    pub fn with_command(mut self, command: DrawCommand) -> Self {
        self.commands.push(command);
        self
    }

    /// Check the commands against the shader's inputs.
    ///
    /// # Params
    ///
    /// * `attribute_count` - the number of vertex attributes the shader reads
    /// * `indexed` - whether the shader draws with an index buffer
    pub fn validate(
        &self,
        attribute_count: usize,
        indexed: bool,
    ) -> Result<(), RendererError> {
        for (index, command) in self.commands.iter().enumerate() {
            if command.attribute_offsets.len() != attribute_count {
                return Err(anyhow::anyhow!(
                    "Mesh {} command {} has {} attribute offsets, the shader \
                     reads {} attributes",
                    self.name,
                    index,
                    command.attribute_offsets.len(),
                    attribute_count
                )
                .into());
            }
            if indexed && command.index_offset.is_none() {
                return Err(anyhow::anyhow!(
                    "Mesh {} command {} has no index offset but the shader \
                     draws indexed",
                    self.name,
                    index
                )
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use {super::*, assert2::assert};

    fn command(attributes: usize, index_offset: Option<u64>) -> DrawCommand {
        DrawCommand {
            attribute_offsets: (0..attributes as u64)
                .map(|index| index * 64)
                .collect(),
            index_offset,
            draw_count: 3,
            scissor: None,
        }
    }

    #[test]
    fn test_valid_mesh() {
        let mesh = MeshReference::new("triangle", ShaderId(0))
            .with_command(command(2, Some(256)));
        assert!(mesh.validate(2, true).is_ok());
        assert!(mesh.validate(2, false).is_ok());
    }

    #[test]
    fn test_attribute_count_mismatch() {
        let mesh = MeshReference::new("triangle", ShaderId(0))
            .with_command(command(1, None));
        assert!(
            let Err(RendererError::RuntimeError(error)) =
                mesh.validate(2, false)
        );
        assert!(error.to_string().contains("1 attribute offsets"));
    }

    #[test]
    fn test_indexed_shader_requires_index_offset() {
        let mesh = MeshReference::new("quad", ShaderId(0))
            .with_command(command(1, None));
        assert!(mesh.validate(1, true).is_err());
    }
}
