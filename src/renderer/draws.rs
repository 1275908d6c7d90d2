use {
    crate::{
        descriptor::TextureId,
        frame::{custom_viewport, flipped_viewport, full_scissor, DrawCall},
        mesh::{DrawCommand, MeshId, ShaderId},
        pipeline::ShaderModule,
    },
    ash::vk,
};

/// A mesh queued with `draw_mesh()`, waiting for the next frame of its
/// framebuffer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct QueuedDraw {
    pub mesh: MeshId,
    pub shader: ShaderId,
    pub texture_ids: Vec<TextureId>,
}

/// The bound objects shared by every command of one queued draw.
#[derive(Debug, Clone)]
pub struct DrawBindings {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,

    /// The per-shader set followed by the per-mesh set, each only when the
    /// shader has bindings of that kind.
    pub descriptor_sets: Vec<vk::DescriptorSet>,
}

/// Turn a mesh's draw commands into fully resolved draw calls.
pub fn build_draw_calls(
    shader: &ShaderModule,
    bindings: &DrawBindings,
    extent: vk::Extent2D,
    commands: &[DrawCommand],
) -> Vec<DrawCall> {
    let viewport = match &shader.config.custom_viewport {
        Some(viewport) => custom_viewport(viewport),
        None => flipped_viewport(extent),
    };
    let push_constant = shader
        .push_constant
        .as_ref()
        .filter(|push_constant| !push_constant.data.is_empty())
        .map(|push_constant| {
            (push_constant.stages, push_constant.data.clone())
        });

    commands
        .iter()
        .map(|command| DrawCall {
            pipeline: bindings.pipeline,
            layout: bindings.layout,
            viewport,
            scissor: command
                .scissor
                .filter(|_| shader.config.enable_scissor)
                .unwrap_or_else(|| full_scissor(extent)),
            vertex_offsets: command.attribute_offsets.clone(),
            index_offset: command
                .index_offset
                .filter(|_| shader.config.enable_indexing),
            draw_count: command.draw_count,
            descriptor_sets: bindings.descriptor_sets.clone(),
            push_constant: push_constant.clone(),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::pipeline::{FakeShaderSource, PushConstant, Viewport},
        ash::vk::Handle,
        pretty_assertions::assert_eq,
    };

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn shader() -> ShaderModule {
        ShaderModule::new(
            "test",
            Box::new(FakeShaderSource::with_vertex_and_fragment()),
        )
    }

    fn bindings() -> DrawBindings {
        DrawBindings {
            pipeline: vk::Pipeline::from_raw(1),
            layout: vk::PipelineLayout::from_raw(2),
            descriptor_sets: vec![vk::DescriptorSet::from_raw(3)],
        }
    }

    fn command() -> DrawCommand {
        DrawCommand {
            attribute_offsets: vec![0, 1024],
            index_offset: Some(4096),
            draw_count: 36,
            scissor: Some(vk::Rect2D {
                offset: vk::Offset2D { x: 10, y: 10 },
                extent: vk::Extent2D {
                    width: 100,
                    height: 100,
                },
            }),
        }
    }

    #[test]
    fn test_default_shader_draws_indexed_with_full_scissor() {
        let calls =
            build_draw_calls(&shader(), &bindings(), EXTENT, &[command()]);
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.index_offset, Some(4096));
        assert_eq!(call.vertex_offsets, vec![0, 1024]);
        assert_eq!(call.scissor.offset.x, 0);
        assert_eq!(call.scissor.extent.width, 800);
        assert_eq!(call.scissor.extent.height, 600);
        assert_eq!(call.viewport.height, -600.0);
        assert_eq!(call.draw_count, 36);
        assert!(call.push_constant.is_none());
    }

    #[test]
    fn test_shader_config_controls_scissor_indexing_and_viewport() {
        let mut shader = shader();
        shader.config.enable_scissor = true;
        shader.config.enable_indexing = false;
        shader.config.custom_viewport = Some(Viewport {
            x: 0,
            y: 0,
            width: 400,
            height: 300,
        });
        shader.push_constant = Some(PushConstant {
            stages: vk::ShaderStageFlags::VERTEX,
            data: vec![0; 64],
        });

        let calls =
            build_draw_calls(&shader, &bindings(), EXTENT, &[command()]);
        let call = &calls[0];
        assert_eq!(call.index_offset, None);
        assert_eq!(call.scissor.extent.width, 100);
        assert_eq!(call.viewport.height, 300.0);
        assert_eq!(
            call.push_constant,
            Some((vk::ShaderStageFlags::VERTEX, vec![0; 64]))
        );
    }

    #[test]
    fn test_one_call_per_command() {
        let calls = build_draw_calls(
            &shader(),
            &bindings(),
            EXTENT,
            &[command(), command(), command()],
        );
        assert_eq!(calls.len(), 3);
        assert!(calls
            .iter()
            .all(|call| call.descriptor_sets == bindings().descriptor_sets));
    }
}
