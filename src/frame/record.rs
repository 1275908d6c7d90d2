use {
    crate::{pipeline::Viewport, RendererError},
    anyhow::Context,
    ash::vk,
};

/// One fully resolved draw: everything needed to record it without looking
/// anything up.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,

    /// The main buffer offset of each vertex attribute, in binding order.
    pub vertex_offsets: Vec<u64>,

    /// The main buffer offset of the UINT32 indices for an indexed draw.
    pub index_offset: Option<u64>,

    /// The index count for indexed draws, the vertex count otherwise.
    pub draw_count: u32,
    pub descriptor_sets: Vec<vk::DescriptorSet>,
    pub push_constant: Option<(vk::ShaderStageFlags, Vec<u8>)>,
}

/// The viewport used when a shader does not set its own. Y is flipped so
/// +Y points up in clip space.
pub fn flipped_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: extent.height as f32,
        width: extent.width as f32,
        height: -(extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn custom_viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x as f32,
        y: viewport.y as f32,
        width: viewport.width as f32,
        height: viewport.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// The targets a frame's commands are recorded against.
#[derive(Debug, Copy, Clone)]
pub struct RecordTarget {
    pub command_buffer: vk::CommandBuffer,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
    pub main_buffer: vk::Buffer,
}

/// Record a render pass containing every draw.
///
/// # Safety
///
/// Unsafe because:
///   - the command buffer must not be pending execution
///   - every handle referenced by `draws` must stay alive until the
///     submission completes
pub unsafe fn record_draws(
    device: &ash::Device,
    target: &RecordTarget,
    draws: &[DrawCall],
) -> Result<(), RendererError> {
    let command_buffer = target.command_buffer;
    device
        .reset_command_buffer(
            command_buffer,
            vk::CommandBufferResetFlags::empty(),
        )
        .context("Unable to reset the frame command buffer")?;
    device
        .begin_command_buffer(
            command_buffer,
            &vk::CommandBufferBeginInfo::default(),
        )
        .context("Unable to begin the frame command buffer")?;

    let clear_values = [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: target.clear_color,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        },
    ];
    let begin_info = vk::RenderPassBeginInfo::default()
        .render_pass(target.render_pass)
        .framebuffer(target.framebuffer)
        .render_area(full_scissor(target.extent))
        .clear_values(&clear_values);
    device.cmd_begin_render_pass(
        command_buffer,
        &begin_info,
        vk::SubpassContents::INLINE,
    );

    for draw in draws {
        record_draw(device, command_buffer, target.main_buffer, draw);
    }

    device.cmd_end_render_pass(command_buffer);
    device
        .end_command_buffer(command_buffer)
        .context("Unable to end the frame command buffer")?;
    Ok(())
}

unsafe fn record_draw(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    main_buffer: vk::Buffer,
    draw: &DrawCall,
) {
    device.cmd_set_viewport(command_buffer, 0, &[draw.viewport]);
    device.cmd_bind_pipeline(
        command_buffer,
        vk::PipelineBindPoint::GRAPHICS,
        draw.pipeline,
    );

    if !draw.vertex_offsets.is_empty() {
        let buffers = vec![main_buffer; draw.vertex_offsets.len()];
        device.cmd_bind_vertex_buffers(
            command_buffer,
            0,
            &buffers,
            &draw.vertex_offsets,
        );
    }

    if !draw.descriptor_sets.is_empty() {
        device.cmd_bind_descriptor_sets(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            draw.layout,
            0,
            &draw.descriptor_sets,
            &[],
        );
    }

    device.cmd_set_scissor(command_buffer, 0, &[draw.scissor]);

    if let Some((stages, data)) = &draw.push_constant {
        device.cmd_push_constants(
            command_buffer,
            draw.layout,
            *stages,
            0,
            data,
        );
    }

    match draw.index_offset {
        Some(offset) => {
            device.cmd_bind_index_buffer(
                command_buffer,
                main_buffer,
                offset,
                vk::IndexType::UINT32,
            );
            device.cmd_draw_indexed(
                command_buffer,
                draw.draw_count,
                1,
                0,
                0,
                0,
            );
        }
        None => device.cmd_draw(command_buffer, draw.draw_count, 1, 0, 0),
    }
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn test_default_viewport_is_flipped() {
        let viewport = flipped_viewport(vk::Extent2D {
            width: 800,
            height: 600,
        });
        assert_eq!(viewport.y, 600.0);
        assert_eq!(viewport.height, -600.0);
        assert_eq!(viewport.width, 800.0);
        assert_eq!(viewport.max_depth, 1.0);
    }

    #[test]
    fn test_custom_viewport_is_not_flipped() {
        let viewport = custom_viewport(&Viewport {
            x: 10,
            y: 20,
            width: 300,
            height: 200,
        });
        assert_eq!((viewport.x, viewport.y), (10.0, 20.0));
        assert_eq!(viewport.height, 200.0);
    }
}
