use {
    crate::pipeline::{
        CullMode, PrimitiveMode, PushConstant, ShaderConfig, VertexAttribute,
    },
    ash::vk,
};

/// Pipeline state derived from a shader's configuration.
#[derive(Debug, Copy, Clone)]
pub struct FixedFunctionState {
    pub topology: vk::PrimitiveTopology,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: vk::CompareOp,
    pub dynamic_states: [vk::DynamicState; 2],
}

impl FixedFunctionState {
    pub fn from_config(config: &ShaderConfig) -> Self {
        let topology = match config.primitive_mode {
            PrimitiveMode::Points => vk::PrimitiveTopology::POINT_LIST,
            PrimitiveMode::Lines => vk::PrimitiveTopology::LINE_LIST,
            PrimitiveMode::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
        };

        // Both winding modes cull back faces, they only disagree on which
        // faces are front facing.
        let (cull_mode, front_face) = match config.cull_mode {
            CullMode::None => {
                (vk::CullModeFlags::NONE, vk::FrontFace::COUNTER_CLOCKWISE)
            }
            CullMode::Clockwise => {
                (vk::CullModeFlags::BACK, vk::FrontFace::CLOCKWISE)
            }
            CullMode::CounterClockwise => {
                (vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE)
            }
        };

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState {
            blend_enable: config.enable_blend as vk::Bool32,
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        };

        Self {
            topology,
            cull_mode,
            front_face,
            color_blend_attachment,
            depth_test_enable: config.enable_depth_testing,
            depth_write_enable: config.enable_depth_testing,
            depth_compare_op: vk::CompareOp::LESS,
            dynamic_states: [
                vk::DynamicState::VIEWPORT,
                vk::DynamicState::SCISSOR,
            ],
        }
    }
}

/// One vertex binding per attribute. Attribute `i` reads binding `i` at
/// location `i`.
pub fn vertex_input_descriptions(
    attributes: &[VertexAttribute],
) -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    let bindings = attributes
        .iter()
        .enumerate()
        .map(|(index, attribute)| vk::VertexInputBindingDescription {
            binding: index as u32,
            stride: attribute.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        })
        .collect();
    let descriptions = attributes
        .iter()
        .enumerate()
        .map(|(index, attribute)| vk::VertexInputAttributeDescription {
            location: index as u32,
            binding: index as u32,
            format: attribute.attribute_type.format(),
            offset: 0,
        })
        .collect();
    (bindings, descriptions)
}

/// The push constant range for a shader, if it uses push constants.
pub fn push_constant_range(
    push_constant: Option<&PushConstant>,
) -> Option<vk::PushConstantRange> {
    push_constant
        .filter(|push_constant| !push_constant.data.is_empty())
        .map(|push_constant| vk::PushConstantRange {
            stage_flags: push_constant.stages,
            offset: 0,
            size: push_constant.data.len() as u32,
        })
}

/// The set layouts of a pipeline layout: the per-shader set first, then the
/// per-mesh set, skipping whichever is absent.
pub fn descriptor_set_layouts(
    shader_layout: Option<vk::DescriptorSetLayout>,
    mesh_layout: Option<vk::DescriptorSetLayout>,
) -> Vec<vk::DescriptorSetLayout> {
    shader_layout.into_iter().chain(mesh_layout).collect()
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::pipeline::VertexAttributeType,
        ash::vk::Handle,
        pretty_assertions::assert_eq,
    };

    #[test]
    fn test_winding_modes_both_cull_back_faces() {
        let clockwise = FixedFunctionState::from_config(&ShaderConfig {
            cull_mode: CullMode::Clockwise,
            ..ShaderConfig::default()
        });
        let counter_clockwise = FixedFunctionState::from_config(&ShaderConfig {
            cull_mode: CullMode::CounterClockwise,
            ..ShaderConfig::default()
        });
        let none = FixedFunctionState::from_config(&ShaderConfig::default());

        assert_eq!(clockwise.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(counter_clockwise.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(clockwise.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(
            counter_clockwise.front_face,
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(none.cull_mode, vk::CullModeFlags::NONE);
    }

    #[test]
    fn test_blend_and_depth_state() {
        let state = FixedFunctionState::from_config(&ShaderConfig {
            enable_blend: true,
            enable_depth_testing: false,
            primitive_mode: PrimitiveMode::Lines,
            ..ShaderConfig::default()
        });
        assert_eq!(state.color_blend_attachment.blend_enable, vk::TRUE);
        assert_eq!(
            state.color_blend_attachment.src_color_blend_factor,
            vk::BlendFactor::SRC_ALPHA
        );
        assert_eq!(
            state.color_blend_attachment.dst_color_blend_factor,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA
        );
        assert!(!state.depth_test_enable);
        assert_eq!(state.topology, vk::PrimitiveTopology::LINE_LIST);
        assert_eq!(
            state.dynamic_states,
            [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
    }

    #[test]
    fn test_vertex_input_uses_one_binding_per_attribute() {
        let (bindings, attributes) = vertex_input_descriptions(&[
            VertexAttribute {
                attribute_type: VertexAttributeType::Vec3Float,
                stride: 12,
            },
            VertexAttribute {
                attribute_type: VertexAttributeType::Vec2Float,
                stride: 8,
            },
        ]);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[1].binding, 1);
        assert_eq!(bindings[1].stride, 8);
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attributes[1].location, 1);
    }

    #[test]
    fn test_push_constant_range() {
        assert!(push_constant_range(None).is_none());
        let range = push_constant_range(Some(&PushConstant {
            stages: vk::ShaderStageFlags::VERTEX
                | vk::ShaderStageFlags::FRAGMENT,
            data: vec![0; 64],
        }))
        .unwrap();
        assert_eq!(range.size, 64);
        assert_eq!(
            range.stage_flags,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_descriptor_set_layouts_skip_absent_layouts() {
        let shader = vk::DescriptorSetLayout::from_raw(1);
        let mesh = vk::DescriptorSetLayout::from_raw(2);
        assert_eq!(descriptor_set_layouts(None, None), vec![]);
        assert_eq!(descriptor_set_layouts(None, Some(mesh)), vec![mesh]);
        assert_eq!(
            descriptor_set_layouts(Some(shader), Some(mesh)),
            vec![shader, mesh]
        );
    }
}
