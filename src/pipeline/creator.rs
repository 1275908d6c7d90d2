use {
    crate::{
        pipeline::{
            descriptor_set_layouts, fetch_bytecode, push_constant_range,
            validate_cache_blob, vertex_input_descriptions, CacheStore,
            DeviceIdentity, FixedFunctionState, PipelineCacheKey, ShaderModule,
            ShaderStage,
        },
        RendererError,
    },
    anyhow::Context,
    ash::vk,
};

/// Bytecode for every stage which will be part of the pipeline.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StageBytecode {
    pub vertex: Vec<u32>,
    pub geometry: Option<Vec<u32>>,
    pub fragment: Vec<u32>,
}

/// Everything needed to build a pipeline which does not touch the device.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub key: PipelineCacheKey,

    /// A validated cache blob, None when the pipeline is built from scratch.
    pub initial_cache: Option<Vec<u8>>,
    pub stages: StageBytecode,
}

/// Load the cached pipeline data and the bytecode for every stage.
///
/// A valid cache blob means the shader was built on this device before, so
/// previously compiled bytecode is reused. Vertex and fragment failures are
/// fatal, a geometry failure only drops the geometry stage.
pub fn prepare_pipeline_inputs(
    shader: &mut ShaderModule,
    store: &dyn CacheStore,
    identity: DeviceIdentity,
) -> Result<PipelineInputs, RendererError> {
    let vertex_identity =
        shader.source.source_identity(ShaderStage::Vertex).unwrap_or_default();
    let geometry_identity =
        shader.source.source_identity(ShaderStage::Geometry);
    let fragment_identity = shader
        .source
        .source_identity(ShaderStage::Fragment)
        .unwrap_or_default();
    let key = PipelineCacheKey::new(
        &vertex_identity,
        geometry_identity.as_deref(),
        &fragment_identity,
        identity,
    );

    let initial_cache = store
        .load(key)
        .filter(|blob| validate_cache_blob(blob, identity));
    let reuse_compiled = initial_cache.is_some();

    let source = shader.source.as_mut();
    let vertex = fetch_bytecode(source, ShaderStage::Vertex, reuse_compiled)?;
    let fragment =
        fetch_bytecode(source, ShaderStage::Fragment, reuse_compiled)?;
    let geometry = match geometry_identity {
        None => None,
        Some(_) => {
            match fetch_bytecode(source, ShaderStage::Geometry, reuse_compiled)
            {
                Ok(bytecode) if !bytecode.is_empty() => Some(bytecode),
                Ok(_) => None,
                Err(error) => {
                    log::warn!(
                        "Omitting the geometry stage of shader {}: {}",
                        shader.name,
                        error
                    );
                    None
                }
            }
        }
    };

    Ok(PipelineInputs {
        key,
        initial_cache,
        stages: StageBytecode {
            vertex,
            geometry,
            fragment,
        },
    })
}

/// A graphics pipeline, its layout, and its pipeline cache.
pub struct PipelineCreator {
    device: ash::Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    cache: vk::PipelineCache,
}

// Public API
// ----------

impl PipelineCreator {
    /// Build the pipeline for a shader.
    ///
    /// # Params
    ///
    /// * `device` - the logical device
    /// * `identity` - identifies the device when validating cached data
    /// * `render_pass` - the render pass the pipeline draws in
    /// * `shader` - the shader, its bytecode may be compiled
    /// * `shader_layout` - the per-shader descriptor set layout, if any
    /// * `mesh_layout` - the per-mesh descriptor set layout, if any
    /// * `store` - persisted pipeline cache blobs
    ///
    /// # Safety
    ///
    /// Unsafe because `destroy()` must be called before the device is
    /// destroyed.
    pub unsafe fn new(
        device: ash::Device,
        identity: DeviceIdentity,
        render_pass: vk::RenderPass,
        shader: &mut ShaderModule,
        shader_layout: Option<vk::DescriptorSetLayout>,
        mesh_layout: Option<vk::DescriptorSetLayout>,
        store: &mut dyn CacheStore,
    ) -> Result<Self, RendererError> {
        let inputs = prepare_pipeline_inputs(shader, store, identity)?;

        let cache_info = vk::PipelineCacheCreateInfo::default()
            .initial_data(inputs.initial_cache.as_deref().unwrap_or(&[]));
        let cache = device
            .create_pipeline_cache(&cache_info, None)
            .context("Unable to create a pipeline cache")?;

        let mut creator = Self {
            device,
            pipeline: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
            cache,
        };
        if let Err(error) = creator.build(
            shader,
            &inputs.stages,
            render_pass,
            descriptor_set_layouts(shader_layout, mesh_layout),
        ) {
            creator.destroy();
            return Err(error);
        }

        if inputs.initial_cache.is_none() {
            creator.persist_cache(inputs.key, store);
        }

        log::debug!(
            "Created pipeline for shader {} ({} cache)",
            shader.name,
            if inputs.initial_cache.is_some() {
                "reused"
            } else {
                "new"
            }
        );
        Ok(creator)
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Destroy the pipeline, its layout, and its cache.
    ///
    /// # Safety
    ///
    /// Unsafe because no pending command buffer may reference the pipeline.
    pub unsafe fn destroy(&mut self) {
        self.device.destroy_pipeline(self.pipeline, None);
        self.device.destroy_pipeline_layout(self.layout, None);
        self.device.destroy_pipeline_cache(self.cache, None);
        self.pipeline = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
        self.cache = vk::PipelineCache::null();
    }
}

// Private API
// -----------

impl PipelineCreator {
    unsafe fn build(
        &mut self,
        shader: &ShaderModule,
        bytecode: &StageBytecode,
        render_pass: vk::RenderPass,
        set_layouts: Vec<vk::DescriptorSetLayout>,
    ) -> Result<(), RendererError> {
        let push_constant_ranges: Vec<vk::PushConstantRange> =
            push_constant_range(shader.push_constant.as_ref())
                .into_iter()
                .collect();
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        self.layout = self
            .device
            .create_pipeline_layout(&layout_info, None)
            .map_err(RendererError::PipelineLayoutCreation)?;

        let mut modules: Vec<(ShaderStage, vk::ShaderModule)> = vec![];
        let stages = [
            (ShaderStage::Vertex, Some(&bytecode.vertex)),
            (ShaderStage::Geometry, bytecode.geometry.as_ref()),
            (ShaderStage::Fragment, Some(&bytecode.fragment)),
        ];
        let mut result: Result<(), RendererError> = Ok(());
        for (stage, code) in stages {
            let Some(code) = code else { continue };
            let module_info = vk::ShaderModuleCreateInfo::default().code(code);
            match self.device.create_shader_module(&module_info, None) {
                Ok(module) => modules.push((stage, module)),
                Err(error) => {
                    result = Err(anyhow::Error::new(error)
                        .context(format!(
                            "Unable to create the {:?} module of {}",
                            stage, shader.name
                        ))
                        .into());
                    break;
                }
            }
        }
        if result.is_ok() {
            result = self.create_pipeline(shader, &modules, render_pass);
        }

        for (_, module) in modules {
            self.device.destroy_shader_module(module, None);
        }
        result
    }

    unsafe fn create_pipeline(
        &mut self,
        shader: &ShaderModule,
        modules: &[(ShaderStage, vk::ShaderModule)],
        render_pass: vk::RenderPass,
    ) -> Result<(), RendererError> {
        let state = FixedFunctionState::from_config(&shader.config);
        let stage_infos: Vec<vk::PipelineShaderStageCreateInfo> = modules
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.stage_flags())
                    .module(*module)
                    .name(c"main")
            })
            .collect();

        let (binding_descriptions, attribute_descriptions) =
            vertex_input_descriptions(&shader.attributes);
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(state.topology)
            .primitive_restart_enable(false);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(state.cull_mode)
            .front_face(state.front_face)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(state.depth_test_enable)
            .depth_write_enable(state.depth_write_enable)
            .depth_compare_op(state.depth_compare_op);
        let blend_attachments = [state.color_blend_attachment];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .attachments(&blend_attachments);
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&state.dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stage_infos)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = self
            .device
            .create_graphics_pipelines(self.cache, &[create_info], None)
            .map_err(|(_, result)| {
                RendererError::PipelineCreation(shader.name.clone(), result)
            })?;
        self.pipeline = pipelines[0];
        Ok(())
    }

    /// Write the pipeline cache data to the store. Failures only cost a
    /// slower startup next time so they are logged and ignored.
    unsafe fn persist_cache(
        &self,
        key: PipelineCacheKey,
        store: &mut dyn CacheStore,
    ) {
        let stored = self
            .device
            .get_pipeline_cache_data(self.cache)
            .context("Unable to read the pipeline cache data")
            .and_then(|data| store.store(key, &data));
        if let Err(error) = stored {
            log::warn!("Pipeline cache was not persisted: {:#}", error);
        }
    }
}
