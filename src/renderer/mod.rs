//! The renderer context which owns every Vulkan resource.

mod draws;
mod resize;

pub use self::{
    draws::{build_draw_calls, DrawBindings, QueuedDraw},
    resize::{ResizeDebounce, ResizeState},
};

use {
    crate::{
        command::OneTimeCommands,
        descriptor::{
            AshDescriptorDevice, DescriptorAllocator, DescriptorSetHandle,
            TextureId, TextureKind, TextureRegistry, UniformUsage,
        },
        frame::{
            record_draws, run_frame, DrawCall, FrameOutcome,
            VulkanFramebuffer,
        },
        gpu_memory::{BufferDataType, MainBuffer},
        instance::InstanceCreator,
        mesh::{FramebufferId, MeshId, MeshReference, ShaderId},
        pipeline::{
            CacheStore, DeviceIdentity, FileCacheStore, MemoryCacheStore,
            PipelineCreator, ShaderModule,
        },
        texture::{GpuTexture, TextureResource},
        RendererConfig, RendererError,
    },
    anyhow::Context,
    ash::vk,
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    std::{
        collections::HashMap,
        time::{Duration, Instant},
    },
};

/// The window framebuffer is always the first one.
pub const WINDOW_FRAMEBUFFER: FramebufferId = FramebufferId(0);

struct ShaderEntry {
    module: ShaderModule,
    descriptors: DescriptorAllocator<AshDescriptorDevice>,

    /// The binding epoch each per-shader set was last written in, per frame
    /// slot.
    written: Vec<Option<u64>>,
}

/// Per-mesh sets for one shader, and what each slot's set was written with.
#[derive(Default)]
struct MeshDescriptors {
    sets: Vec<DescriptorSetHandle>,
    written: Vec<Option<(u64, Vec<TextureId>)>>,
}

struct MeshEntry {
    reference: MeshReference,
    descriptors: HashMap<ShaderId, MeshDescriptors>,
}

struct FramebufferEntry {
    framebuffer: VulkanFramebuffer,
    queue: Vec<QueuedDraw>,

    /// The registered color image of an off-screen framebuffer.
    texture: Option<TextureId>,
}

/// The Vulkan renderer context.
///
/// Owns the device, the main buffer, shaders with their descriptor
/// allocators, meshes, textures, framebuffers and their pipelines. Meshes
/// are queued per framebuffer with `draw_mesh()` and drawn by
/// `render_frame()`.
pub struct VulkanRenderer {
    config: RendererConfig,
    identity: DeviceIdentity,
    max_anisotropy: f32,
    shaders: Vec<ShaderEntry>,
    meshes: Vec<Option<MeshEntry>>,
    framebuffers: Vec<Option<FramebufferEntry>>,
    pipelines: HashMap<(ShaderId, FramebufferId), PipelineCreator>,
    registry: TextureRegistry,
    textures: HashMap<TextureId, GpuTexture>,
    main_buffer: MainBuffer,
    commands: OneTimeCommands,
    cache_store: Box<dyn CacheStore>,
    resize: ResizeDebounce,
    frame_count: u64,

    /// Bumped whenever descriptor contents go stale: the main buffer was
    /// replaced or the texture registry changed.
    binding_epoch: u64,
    bound_main_buffer: vk::Buffer,

    // dropped last, after every object created from the device
    instance: InstanceCreator,
}

// Public API
// ----------

impl VulkanRenderer {
    /// Create the renderer context and the window framebuffer.
    ///
    /// # Params
    ///
    /// * `window` - the window to present to
    /// * `size` - the window's drawable size in pixels, used when the
    ///   surface lets the swapchain pick its extent
    /// * `config` - renderer tunables
    ///
    /// # Safety
    ///
    /// Unsafe because the window must outlive the renderer.
    pub unsafe fn create_context<W>(
        window: &W,
        size: (u32, u32),
        config: RendererConfig,
    ) -> Result<(Self, FramebufferId), RendererError>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let config = config.validated()?;
        let instance = InstanceCreator::new(window, &config)?;
        let device = instance.device().clone();
        let info = instance.info().clone();
        let queues = instance.frame_queues();

        let mut commands = OneTimeCommands::new(
            device.clone(),
            queues.graphics_family,
            queues.graphics,
        )?;
        let mut main_buffer = match MainBuffer::new(
            device.clone(),
            instance.memory_properties().clone(),
            config.main_buffer_size,
            config.staging_buffer_size,
            info.min_uniform_alignment,
        ) {
            Ok(main_buffer) => main_buffer,
            Err(error) => {
                commands.destroy();
                return Err(error.into());
            }
        };
        let (missing_2d, missing_cube) = match upload_placeholders(
            &instance,
            &commands,
            info.max_sampler_anisotropy,
        ) {
            Ok(placeholders) => placeholders,
            Err(error) => {
                main_buffer.destroy();
                commands.destroy();
                return Err(error);
            }
        };

        let registry =
            TextureRegistry::new(missing_2d.handles(), missing_cube.handles());
        let mut textures = HashMap::new();
        textures.insert(registry.missing_2d(), missing_2d);
        textures.insert(registry.missing_cube(), missing_cube);

        let cache_store: Box<dyn CacheStore> =
            match &config.pipeline_cache_dir {
                Some(directory) => Box::new(FileCacheStore::new(directory)),
                None => Box::new(MemoryCacheStore::default()),
            };

        let mut renderer = Self {
            identity: instance.device_identity(),
            max_anisotropy: info.max_sampler_anisotropy,
            shaders: vec![],
            meshes: vec![],
            framebuffers: vec![],
            pipelines: HashMap::new(),
            registry,
            textures,
            bound_main_buffer: main_buffer.raw(),
            main_buffer,
            commands,
            cache_store,
            resize: ResizeDebounce::new(Duration::from_millis(
                config.resize_debounce_ms,
            )),
            frame_count: 0,
            binding_epoch: 0,
            config,
            instance,
        };

        let window_framebuffer = VulkanFramebuffer::for_swapchain(
            device,
            renderer.instance.memory_properties().clone(),
            queues,
            renderer.instance.surface_context(),
            vk::Extent2D {
                width: size.0,
                height: size.1,
            },
            renderer.config.frames_in_flight,
        )?;
        renderer.framebuffers.push(Some(FramebufferEntry {
            framebuffer: window_framebuffer,
            queue: vec![],
            texture: None,
        }));

        log::info!(
            "Created the renderer context on {} with {} frames in flight",
            renderer.instance.info().name,
            renderer.config.frames_in_flight
        );
        Ok((renderer, WINDOW_FRAMEBUFFER))
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn instance(&self) -> &InstanceCreator {
        &self.instance
    }

    pub fn main_buffer(&self) -> &MainBuffer {
        &self.main_buffer
    }

    pub fn texture_registry(&self) -> &TextureRegistry {
        &self.registry
    }

    /// Create an off-screen framebuffer whose color image can be sampled by
    /// other shaders through `framebuffer_texture()`.
    pub fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<FramebufferId, RendererError> {
        let framebuffer = unsafe {
            VulkanFramebuffer::offscreen(
                self.instance.device().clone(),
                self.instance.memory_properties().clone(),
                self.instance.frame_queues(),
                vk::Extent2D {
                    width: width.max(1),
                    height: height.max(1),
                },
                self.max_anisotropy,
            )?
        };
        let texture = framebuffer.color_texture().map(|handles| {
            self.registry.register(TextureKind::Framebuffer2D, handles)
        });
        self.binding_epoch += 1;

        let id = FramebufferId(self.framebuffers.len());
        self.framebuffers.push(Some(FramebufferEntry {
            framebuffer,
            queue: vec![],
            texture,
        }));
        log::debug!(
            "Created off-screen framebuffer {:?} {}x{}",
            id,
            width,
            height
        );
        Ok(id)
    }

    /// The texture id of an off-screen framebuffer's color image.
    pub fn framebuffer_texture(&self, id: FramebufferId) -> Option<TextureId> {
        self.framebuffers
            .get(id.0)
            .and_then(Option::as_ref)
            .and_then(|entry| entry.texture)
    }

    /// Register a shader. Its pipelines are built the first time it is drawn
    /// into each framebuffer.
    pub fn push_shader_module(
        &mut self,
        module: ShaderModule,
    ) -> Result<ShaderId, RendererError> {
        let frames_in_flight = self.config.frames_in_flight as u32;
        let descriptors = unsafe {
            DescriptorAllocator::new(
                AshDescriptorDevice::new(self.instance.device().clone()),
                &module.uniform_layouts,
                frames_in_flight,
                self.config.descriptor.initial_mesh_capacity,
                self.config.descriptor.merge_growth(),
            )?
        };
        let id = ShaderId(self.shaders.len());
        log::debug!("Pushed shader {} as {:?}", module.name, id);
        self.shaders.push(ShaderEntry {
            module,
            descriptors,
            written: vec![None; frames_in_flight as usize],
        });
        Ok(id)
    }

    pub fn shader_module(&self, id: ShaderId) -> Option<&ShaderModule> {
        self.shaders.get(id.0).map(|entry| &entry.module)
    }

    /// Register a mesh. Its commands are checked against its shader.
    pub fn push_mesh_reference(
        &mut self,
        mesh: MeshReference,
    ) -> Result<MeshId, RendererError> {
        let shader = self
            .shaders
            .get(mesh.shader.0)
            .ok_or(RendererError::UnknownShader(mesh.shader.0))?;
        mesh.validate(
            shader.module.attributes.len(),
            shader.module.config.enable_indexing,
        )?;

        let id = MeshId(self.meshes.len());
        log::trace!("Pushed mesh {} as {:?}", mesh.name, id);
        self.meshes.push(Some(MeshEntry {
            reference: mesh,
            descriptors: HashMap::new(),
        }));
        Ok(id)
    }

    pub fn mesh_reference(&self, id: MeshId) -> Option<&MeshReference> {
        self.meshes
            .get(id.0)
            .and_then(Option::as_ref)
            .map(|entry| &entry.reference)
    }

    /// Forget a mesh. Its descriptor sets stay allocated until the next pool
    /// merge.
    pub fn remove_mesh_reference(
        &mut self,
        id: MeshId,
    ) -> Result<MeshReference, RendererError> {
        let entry = self
            .meshes
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(RendererError::UnknownMesh(id.0))?;
        for framebuffer in self.framebuffers.iter_mut().flatten() {
            framebuffer.queue.retain(|draw| draw.mesh != id);
        }
        Ok(entry.reference)
    }

    /// Reserve a region of the main buffer. The buffer grows when it is
    /// full.
    pub fn allocate_memory(
        &mut self,
        size: u64,
        data_type: BufferDataType,
    ) -> Result<u64, RendererError> {
        let offset = unsafe {
            self.main_buffer.allocate(size, data_type, &self.commands)?
        };
        Ok(offset)
    }

    pub fn deallocate_memory(
        &mut self,
        offset: u64,
    ) -> Result<(), RendererError> {
        self.main_buffer.deallocate(offset)?;
        Ok(())
    }

    /// Upload uniform data to the main buffer at `offset`.
    ///
    /// # Safety
    ///
    /// Unsafe because no submitted frame may be reading the range.
    pub unsafe fn update_uniform(
        &mut self,
        data: &[u8],
        offset: u64,
    ) -> Result<(), RendererError> {
        self.main_buffer.write(data, offset, &self.commands)?;
        Ok(())
    }

    /// Upload vertex or index data to the main buffer at `offset`.
    ///
    /// # Safety
    ///
    /// Unsafe because no submitted frame may be reading the range.
    pub unsafe fn update_vertex_data_buffer(
        &mut self,
        data: &[u8],
        offset: u64,
    ) -> Result<(), RendererError> {
        self.main_buffer.write(data, offset, &self.commands)?;
        Ok(())
    }

    /// Upload a texture and register it.
    pub fn add_texture_resource(
        &mut self,
        resource: &TextureResource,
    ) -> Result<TextureId, RendererError> {
        let texture = unsafe {
            GpuTexture::upload(
                self.instance.device(),
                self.instance.memory_properties(),
                &self.commands,
                resource,
                self.max_anisotropy,
            )?
        };
        let id = self.registry.register(resource.kind, texture.handles());
        self.textures.insert(id, texture);
        self.binding_epoch += 1;
        Ok(id)
    }

    /// Destroy a texture added with `add_texture_resource()`.
    ///
    /// Sets which referenced it are rewritten with a placeholder before the
    /// next frame. Returns false for placeholders, framebuffer textures, and
    /// unknown ids.
    pub fn remove_texture_resource(
        &mut self,
        id: TextureId,
    ) -> Result<bool, RendererError> {
        if !self.registry.is_removable(id) {
            return Ok(false);
        }
        wait_idle(self.instance.device())?;
        self.registry.remove(id);
        if let Some(mut texture) = self.textures.remove(&id) {
            unsafe { texture.destroy(self.instance.device()) };
        }
        self.binding_epoch += 1;
        Ok(true)
    }

    /// Queue a mesh to be drawn with a shader by the framebuffer's next
    /// `render_frame()`.
    ///
    /// Texture ids fill the mesh's per-mesh sampler bindings in binding
    /// order. Unknown ids are drawn with placeholder textures.
    pub fn draw_mesh(
        &mut self,
        mesh: MeshId,
        shader: ShaderId,
        framebuffer: FramebufferId,
        texture_ids: &[TextureId],
    ) -> Result<(), RendererError> {
        if self.mesh_reference(mesh).is_none() {
            return Err(RendererError::UnknownMesh(mesh.0));
        }
        if shader.0 >= self.shaders.len() {
            return Err(RendererError::UnknownShader(shader.0));
        }
        let entry = self
            .framebuffers
            .get_mut(framebuffer.0)
            .and_then(Option::as_mut)
            .ok_or(RendererError::UnknownFramebuffer(framebuffer.0))?;
        entry.queue.push(QueuedDraw {
            mesh,
            shader,
            texture_ids: texture_ids.to_vec(),
        });
        Ok(())
    }

    /// Draw everything queued for the framebuffer.
    ///
    /// The window framebuffer drops frames while a resize is settling and
    /// after the swapchain went out of date. The queue is cleared either
    /// way.
    pub fn render_frame(
        &mut self,
        id: FramebufferId,
    ) -> Result<FrameOutcome, RendererError> {
        if !self.prepare_framebuffer(id)? {
            if let Some(entry) = self.framebuffer_entry_mut(id) {
                entry.queue.clear();
            }
            return Ok(FrameOutcome::Dropped);
        }

        // safe point: nothing is being recorded
        unsafe { self.main_buffer.release_retired()? };
        if self.main_buffer.raw() != self.bound_main_buffer {
            self.bound_main_buffer = self.main_buffer.raw();
            self.binding_epoch += 1;
        }

        let entry = self
            .framebuffer_entry_mut(id)
            .ok_or(RendererError::UnknownFramebuffer(id.0))?;
        let slot = entry.framebuffer.slots().current();
        let queue = std::mem::take(&mut entry.queue);

        let mut draws = vec![];
        for draw in &queue {
            draws.extend(self.resolve_draw(id, slot, draw)?);
        }

        let device = self.instance.device().clone();
        let clear_color = self.config.clear_color;
        let main_buffer = self.main_buffer.raw();
        let entry = self
            .framebuffer_entry_mut(id)
            .ok_or(RendererError::UnknownFramebuffer(id.0))?;
        let mut slots = entry.framebuffer.slots();
        let outcome = unsafe {
            run_frame(
                &mut entry.framebuffer,
                &mut slots,
                |framebuffer, slot, image_index| {
                    let target = framebuffer.record_target(
                        slot,
                        image_index,
                        clear_color,
                        main_buffer,
                    )?;
                    record_draws(&device, &target, &draws)
                },
            )?
        };
        *entry.framebuffer.slots_mut() = slots;

        self.frame_count += 1;
        let interval = self.config.descriptor.merge_interval_frames;
        if interval > 0 && self.frame_count % interval == 0 {
            self.merge_descriptor_pools()?;
        }
        Ok(outcome)
    }

    /// Consolidate every shader's per-mesh descriptor pools. Meshes request
    /// fresh sets the next time they are drawn.
    pub fn merge_descriptor_pools(&mut self) -> Result<(), RendererError> {
        for shader in &mut self.shaders {
            let merged =
                unsafe { shader.descriptors.merge_mesh_descriptor_pools()? };
            if merged {
                log::debug!(
                    "Merged mesh descriptor pools of {}",
                    shader.module.name
                );
            }
        }
        Ok(())
    }

    /// Ask for the window framebuffer to be resized. Requests are debounced
    /// and applied by `render_frame()`.
    pub fn resize(&mut self, width: u32, height: u32) {
        log::trace!("Resize requested: {}x{}", width, height);
        self.resize.request(width, height, Instant::now());
    }

    /// Rebuild a framebuffer's attachments at a new size right away.
    pub fn recreate_framebuffer(
        &mut self,
        id: FramebufferId,
        width: u32,
        height: u32,
    ) -> Result<(), RendererError> {
        let entry = self
            .framebuffers
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(RendererError::UnknownFramebuffer(id.0))?;
        let render_pass_replaced =
            unsafe { entry.framebuffer.recreate(width, height)? };

        if let (Some(texture), Some(handles)) =
            (entry.texture, entry.framebuffer.color_texture())
        {
            self.registry.replace(texture, handles);
            self.binding_epoch += 1;
        }
        if render_pass_replaced {
            // recreate() idled the device
            self.pipelines.retain(|(_, framebuffer), pipeline| {
                if *framebuffer == id {
                    unsafe { pipeline.destroy() };
                    false
                } else {
                    true
                }
            });
        }
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        unsafe {
            if let Err(error) = self.instance.device().device_wait_idle() {
                log::error!(
                    "Unable to idle the device before teardown: {}",
                    error
                );
            }
            for (_, mut pipeline) in self.pipelines.drain() {
                pipeline.destroy();
            }
            for shader in &mut self.shaders {
                shader.descriptors.destroy();
            }
            for mut entry in self.framebuffers.drain(..).flatten() {
                entry.framebuffer.destroy();
            }
            for (_, mut texture) in self.textures.drain() {
                texture.destroy(self.instance.device());
            }
            self.main_buffer.destroy();
            self.commands.destroy();
        }
    }
}

// Private API
// -----------

impl VulkanRenderer {
    fn framebuffer_entry_mut(
        &mut self,
        id: FramebufferId,
    ) -> Option<&mut FramebufferEntry> {
        self.framebuffers.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Apply pending resizes and recreation requests. Returns false when the
    /// frame must be skipped.
    fn prepare_framebuffer(
        &mut self,
        id: FramebufferId,
    ) -> Result<bool, RendererError> {
        let entry = self
            .framebuffer_entry_mut(id)
            .ok_or(RendererError::UnknownFramebuffer(id.0))?;
        let extent = entry.framebuffer.extent();
        let needs_recreation = entry.framebuffer.needs_recreation();
        if id != WINDOW_FRAMEBUFFER {
            return Ok(true);
        }

        match self.resize.poll(Instant::now()) {
            ResizeState::Settling => Ok(false),
            ResizeState::Ready { width, height } => {
                log::debug!(
                    "Resizing the window framebuffer to {}x{}",
                    width,
                    height
                );
                self.recreate_framebuffer(id, width, height)?;
                Ok(true)
            }
            ResizeState::Idle if needs_recreation => {
                self.recreate_framebuffer(id, extent.width, extent.height)?;
                Ok(true)
            }
            ResizeState::Idle => Ok(true),
        }
    }

    /// Build the pipeline, write stale descriptor sets, and produce the draw
    /// calls for one queued draw.
    fn resolve_draw(
        &mut self,
        id: FramebufferId,
        slot: usize,
        draw: &QueuedDraw,
    ) -> Result<Vec<DrawCall>, RendererError> {
        self.ensure_pipeline(draw.shader, id)?;
        let shader_set = self.write_shader_set(draw.shader, slot)?;
        let mesh_set = self.write_mesh_set(
            draw.mesh,
            draw.shader,
            slot,
            &draw.texture_ids,
        )?;

        let pipeline = self
            .pipelines
            .get(&(draw.shader, id))
            .context("The pipeline was not created")?;
        let shader = self
            .shaders
            .get(draw.shader.0)
            .ok_or(RendererError::UnknownShader(draw.shader.0))?;
        let mesh = self
            .meshes
            .get(draw.mesh.0)
            .and_then(Option::as_ref)
            .ok_or(RendererError::UnknownMesh(draw.mesh.0))?;
        let extent = self
            .framebuffers
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(RendererError::UnknownFramebuffer(id.0))?
            .framebuffer
            .extent();

        let bindings = DrawBindings {
            pipeline: pipeline.pipeline(),
            layout: pipeline.layout(),
            descriptor_sets: shader_set.into_iter().chain(mesh_set).collect(),
        };
        Ok(build_draw_calls(
            &shader.module,
            &bindings,
            extent,
            &mesh.reference.commands,
        ))
    }

    fn ensure_pipeline(
        &mut self,
        shader_id: ShaderId,
        framebuffer_id: FramebufferId,
    ) -> Result<(), RendererError> {
        if self.pipelines.contains_key(&(shader_id, framebuffer_id)) {
            return Ok(());
        }
        let render_pass = self
            .framebuffers
            .get(framebuffer_id.0)
            .and_then(Option::as_ref)
            .ok_or(RendererError::UnknownFramebuffer(framebuffer_id.0))?
            .framebuffer
            .render_pass();
        let shader = self
            .shaders
            .get_mut(shader_id.0)
            .ok_or(RendererError::UnknownShader(shader_id.0))?;

        let pipeline = unsafe {
            PipelineCreator::new(
                self.instance.device().clone(),
                self.identity,
                render_pass,
                &mut shader.module,
                shader.descriptors.shader_layout(),
                shader.descriptors.mesh_layout(),
                self.cache_store.as_mut(),
            )?
        };
        self.pipelines.insert((shader_id, framebuffer_id), pipeline);
        Ok(())
    }

    /// The slot's per-shader set, rewritten when its contents are stale.
    fn write_shader_set(
        &mut self,
        shader_id: ShaderId,
        slot: usize,
    ) -> Result<Option<vk::DescriptorSet>, RendererError> {
        let device = self.instance.device();
        let shader = self
            .shaders
            .get_mut(shader_id.0)
            .ok_or(RendererError::UnknownShader(shader_id.0))?;
        let Some(set) = shader.descriptors.shader_descriptor_set(slot) else {
            return Ok(None);
        };
        let written = &mut shader.written[slot];
        if *written != Some(self.binding_epoch) {
            if written.is_some() {
                wait_idle(device)?;
            }
            unsafe {
                shader.descriptors.update_descriptor_set(
                    self.main_buffer.raw(),
                    set,
                    UniformUsage::PerShader,
                    slot,
                    &shader.module.texture_ids,
                    &self.registry,
                );
            }
            *written = Some(self.binding_epoch);
        }
        Ok(Some(set))
    }

    /// The slot's per-mesh set, requested on first use or after a merge and
    /// rewritten when its contents are stale.
    fn write_mesh_set(
        &mut self,
        mesh_id: MeshId,
        shader_id: ShaderId,
        slot: usize,
        texture_ids: &[TextureId],
    ) -> Result<Option<vk::DescriptorSet>, RendererError> {
        let device = self.instance.device();
        let mesh = self
            .meshes
            .get_mut(mesh_id.0)
            .and_then(Option::as_mut)
            .ok_or(RendererError::UnknownMesh(mesh_id.0))?;
        let shader = self
            .shaders
            .get_mut(shader_id.0)
            .ok_or(RendererError::UnknownShader(shader_id.0))?;
        let state = mesh.descriptors.entry(shader_id).or_default();

        let issued = unsafe {
            shader
                .descriptors
                .ensure_mesh_descriptor_sets(&mut state.sets)?
        };
        if issued {
            state.written = vec![None; state.sets.len()];
        }
        let Some(handle) = state.sets.get(slot).copied() else {
            return Ok(None);
        };

        let wanted = (self.binding_epoch, texture_ids.to_vec());
        let written = &mut state.written[slot];
        if written.as_ref() != Some(&wanted) {
            if written.is_some() {
                wait_idle(device)?;
            }
            unsafe {
                shader.descriptors.update_descriptor_set(
                    self.main_buffer.raw(),
                    handle.set,
                    UniformUsage::PerMesh,
                    slot,
                    texture_ids,
                    &self.registry,
                );
            }
            *written = Some(wanted);
        }
        Ok(Some(handle.set))
    }
}

/// Sets which may be referenced by submitted frames are only rewritten once
/// the device is idle.
fn wait_idle(device: &ash::Device) -> Result<(), RendererError> {
    unsafe {
        device.device_wait_idle().context(
            "Error waiting for the device before a resource update",
        )?;
    }
    Ok(())
}

unsafe fn upload_placeholders(
    instance: &InstanceCreator,
    commands: &OneTimeCommands,
    max_anisotropy: f32,
) -> Result<(GpuTexture, GpuTexture), RendererError> {
    let mut missing_2d = GpuTexture::upload(
        instance.device(),
        instance.memory_properties(),
        commands,
        &TextureResource::missing_2d(),
        max_anisotropy,
    )?;
    match GpuTexture::upload(
        instance.device(),
        instance.memory_properties(),
        commands,
        &TextureResource::missing_cube(),
        max_anisotropy,
    ) {
        Ok(missing_cube) => Ok((missing_2d, missing_cube)),
        Err(error) => {
            missing_2d.destroy(instance.device());
            Err(error)
        }
    }
}
