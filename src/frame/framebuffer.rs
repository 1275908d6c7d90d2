use {
    crate::{
        descriptor::TextureHandles,
        frame::{
            FrameSlots, FrameSync, FrameTarget, RecordTarget, SurfaceContext,
            Swapchain,
        },
        texture::{create_sampler, ImageDescription, ImageResource},
        MemoryProperties, RendererError,
    },
    anyhow::Context,
    ash::vk,
};

const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
const OFFSCREEN_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// The queues a framebuffer submits and presents on.
#[derive(Debug, Copy, Clone)]
pub struct FrameQueues {
    pub graphics_family: u32,
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

/// Where a framebuffer's color attachment lives.
enum ColorTarget {
    Swapchain {
        swapchain: Swapchain,
        context: SurfaceContext,
    },

    /// A sampled image other shaders can read from once the frame is done.
    Offscreen {
        color: ImageResource,
        sampler: vk::Sampler,
    },
}

/// A render pass with its attachments, per-slot command buffers, and
/// per-slot synchronization.
///
/// Window framebuffers render into the swapchain and keep one slot per frame
/// in flight. Off-screen framebuffers render into a single sampled image and
/// keep a single slot.
pub struct VulkanFramebuffer {
    device: ash::Device,
    memory_properties: MemoryProperties,
    queues: FrameQueues,
    target: ColorTarget,
    render_pass: vk::RenderPass,
    depth: Option<ImageResource>,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    sync: Vec<FrameSync>,
    slots: FrameSlots,
    extent: vk::Extent2D,
    needs_recreation: bool,
}

// Public API
// ----------

impl VulkanFramebuffer {
    /// Create the framebuffer which presents to the window.
    ///
    /// # Safety
    ///
    /// Unsafe because `destroy()` must be called before the device is
    /// destroyed.
    pub unsafe fn for_swapchain(
        device: ash::Device,
        memory_properties: MemoryProperties,
        queues: FrameQueues,
        context: SurfaceContext,
        extent: vk::Extent2D,
        frames_in_flight: usize,
    ) -> Result<Self, RendererError> {
        let swapchain = Swapchain::new(&device, &context, extent, None)?;
        let extent = swapchain.extent();
        let target = ColorTarget::Swapchain { swapchain, context };
        Self::new(
            device,
            memory_properties,
            queues,
            target,
            extent,
            frames_in_flight,
        )
    }

    /// Create a framebuffer which renders into a sampled image.
    ///
    /// # Safety
    ///
    /// Unsafe because `destroy()` must be called before the device is
    /// destroyed.
    pub unsafe fn offscreen(
        device: ash::Device,
        memory_properties: MemoryProperties,
        queues: FrameQueues,
        extent: vk::Extent2D,
        max_anisotropy: f32,
    ) -> Result<Self, RendererError> {
        let mut color =
            create_offscreen_color(&device, &memory_properties, extent)?;
        let sampler = match create_sampler(&device, max_anisotropy) {
            Ok(sampler) => sampler,
            Err(error) => {
                color.destroy(&device);
                return Err(error);
            }
        };
        let target = ColorTarget::Offscreen { color, sampler };
        Self::new(device, memory_properties, queues, target, extent, 1)
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn slots(&self) -> FrameSlots {
        self.slots
    }

    pub fn slots_mut(&mut self) -> &mut FrameSlots {
        &mut self.slots
    }

    /// True after presenting reported an out of date swapchain.
    pub fn needs_recreation(&self) -> bool {
        self.needs_recreation
    }

    pub fn flag_recreation(&mut self) {
        self.needs_recreation = true;
    }

    /// The sampled color image of an off-screen framebuffer.
    pub fn color_texture(&self) -> Option<TextureHandles> {
        match &self.target {
            ColorTarget::Offscreen { color, sampler } => Some(TextureHandles {
                image_view: color.view,
                sampler: *sampler,
            }),
            ColorTarget::Swapchain { .. } => None,
        }
    }

    /// The handles needed to record commands for a slot and image.
    pub fn record_target(
        &self,
        slot: usize,
        image_index: u32,
        clear_color: [f32; 4],
        main_buffer: vk::Buffer,
    ) -> Result<RecordTarget, RendererError> {
        let command_buffer = *self
            .command_buffers
            .get(slot)
            .with_context(|| format!("No command buffer for slot {}", slot))?;
        let framebuffer = *self
            .framebuffers
            .get(image_index as usize)
            .with_context(|| {
                format!("No framebuffer for image {}", image_index)
            })?;
        Ok(RecordTarget {
            command_buffer,
            render_pass: self.render_pass,
            framebuffer,
            extent: self.extent,
            clear_color,
            main_buffer,
        })
    }

    /// Rebuild the attachments at a new size.
    ///
    /// Returns true when the render pass was replaced, which makes pipelines
    /// built against the old one unusable.
    ///
    /// # Safety
    ///
    /// Unsafe because the device is idled and every attachment is replaced.
    pub unsafe fn recreate(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<bool, RendererError> {
        self.device.device_wait_idle().context(
            "Error waiting for the device before recreating a framebuffer",
        )?;
        self.destroy_attachments();

        let desired = vk::Extent2D {
            width: width.max(1),
            height: height.max(1),
        };
        let previous_format = self.color_format();
        match &mut self.target {
            ColorTarget::Swapchain { swapchain, context } => {
                let replacement = Swapchain::new(
                    &self.device,
                    context,
                    desired,
                    Some(&*swapchain),
                )?;
                let mut old = std::mem::replace(swapchain, replacement);
                old.destroy(&self.device);
                self.extent = swapchain.extent();
            }
            ColorTarget::Offscreen { color, .. } => {
                color.destroy(&self.device);
                *color = create_offscreen_color(
                    &self.device,
                    &self.memory_properties,
                    desired,
                )?;
                self.extent = desired;
            }
        }

        let render_pass_replaced = previous_format != self.color_format();
        if render_pass_replaced {
            self.device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();
            self.render_pass = create_render_pass(
                &self.device,
                self.color_format(),
                self.final_layout(),
            )?;
        }
        self.create_attachments()?;
        self.needs_recreation = false;

        log::debug!(
            "Recreated framebuffer at {}x{}",
            self.extent.width,
            self.extent.height
        );
        Ok(render_pass_replaced)
    }

    /// # Safety
    ///
    /// Unsafe because no submitted frame may still be executing.
    pub unsafe fn destroy(&mut self) {
        self.destroy_attachments();
        for sync in self.sync.drain(..) {
            sync.destroy(&self.device);
        }
        self.command_buffers.clear();
        self.device.destroy_command_pool(self.command_pool, None);
        self.command_pool = vk::CommandPool::null();
        self.device.destroy_render_pass(self.render_pass, None);
        self.render_pass = vk::RenderPass::null();
        match &mut self.target {
            ColorTarget::Swapchain { swapchain, .. } => {
                swapchain.destroy(&self.device)
            }
            ColorTarget::Offscreen { color, sampler } => {
                self.device.destroy_sampler(*sampler, None);
                *sampler = vk::Sampler::null();
                color.destroy(&self.device);
            }
        }
    }
}

impl FrameTarget for VulkanFramebuffer {
    unsafe fn wait_for_slot(
        &mut self,
        slot: usize,
    ) -> Result<(), RendererError> {
        self.device
            .wait_for_fences(&[self.sync[slot].in_flight], true, u64::MAX)
            .with_context(|| format!("Error waiting for frame slot {}", slot))?;
        Ok(())
    }

    unsafe fn acquire_image(
        &mut self,
        slot: usize,
    ) -> Result<Option<u32>, RendererError> {
        match &self.target {
            ColorTarget::Swapchain { swapchain, .. } => {
                let acquired = swapchain
                    .acquire_next_image(self.sync[slot].image_available)?;
                if acquired.is_none() {
                    self.needs_recreation = true;
                }
                Ok(acquired)
            }
            ColorTarget::Offscreen { .. } => Ok(Some(0)),
        }
    }

    unsafe fn reset_slot(&mut self, slot: usize) -> Result<(), RendererError> {
        self.device
            .reset_fences(&[self.sync[slot].in_flight])
            .with_context(|| {
                format!("Unable to reset the fence of slot {}", slot)
            })?;
        Ok(())
    }

    unsafe fn restore_slot(
        &mut self,
        slot: usize,
    ) -> Result<(), RendererError> {
        let sync = self.sync[slot];
        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit_info = match self.target {
            // The acquired image is never presented, so the swapchain is
            // rebuilt to get it back.
            ColorTarget::Swapchain { .. } => {
                self.needs_recreation = true;
                vk::SubmitInfo::default()
                    .wait_semaphores(&wait_semaphores)
                    .wait_dst_stage_mask(&wait_stages)
            }
            ColorTarget::Offscreen { .. } => vk::SubmitInfo::default(),
        };
        self.device
            .queue_submit(self.queues.graphics, &[submit_info], sync.in_flight)
            .with_context(|| {
                format!("Unable to restore the fence of slot {}", slot)
            })?;
        Ok(())
    }

    unsafe fn submit(&mut self, slot: usize) -> Result<(), RendererError> {
        let sync = self.sync[slot];
        let command_buffers = [self.command_buffers[slot]];
        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished];

        let submit_info = match self.target {
            ColorTarget::Swapchain { .. } => vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .signal_semaphores(&signal_semaphores)
                .command_buffers(&command_buffers),
            ColorTarget::Offscreen { .. } => {
                vk::SubmitInfo::default().command_buffers(&command_buffers)
            }
        };
        self.device
            .queue_submit(self.queues.graphics, &[submit_info], sync.in_flight)
            .with_context(|| format!("Unable to submit frame slot {}", slot))?;
        Ok(())
    }

    unsafe fn present(
        &mut self,
        slot: usize,
        image_index: u32,
    ) -> Result<bool, RendererError> {
        let ColorTarget::Swapchain { swapchain, .. } = &self.target else {
            return Ok(false);
        };
        match swapchain.present(
            self.queues.present,
            self.sync[slot].render_finished,
            image_index,
        ) {
            Ok(needs_recreation) => {
                self.needs_recreation |= needs_recreation;
                Ok(needs_recreation)
            }
            Err(error) => {
                log::warn!("Presenting frame slot {} failed: {}", slot, error);
                self.needs_recreation = true;
                Ok(true)
            }
        }
    }
}

// Private API
// -----------

impl VulkanFramebuffer {
    unsafe fn new(
        device: ash::Device,
        memory_properties: MemoryProperties,
        queues: FrameQueues,
        target: ColorTarget,
        extent: vk::Extent2D,
        slot_count: usize,
    ) -> Result<Self, RendererError> {
        let slots = FrameSlots::new(slot_count);
        let mut framebuffer = Self {
            device,
            memory_properties,
            queues,
            target,
            render_pass: vk::RenderPass::null(),
            depth: None,
            framebuffers: vec![],
            command_pool: vk::CommandPool::null(),
            command_buffers: vec![],
            sync: vec![],
            slots,
            extent,
            needs_recreation: false,
        };
        if let Err(error) = framebuffer.create_frame_objects() {
            framebuffer.destroy();
            return Err(error);
        }
        Ok(framebuffer)
    }

    unsafe fn create_frame_objects(&mut self) -> Result<(), RendererError> {
        self.render_pass = create_render_pass(
            &self.device,
            self.color_format(),
            self.final_layout(),
        )?;
        self.create_attachments()?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(self.queues.graphics_family);
        self.command_pool = self
            .device
            .create_command_pool(&pool_info, None)
            .context("Unable to create the framebuffer command pool")?;
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(self.slots.count() as u32);
        self.command_buffers = self
            .device
            .allocate_command_buffers(&allocate_info)
            .context("Unable to allocate the frame command buffers")?;

        for _ in 0..self.slots.count() {
            self.sync.push(FrameSync::new(&self.device)?);
        }
        log::trace!(
            "Created {} frame slots for a {}x{} framebuffer",
            self.slots.count(),
            self.extent.width,
            self.extent.height
        );
        Ok(())
    }

    fn color_format(&self) -> vk::Format {
        match &self.target {
            ColorTarget::Swapchain { swapchain, .. } => swapchain.format(),
            ColorTarget::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    fn final_layout(&self) -> vk::ImageLayout {
        match &self.target {
            ColorTarget::Swapchain { .. } => vk::ImageLayout::PRESENT_SRC_KHR,
            ColorTarget::Offscreen { .. } => {
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
            }
        }
    }

    fn color_views(&self) -> Vec<vk::ImageView> {
        match &self.target {
            ColorTarget::Swapchain { swapchain, .. } => {
                swapchain.image_views().to_vec()
            }
            ColorTarget::Offscreen { color, .. } => vec![color.view],
        }
    }

    /// Create the depth image and one framebuffer per color image.
    unsafe fn create_attachments(&mut self) -> Result<(), RendererError> {
        let depth = ImageResource::new(
            &self.device,
            &self.memory_properties,
            ImageDescription {
                extent: self.extent,
                format: DEPTH_FORMAT,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                aspect: vk::ImageAspectFlags::DEPTH,
                cube: false,
            },
        )?;
        let depth_view = depth.view;
        self.depth = Some(depth);

        for color_view in self.color_views() {
            let attachments = [color_view, depth_view];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);
            let framebuffer = self
                .device
                .create_framebuffer(&create_info, None)
                .context("Unable to create a framebuffer")?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    unsafe fn destroy_attachments(&mut self) {
        for framebuffer in self.framebuffers.drain(..) {
            self.device.destroy_framebuffer(framebuffer, None);
        }
        if let Some(mut depth) = self.depth.take() {
            depth.destroy(&self.device);
        }
    }
}

unsafe fn create_offscreen_color(
    device: &ash::Device,
    memory_properties: &MemoryProperties,
    extent: vk::Extent2D,
) -> Result<ImageResource, RendererError> {
    ImageResource::new(
        device,
        memory_properties,
        ImageDescription {
            extent,
            format: OFFSCREEN_FORMAT,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED,
            aspect: vk::ImageAspectFlags::COLOR,
            cube: false,
        },
    )
}

/// A single subpass render pass with one color and one depth attachment.
unsafe fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    final_layout: vk::ImageLayout,
) -> Result<vk::RenderPass, RendererError> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(final_layout),
        vk::AttachmentDescription::default()
            .format(DEPTH_FORMAT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];
    let color_references = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_reference = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_references)
        .depth_stencil_attachment(&depth_reference)];
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependencies = [vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: stages,
        dst_stage_mask: stages,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    }];
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    let render_pass = device
        .create_render_pass(&create_info, None)
        .context("Unable to create a render pass")?;
    Ok(render_pass)
}
