use {
    crate::{
        descriptor::{
            BindingPlan, DescriptorDevice, DescriptorSetHandle, MergeGrowth,
            MeshPoolFamily, TextureId, TextureRegistry, UniformDataLayout,
            UniformUsage,
        },
        RendererError,
    },
    ash::vk,
};

/// Owns the descriptor set layouts and pools for one shader.
///
/// Per-shader sets are allocated up front, one per frame in flight.
/// Per-mesh sets come from a [MeshPoolFamily] which grows as meshes are
/// added and is periodically merged.
pub struct DescriptorAllocator<D: DescriptorDevice> {
    device: D,
    frames_in_flight: u32,
    shader_plan: BindingPlan,
    mesh_plan: BindingPlan,
    shader_layout: Option<vk::DescriptorSetLayout>,
    mesh_layout: Option<vk::DescriptorSetLayout>,
    shader_pool: Option<vk::DescriptorPool>,
    shader_sets: Vec<vk::DescriptorSet>,
    mesh_pools: Option<MeshPoolFamily>,
}

// Public API
// ----------

impl<D: DescriptorDevice> DescriptorAllocator<D> {
    /// Build layouts, pools, and per-shader sets for the given bindings.
    ///
    /// # Params
    ///
    /// * `device` - the device used to create descriptor objects
    /// * `layouts` - every binding used by the shader
    /// * `frames_in_flight` - the number of frames recorded concurrently
    /// * `initial_mesh_capacity` - the number of meshes the first mesh pool
    ///   can serve, each mesh uses one set per frame in flight
    /// * `growth` - the merge growth policy
    ///
    /// # Safety
    ///
    /// Unsafe because `destroy()` must be called before the device is
    /// destroyed.
    pub unsafe fn new(
        device: D,
        layouts: &[UniformDataLayout],
        frames_in_flight: u32,
        initial_mesh_capacity: u32,
        growth: MergeGrowth,
    ) -> Result<Self, RendererError> {
        let frames_in_flight = frames_in_flight.max(1);
        let mut allocator = Self {
            device,
            frames_in_flight,
            shader_plan: BindingPlan::new(layouts, UniformUsage::PerShader),
            mesh_plan: BindingPlan::new(layouts, UniformUsage::PerMesh),
            shader_layout: None,
            mesh_layout: None,
            shader_pool: None,
            shader_sets: vec![],
            mesh_pools: None,
        };

        // Partially created objects are released before returning an error.
        if let Err(error) = allocator.create_descriptor_objects(
            initial_mesh_capacity.max(1) * frames_in_flight,
            growth,
        ) {
            allocator.destroy();
            return Err(error);
        }

        log::trace!(
            "Created descriptor allocator with {} shader bindings and {} \
             mesh bindings",
            allocator.shader_plan.bindings().len(),
            allocator.mesh_plan.bindings().len()
        );
        Ok(allocator)
    }

    /// The layout of the per-shader set, absent when the shader has no
    /// per-shader bindings.
    pub fn shader_layout(&self) -> Option<vk::DescriptorSetLayout> {
        self.shader_layout
    }

    /// The layout of the per-mesh set, absent when the shader has no
    /// per-mesh bindings.
    pub fn mesh_layout(&self) -> Option<vk::DescriptorSetLayout> {
        self.mesh_layout
    }

    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    /// The per-shader set for a frame slot.
    pub fn shader_descriptor_set(
        &self,
        frame_index: usize,
    ) -> Option<vk::DescriptorSet> {
        self.shader_sets.get(frame_index).copied()
    }

    pub fn mesh_pools(&self) -> Option<&MeshPoolFamily> {
        self.mesh_pools.as_ref()
    }

    /// True when the handle was issued after the most recent merge.
    pub fn is_current(&self, handle: &DescriptorSetHandle) -> bool {
        self.mesh_pools
            .as_ref()
            .map(|pools| pools.is_current(handle))
            .unwrap_or(false)
    }

    /// Issue one per-mesh descriptor set.
    ///
    /// Returns None when the shader has no per-mesh bindings.
    ///
    /// # Safety
    ///
    /// Unsafe because the set is destroyed by the next merge.
    pub unsafe fn request_mesh_descriptor_set(
        &mut self,
    ) -> Result<Option<DescriptorSetHandle>, RendererError> {
        match self.mesh_pools.as_mut() {
            Some(pools) => pools.request(&mut self.device).map(Some),
            None => Ok(None),
        }
    }

    /// Make sure `sets` holds one current per-mesh set for every frame in
    /// flight. Stale or missing sets are requested again.
    ///
    /// Returns true when new sets were issued.
    ///
    /// # Safety
    ///
    /// Unsafe because the sets are destroyed by the next merge.
    pub unsafe fn ensure_mesh_descriptor_sets(
        &mut self,
        sets: &mut Vec<DescriptorSetHandle>,
    ) -> Result<bool, RendererError> {
        if self.mesh_pools.is_none() {
            sets.clear();
            return Ok(false);
        }
        let up_to_date = sets.len() == self.frames_in_flight as usize
            && sets.iter().all(|handle| self.is_current(handle));
        if up_to_date {
            return Ok(false);
        }

        sets.clear();
        for _ in 0..self.frames_in_flight {
            if let Some(handle) = self.request_mesh_descriptor_set()? {
                sets.push(handle);
            }
        }
        Ok(true)
    }

    /// Consolidate the per-mesh pools into one larger pool.
    ///
    /// # Safety
    ///
    /// Unsafe because every issued per-mesh set becomes invalid. Callers
    /// holding handles re-request them through
    /// `ensure_mesh_descriptor_sets()`.
    pub unsafe fn merge_mesh_descriptor_pools(
        &mut self,
    ) -> Result<bool, RendererError> {
        match self.mesh_pools.as_mut() {
            Some(pools) => pools.merge(&mut self.device),
            None => Ok(false),
        }
    }

    /// Write buffer and texture bindings into a set.
    ///
    /// Texture ids are consumed in ascending binding order. Missing ids,
    /// unknown ids, and ids of the wrong kind are bound as the registry's
    /// placeholder textures.
    ///
    /// # Safety
    ///
    /// Unsafe because the set must not be in use by pending GPU work.
    pub unsafe fn update_descriptor_set(
        &mut self,
        main_buffer: vk::Buffer,
        set: vk::DescriptorSet,
        usage: UniformUsage,
        frame_index: usize,
        textures: &[TextureId],
        registry: &TextureRegistry,
    ) {
        let plan = match usage {
            UniformUsage::PerShader => &self.shader_plan,
            UniformUsage::PerMesh => &self.mesh_plan,
        };
        if plan.is_empty() {
            return;
        }
        let writes = plan.writes(main_buffer, frame_index, textures, registry);
        self.device.write_set(set, &writes);
    }

    /// Destroy pools and layouts.
    ///
    /// # Safety
    ///
    /// Unsafe because no set from this allocator may be in use.
    pub unsafe fn destroy(&mut self) {
        if let Some(mut pools) = self.mesh_pools.take() {
            pools.destroy(&mut self.device);
        }
        if let Some(pool) = self.shader_pool.take() {
            self.device.destroy_pool(pool);
        }
        self.shader_sets.clear();
        if let Some(layout) = self.shader_layout.take() {
            self.device.destroy_set_layout(layout);
        }
        if let Some(layout) = self.mesh_layout.take() {
            self.device.destroy_set_layout(layout);
        }
    }
}

// Private API
// -----------

impl<D: DescriptorDevice> DescriptorAllocator<D> {
    unsafe fn create_descriptor_objects(
        &mut self,
        mesh_pool_capacity: u32,
        growth: MergeGrowth,
    ) -> Result<(), RendererError> {
        if !self.shader_plan.is_empty() {
            let layout = self
                .device
                .create_set_layout(&self.shader_plan.layout_bindings())?;
            self.shader_layout = Some(layout);

            let pool = self.device.create_pool(
                self.frames_in_flight,
                &self.shader_plan.pool_sizes(self.frames_in_flight),
            )?;
            self.shader_pool = Some(pool);
            self.shader_sets = self.device.allocate_sets(
                pool,
                layout,
                self.frames_in_flight,
            )?;
        }

        if !self.mesh_plan.is_empty() {
            let layout = self
                .device
                .create_set_layout(&self.mesh_plan.layout_bindings())?;
            self.mesh_layout = Some(layout);
            self.mesh_pools = Some(MeshPoolFamily::new(
                &mut self.device,
                layout,
                self.mesh_plan.clone(),
                mesh_pool_capacity,
                growth,
            )?);
        }

        Ok(())
    }
}
