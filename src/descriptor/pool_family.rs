use {
    crate::{
        descriptor::{BindingPlan, DescriptorDevice},
        RendererError,
    },
    ash::vk,
};

/// A descriptor set plus the pool family generation it was issued in.
///
/// Merging pools destroys every set issued before the merge. Callers compare
/// the generation against the family's current one and request a new set
/// when they differ.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DescriptorSetHandle {
    pub set: vk::DescriptorSet,
    pub generation: u64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PoolFamilyState {
    /// No sets have been issued from the current pools.
    Empty,

    /// Sets are being issued and the newest pool has room.
    Allocating,

    /// Every pool is exhausted. The next request creates a new pool.
    Full,

    /// Pools are being consolidated.
    Merging,
}

/// The multiplier applied to the per-pool capacity when merging.
///
/// New capacity is `capacity * (pool_count * numerator / denominator)`,
/// which compounds across repeated merges.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MergeGrowth {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for MergeGrowth {
    fn default() -> Self {
        Self {
            numerator: 3,
            denominator: 2,
        }
    }
}

impl MergeGrowth {
    /// The per-pool capacity after merging `pool_count` pools of
    /// `capacity` sets each.
    pub fn merged_capacity(&self, capacity: u32, pool_count: u32) -> u32 {
        let factor = (pool_count.saturating_mul(self.numerator)
            / self.denominator.max(1))
        .max(1);
        capacity.saturating_mul(factor)
    }
}

/// The growing set of descriptor pools which back per-mesh descriptor sets.
pub struct MeshPoolFamily {
    layout: vk::DescriptorSetLayout,
    plan: BindingPlan,
    growth: MergeGrowth,

    /// The number of sets each pool can hold.
    capacity: u32,
    pools: Vec<vk::DescriptorPool>,

    /// Sets issued since the family was created or last merged.
    allocation_counter: u32,
    generation: u64,
    state: PoolFamilyState,
}

// Public API
// ----------

impl MeshPoolFamily {
    /// Create the family with one pool of `capacity` sets.
    ///
    /// # Safety
    ///
    /// Unsafe because `destroy()` must be called before the device is
    /// destroyed.
    pub unsafe fn new<D: DescriptorDevice>(
        device: &mut D,
        layout: vk::DescriptorSetLayout,
        plan: BindingPlan,
        capacity: u32,
        growth: MergeGrowth,
    ) -> Result<Self, RendererError> {
        let capacity = capacity.max(1);
        let pool = device.create_pool(capacity, &plan.pool_sizes(capacity))?;
        Ok(Self {
            layout,
            plan,
            growth,
            capacity,
            pools: vec![pool],
            allocation_counter: 0,
            generation: 0,
            state: PoolFamilyState::Empty,
        })
    }

    pub fn state(&self) -> PoolFamilyState {
        self.state
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn allocation_counter(&self) -> u32 {
        self.allocation_counter
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The total number of sets the current pools can hold.
    pub fn cumulative_capacity(&self) -> u32 {
        self.capacity.saturating_mul(self.pools.len() as u32)
    }

    /// True when `handle` was issued after the most recent merge.
    pub fn is_current(&self, handle: &DescriptorSetHandle) -> bool {
        handle.generation == self.generation
    }

    /// Issue a descriptor set, adding a pool of the same capacity when every
    /// existing pool is exhausted.
    ///
    /// # Safety
    ///
    /// Unsafe because the set is only valid until the next merge.
    pub unsafe fn request<D: DescriptorDevice>(
        &mut self,
        device: &mut D,
    ) -> Result<DescriptorSetHandle, RendererError> {
        if self.allocation_counter >= self.cumulative_capacity() {
            let pool = device.create_pool(
                self.capacity,
                &self.plan.pool_sizes(self.capacity),
            )?;
            self.pools.push(pool);
            log::debug!(
                "Mesh descriptor pools exhausted after {} sets, now using {} \
                 pools",
                self.allocation_counter,
                self.pools.len()
            );
        }

        let pool = self.pools[self.pools.len() - 1];
        let sets = device.allocate_sets(pool, self.layout, 1)?;
        self.allocation_counter += 1;
        self.state = if self.allocation_counter >= self.cumulative_capacity() {
            PoolFamilyState::Full
        } else {
            PoolFamilyState::Allocating
        };

        Ok(DescriptorSetHandle {
            set: sets[0],
            generation: self.generation,
        })
    }

    /// Replace every pool with a single larger one.
    ///
    /// Does nothing and returns false when there is only one pool. Otherwise
    /// waits for the device to go idle, destroys all pools, and creates one
    /// pool with the merged capacity. Every handle issued before the merge is
    /// stale afterwards.
    ///
    /// # Safety
    ///
    /// Unsafe because every previously issued set is destroyed.
    pub unsafe fn merge<D: DescriptorDevice>(
        &mut self,
        device: &mut D,
    ) -> Result<bool, RendererError> {
        if self.pools.len() <= 1 {
            return Ok(false);
        }

        let previous_state = self.state;
        self.state = PoolFamilyState::Merging;
        if let Err(error) = device.wait_idle() {
            self.state = previous_state;
            return Err(error);
        }

        let merged_capacity = self
            .growth
            .merged_capacity(self.capacity, self.pools.len() as u32);
        log::debug!(
            "Merging {} mesh descriptor pools of {} sets into one pool of {}",
            self.pools.len(),
            self.capacity,
            merged_capacity
        );

        for pool in self.pools.drain(..) {
            device.destroy_pool(pool);
        }
        self.allocation_counter = 0;
        self.generation += 1;
        self.capacity = merged_capacity;

        let pool = device.create_pool(
            merged_capacity,
            &self.plan.pool_sizes(merged_capacity),
        )?;
        self.pools.push(pool);
        self.state = PoolFamilyState::Empty;
        Ok(true)
    }

    /// Destroy every pool.
    ///
    /// # Safety
    ///
    /// Unsafe because no issued set may be in use by the device.
    pub unsafe fn destroy<D: DescriptorDevice>(&mut self, device: &mut D) {
        for pool in self.pools.drain(..) {
            device.destroy_pool(pool);
        }
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::descriptor::{
            FakeDescriptorDevice, UniformDataLayout, UniformUsage,
        },
        ash::vk::Handle,
        pretty_assertions::assert_eq,
    };

    fn plan() -> BindingPlan {
        BindingPlan::new(
            &[UniformDataLayout::buffer(
                0,
                0,
                64,
                vk::ShaderStageFlags::VERTEX,
                UniformUsage::PerMesh,
            )],
            UniformUsage::PerMesh,
        )
    }

    fn family(
        device: &mut FakeDescriptorDevice,
        capacity: u32,
    ) -> MeshPoolFamily {
        unsafe {
            MeshPoolFamily::new(
                device,
                vk::DescriptorSetLayout::from_raw(1000),
                plan(),
                capacity,
                MergeGrowth::default(),
            )
            .unwrap()
        }
    }

    #[test]
    fn test_merged_capacity_compounds() {
        let growth = MergeGrowth::default();
        assert_eq!(growth.merged_capacity(4, 2), 12);
        assert_eq!(growth.merged_capacity(12, 3), 48);
        assert_eq!(growth.merged_capacity(4, 1), 4);
        assert_eq!(
            MergeGrowth {
                numerator: 1,
                denominator: 0
            }
            .merged_capacity(4, 2),
            8
        );
    }

    #[test]
    fn test_state_transitions() -> Result<(), RendererError> {
        let mut device = FakeDescriptorDevice::default();
        let mut family = family(&mut device, 2);
        assert_eq!(family.state(), PoolFamilyState::Empty);

        unsafe {
            family.request(&mut device)?;
            assert_eq!(family.state(), PoolFamilyState::Allocating);
            family.request(&mut device)?;
            assert_eq!(family.state(), PoolFamilyState::Full);
            family.request(&mut device)?;
            assert_eq!(family.state(), PoolFamilyState::Allocating);
            assert!(family.merge(&mut device)?);
        }
        assert_eq!(family.state(), PoolFamilyState::Empty);
        Ok(())
    }

    #[test]
    fn test_merge_with_a_single_pool_is_a_no_op() -> Result<(), RendererError>
    {
        let mut device = FakeDescriptorDevice::default();
        let mut family = family(&mut device, 4);
        unsafe {
            family.request(&mut device)?;
            assert!(!family.merge(&mut device)?);
        }
        assert_eq!(device.wait_idle_count, 0);
        assert_eq!(family.allocation_counter(), 1);
        assert_eq!(family.generation(), 0);
        Ok(())
    }

    #[test]
    fn test_handles_go_stale_after_merge() -> Result<(), RendererError> {
        let mut device = FakeDescriptorDevice::default();
        let mut family = family(&mut device, 1);
        let (first, second) = unsafe {
            (family.request(&mut device)?, family.request(&mut device)?)
        };
        assert!(family.is_current(&first));
        assert!(family.is_current(&second));

        unsafe { family.merge(&mut device)? };

        assert!(!family.is_current(&first));
        assert!(!family.is_current(&second));
        let fresh = unsafe { family.request(&mut device)? };
        assert!(family.is_current(&fresh));
        Ok(())
    }
}
