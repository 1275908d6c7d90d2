use {
    crate::{
        descriptor::{DescriptorDevice, DescriptorWrite},
        RendererError,
    },
    ash::{vk, vk::Handle},
    std::collections::HashMap,
};

/// A fake descriptor device which hands out sequential handles and records
/// every call made to it.
#[derive(Default)]
pub struct FakeDescriptorDevice {
    /// Every pool created, in order, with its capacity.
    pub created_pools: Vec<(vk::DescriptorPool, u32)>,

    /// Pools which have not been destroyed, with the number of sets
    /// allocated from each.
    pub live_pools: HashMap<vk::DescriptorPool, (u32, u32)>,

    /// The number of live descriptor set layouts.
    pub live_layouts: u32,

    /// Every write, in order.
    pub writes: Vec<(vk::DescriptorSet, Vec<DescriptorWrite>)>,

    /// The number of device idle waits.
    pub wait_idle_count: u32,

    /// When set, layout creation fails.
    pub fail_layout_creation: bool,

    /// When set, pool creation fails.
    pub fail_pool_creation: bool,

    next_handle: u64,
}

impl FakeDescriptorDevice {
    /// The number of sets allocated from `pool`, if it is still alive.
    pub fn sets_allocated_from(&self, pool: vk::DescriptorPool) -> Option<u32> {
        self.live_pools.get(&pool).map(|&(_, allocated)| allocated)
    }

    /// The most recent write made to `set`.
    pub fn last_write_to(
        &self,
        set: vk::DescriptorSet,
    ) -> Option<&Vec<DescriptorWrite>> {
        self.writes
            .iter()
            .rev()
            .find(|(written, _)| *written == set)
            .map(|(_, writes)| writes)
    }

    fn next_raw(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl DescriptorDevice for FakeDescriptorDevice {
    unsafe fn create_set_layout(
        &mut self,
        _bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> Result<vk::DescriptorSetLayout, RendererError> {
        if self.fail_layout_creation {
            return Err(RendererError::DescriptorSetLayoutCreation(
                vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            ));
        }
        self.live_layouts += 1;
        Ok(vk::DescriptorSetLayout::from_raw(self.next_raw()))
    }

    unsafe fn destroy_set_layout(&mut self, _layout: vk::DescriptorSetLayout) {
        self.live_layouts -= 1;
    }

    unsafe fn create_pool(
        &mut self,
        max_sets: u32,
        _pool_sizes: &[vk::DescriptorPoolSize],
    ) -> Result<vk::DescriptorPool, RendererError> {
        if self.fail_pool_creation {
            return Err(RendererError::DescriptorPoolCreation(
                max_sets,
                vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            ));
        }
        let pool = vk::DescriptorPool::from_raw(self.next_raw());
        self.created_pools.push((pool, max_sets));
        self.live_pools.insert(pool, (max_sets, 0));
        Ok(pool)
    }

    unsafe fn destroy_pool(&mut self, pool: vk::DescriptorPool) {
        self.live_pools.remove(&pool);
    }

    unsafe fn allocate_sets(
        &mut self,
        pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
        count: u32,
    ) -> Result<Vec<vk::DescriptorSet>, RendererError> {
        let out_of_pool_memory = RendererError::DescriptorSetAllocation(
            count,
            vk::Result::ERROR_OUT_OF_POOL_MEMORY,
        );
        let Some((capacity, allocated)) = self.live_pools.get(&pool).copied()
        else {
            return Err(out_of_pool_memory);
        };
        if allocated + count > capacity {
            return Err(out_of_pool_memory);
        }
        self.live_pools.insert(pool, (capacity, allocated + count));
        Ok((0..count)
            .map(|_| vk::DescriptorSet::from_raw(self.next_raw()))
            .collect())
    }

    unsafe fn write_set(
        &mut self,
        set: vk::DescriptorSet,
        writes: &[DescriptorWrite],
    ) {
        self.writes.push((set, writes.to_vec()));
    }

    unsafe fn wait_idle(&mut self) -> Result<(), RendererError> {
        self.wait_idle_count += 1;
        Ok(())
    }
}
