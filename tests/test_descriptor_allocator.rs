//! Tests for descriptor pool growth, merging, and set updates.

use {
    ash::vk::{self, Handle},
    deng_vulkan::{
        descriptor::{
            into_shared, DescriptorAllocator, DescriptorSetHandle,
            DescriptorWrite, FakeDescriptorDevice, MergeGrowth, TextureKind,
            UniformDataLayout, UniformUsage,
        },
        RendererError,
    },
    pretty_assertions::assert_eq,
    std::sync::{Arc, Mutex},
};

mod common;

const FRAMES_IN_FLIGHT: u32 = 2;
const INITIAL_MESH_CAPACITY: u32 = 2;

fn layouts() -> Vec<UniformDataLayout> {
    vec![
        UniformDataLayout::buffer(
            0,
            0,
            64,
            vk::ShaderStageFlags::VERTEX,
            UniformUsage::PerShader,
        ),
        UniformDataLayout::buffer(
            1,
            256,
            64,
            vk::ShaderStageFlags::VERTEX,
            UniformUsage::PerMesh,
        ),
        UniformDataLayout::sampler_2d(
            2,
            vk::ShaderStageFlags::FRAGMENT,
            UniformUsage::PerMesh,
        ),
    ]
}

type SharedFake = Arc<Mutex<FakeDescriptorDevice>>;

fn allocator(
    layouts: &[UniformDataLayout],
) -> Result<(SharedFake, DescriptorAllocator<SharedFake>), RendererError> {
    let fake = into_shared(FakeDescriptorDevice::default());
    let allocator = unsafe {
        DescriptorAllocator::new(
            fake.clone(),
            layouts,
            FRAMES_IN_FLIGHT,
            INITIAL_MESH_CAPACITY,
            MergeGrowth::default(),
        )?
    };
    Ok((fake, allocator))
}

#[test]
fn test_pools_grow_and_merge() -> Result<(), RendererError> {
    common::setup_logger();

    let (fake, mut allocator) = allocator(&layouts())?;
    assert!(allocator.shader_layout().is_some());
    assert!(allocator.mesh_layout().is_some());

    let pool_count = |allocator: &DescriptorAllocator<SharedFake>| {
        allocator.mesh_pools().map(|pools| pools.pool_count())
    };
    let mut meshes: Vec<Vec<DescriptorSetHandle>> = vec![vec![]; 3];
    for (index, sets) in meshes.iter_mut().enumerate() {
        assert!(unsafe { allocator.ensure_mesh_descriptor_sets(sets)? });
        assert_eq!(sets.len(), FRAMES_IN_FLIGHT as usize);
        if index == 1 {
            assert_eq!(pool_count(&allocator), Some(1), "two meshes fit");
        }
    }
    assert_eq!(
        pool_count(&allocator),
        Some(2),
        "the third mesh needs a second pool"
    );

    // Already current sets are kept.
    assert!(!unsafe { allocator.ensure_mesh_descriptor_sets(&mut meshes[0])? });

    assert!(unsafe { allocator.merge_mesh_descriptor_pools()? });
    assert_eq!(fake.lock().unwrap().wait_idle_count, 1);
    let family = allocator.mesh_pools().map(|pools| {
        (pools.pool_count(), pools.capacity(), pools.allocation_counter())
    });
    assert_eq!(family, Some((1, 12, 0)));

    for sets in &meshes {
        assert!(sets.iter().all(|handle| !allocator.is_current(handle)));
    }
    let before = meshes[1].clone();
    assert!(unsafe { allocator.ensure_mesh_descriptor_sets(&mut meshes[1])? });
    assert!(meshes[1].iter().all(|handle| allocator.is_current(handle)));
    assert_ne!(before, meshes[1]);
    {
        let fake = fake.lock().unwrap();
        let &(merged_pool, merged_capacity) =
            fake.created_pools.last().unwrap();
        assert_eq!(merged_capacity, 12);
        assert_eq!(
            fake.sets_allocated_from(merged_pool),
            Some(FRAMES_IN_FLIGHT),
            "re-requested sets come from the merged pool"
        );
    }

    unsafe { allocator.destroy() };
    let fake = fake.lock().unwrap();
    assert!(fake.live_pools.is_empty());
    assert_eq!(fake.live_layouts, 0);
    Ok(())
}

#[test]
fn test_allocations_never_exceed_pool_capacity() -> Result<(), RendererError>
{
    common::setup_logger();

    let (fake, mut allocator) = allocator(&layouts())?;
    for round in 0..4 {
        let mut meshes: Vec<Vec<DescriptorSetHandle>> = vec![vec![]; 9];
        for sets in &mut meshes {
            unsafe { allocator.ensure_mesh_descriptor_sets(sets)? };
        }

        let fake = fake.lock().unwrap();
        for &(max_sets, allocated) in fake.live_pools.values() {
            assert!(
                allocated <= max_sets,
                "round {}: {} sets from a pool of {}",
                round,
                allocated,
                max_sets
            );
        }
        drop(fake);

        unsafe { allocator.merge_mesh_descriptor_pools()? };
    }

    unsafe { allocator.destroy() };
    Ok(())
}

#[test]
fn test_mesh_sets_bind_registered_or_placeholder_textures(
) -> Result<(), RendererError> {
    common::setup_logger();

    let (fake, mut allocator) = allocator(&layouts())?;
    let mut registry = common::registry();
    let texture = registry.register(TextureKind::Image2D, common::handles(7));
    let main_buffer = vk::Buffer::from_raw(99);

    let mut sets = vec![];
    unsafe { allocator.ensure_mesh_descriptor_sets(&mut sets)? };
    let set = sets[1].set;

    unsafe {
        allocator.update_descriptor_set(
            main_buffer,
            set,
            UniformUsage::PerMesh,
            1,
            &[texture],
            &registry,
        );
    }
    let expected_buffer = DescriptorWrite::Buffer {
        binding: 1,
        descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
        buffer: main_buffer,
        offset: 256,
        range: 64,
    };
    assert_eq!(
        fake.lock().unwrap().last_write_to(set).cloned(),
        Some(vec![
            expected_buffer,
            DescriptorWrite::Image {
                binding: 2,
                image_view: vk::ImageView::from_raw(7),
                sampler: vk::Sampler::from_raw(1007),
            },
        ])
    );

    registry.remove(texture);
    unsafe {
        allocator.update_descriptor_set(
            main_buffer,
            set,
            UniformUsage::PerMesh,
            1,
            &[texture],
            &registry,
        );
    }
    assert_eq!(
        fake.lock().unwrap().last_write_to(set).cloned(),
        Some(vec![
            expected_buffer,
            DescriptorWrite::Image {
                binding: 2,
                image_view: vk::ImageView::from_raw(1),
                sampler: vk::Sampler::from_raw(1001),
            },
        ])
    );

    unsafe { allocator.destroy() };
    Ok(())
}

#[test]
fn test_shader_without_mesh_bindings_has_no_mesh_pool(
) -> Result<(), RendererError> {
    common::setup_logger();

    let per_shader_only = &layouts()[..1];
    let (_fake, mut allocator) = allocator(per_shader_only)?;
    assert!(allocator.mesh_layout().is_none());
    assert!(allocator.shader_descriptor_set(0).is_some());
    assert!(allocator.shader_descriptor_set(1).is_some());

    let mut sets = vec![];
    assert!(!unsafe { allocator.ensure_mesh_descriptor_sets(&mut sets)? });
    assert!(sets.is_empty());
    assert!(!unsafe { allocator.merge_mesh_descriptor_pools()? });

    unsafe { allocator.destroy() };
    Ok(())
}

#[test]
fn test_layout_failure_is_reported() {
    common::setup_logger();

    let mut device = FakeDescriptorDevice::default();
    device.fail_layout_creation = true;
    let fake = into_shared(device);
    let result = unsafe {
        DescriptorAllocator::new(
            fake.clone(),
            &layouts(),
            FRAMES_IN_FLIGHT,
            INITIAL_MESH_CAPACITY,
            MergeGrowth::default(),
        )
    };
    assert!(matches!(
        result,
        Err(RendererError::DescriptorSetLayoutCreation(_))
    ));
    assert!(fake.lock().unwrap().live_pools.is_empty());
}
