//! Tests for pipeline cache reuse and shader bytecode selection.

use {
    anyhow::Result,
    ash::vk,
    assert2::assert,
    deng_vulkan::{
        pipeline::{
            prepare_pipeline_inputs, CacheStore, DeviceIdentity,
            FakeShaderSource, FileCacheStore, MemoryCacheStore,
            PipelineCacheHeader, ShaderModule, ShaderStage,
            PIPELINE_CACHE_HEADER_SIZE,
        },
        RendererError,
    },
    pretty_assertions::assert_eq,
};

mod common;

const SPIRV_MAGIC: u32 = 0x0723_0203;

const DEVICE: DeviceIdentity = DeviceIdentity {
    vendor_id: 0x1002,
    device_id: 0x73bf,
    pipeline_cache_uuid: [3; vk::UUID_SIZE],
};

fn cache_blob(identity: DeviceIdentity) -> Vec<u8> {
    let header = PipelineCacheHeader {
        header_size: PIPELINE_CACHE_HEADER_SIZE as u32,
        header_version: vk::PipelineCacheHeaderVersion::ONE,
        vendor_id: identity.vendor_id,
        device_id: identity.device_id,
        pipeline_cache_uuid: identity.pipeline_cache_uuid,
    };
    let mut blob = header.to_bytes().to_vec();
    blob.extend_from_slice(&[0x5A; 128]);
    blob
}

fn shader(source: FakeShaderSource) -> ShaderModule {
    ShaderModule::new("lit", Box::new(source))
}

/// Bytecode produced by compiling the stage from source.
fn freshly_compiled(stage: ShaderStage) -> Vec<u32> {
    vec![SPIRV_MAGIC, 100 + stage as u32]
}

#[test]
fn test_valid_cache_reuses_compiled_bytecode() -> Result<()> {
    common::setup_logger();

    let mut store = MemoryCacheStore::default();
    let mut module = shader(FakeShaderSource::with_vertex_and_fragment());

    let first = prepare_pipeline_inputs(&mut module, &store, DEVICE)?;
    assert!(first.initial_cache.is_none());
    assert_eq!(first.stages.vertex, freshly_compiled(ShaderStage::Vertex));
    assert_eq!(
        first.stages.fragment,
        freshly_compiled(ShaderStage::Fragment)
    );

    store.store(first.key, &cache_blob(DEVICE))?;
    let second = prepare_pipeline_inputs(&mut module, &store, DEVICE)?;
    assert_eq!(second.key, first.key);
    assert_eq!(second.initial_cache, Some(cache_blob(DEVICE)));
    assert_eq!(second.stages.vertex, vec![SPIRV_MAGIC, 1]);
    assert_eq!(second.stages.fragment, vec![SPIRV_MAGIC, 2]);
    assert_eq!(second.stages.geometry, None);

    Ok(())
}

#[test]
fn test_cache_from_another_device_is_ignored() -> Result<()> {
    common::setup_logger();

    let mut store = MemoryCacheStore::default();
    let mut module = shader(FakeShaderSource::with_vertex_and_fragment());
    let key = prepare_pipeline_inputs(&mut module, &store, DEVICE)?.key;

    let other_driver = DeviceIdentity {
        pipeline_cache_uuid: [9; vk::UUID_SIZE],
        ..DEVICE
    };
    store.store(key, &cache_blob(other_driver))?;

    let inputs = prepare_pipeline_inputs(&mut module, &store, DEVICE)?;
    assert!(inputs.initial_cache.is_none());
    assert_eq!(inputs.stages.vertex, freshly_compiled(ShaderStage::Vertex));

    store.store(key, &cache_blob(DEVICE)[..16])?;
    let inputs = prepare_pipeline_inputs(&mut module, &store, DEVICE)?;
    assert!(inputs.initial_cache.is_none(), "truncated blob");

    Ok(())
}

#[test]
fn test_changed_source_changes_the_cache_key() -> Result<()> {
    common::setup_logger();

    let store = MemoryCacheStore::default();
    let mut original = shader(FakeShaderSource::with_vertex_and_fragment());
    let mut edited_source = FakeShaderSource::with_vertex_and_fragment();
    edited_source.sources[1].1 = "edited fragment".to_owned();
    let mut edited = shader(edited_source);

    let original_key =
        prepare_pipeline_inputs(&mut original, &store, DEVICE)?.key;
    let edited_key = prepare_pipeline_inputs(&mut edited, &store, DEVICE)?.key;
    assert_ne!(original_key, edited_key);

    Ok(())
}

#[test]
fn test_invalid_geometry_stage_is_omitted() -> Result<()> {
    common::setup_logger();

    let mut source = FakeShaderSource::with_vertex_and_fragment();
    source
        .sources
        .push((ShaderStage::Geometry, "geometry".to_owned()));
    source.invalid.push(ShaderStage::Geometry);
    let mut module = shader(source);

    let inputs = prepare_pipeline_inputs(
        &mut module,
        &MemoryCacheStore::default(),
        DEVICE,
    )?;
    assert_eq!(inputs.stages.geometry, None);
    assert_eq!(inputs.stages.vertex, freshly_compiled(ShaderStage::Vertex));

    Ok(())
}

#[test]
fn test_missing_and_invalid_required_stages_fail() {
    common::setup_logger();

    let mut missing_vertex = FakeShaderSource::with_vertex_and_fragment();
    missing_vertex.sources.remove(0);
    missing_vertex.compiled.remove(0);
    assert!(
        let Err(RendererError::ShaderSourceMissing(_)) =
            prepare_pipeline_inputs(
                &mut shader(missing_vertex),
                &MemoryCacheStore::default(),
                DEVICE,
            )
    );

    let mut invalid_fragment = FakeShaderSource::with_vertex_and_fragment();
    invalid_fragment.compiled.clear();
    invalid_fragment.invalid.push(ShaderStage::Fragment);
    assert!(
        let Err(RendererError::ShaderSourceInvalid(_)) =
            prepare_pipeline_inputs(
                &mut shader(invalid_fragment),
                &MemoryCacheStore::default(),
                DEVICE,
            )
    );
}

#[test]
fn test_file_store_survives_reopening() -> Result<()> {
    common::setup_logger();

    let directory = tempfile::tempdir()?;
    let mut module = shader(FakeShaderSource::with_vertex_and_fragment());

    let mut store = FileCacheStore::new(directory.path());
    let key = prepare_pipeline_inputs(&mut module, &store, DEVICE)?.key;
    store.store(key, &cache_blob(DEVICE))?;
    assert!(store.path_for(key).starts_with(directory.path().join("Vulkan")));

    let reopened = FileCacheStore::new(directory.path());
    let inputs = prepare_pipeline_inputs(&mut module, &reopened, DEVICE)?;
    assert_eq!(inputs.initial_cache, Some(cache_blob(DEVICE)));

    Ok(())
}
