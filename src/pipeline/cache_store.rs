use {
    crate::pipeline::DeviceIdentity,
    anyhow::Context,
    std::{
        collections::HashMap,
        path::{Path, PathBuf},
    },
};

/// Identifies a persisted pipeline cache blob.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PipelineCacheKey(pub u64);

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl PipelineCacheKey {
    /// Hash the shader stage sources together with the device identifiers.
    ///
    /// The hash is stable across runs and platforms so it can name files on
    /// disk.
    pub fn new(
        vertex: &str,
        geometry: Option<&str>,
        fragment: &str,
        device: DeviceIdentity,
    ) -> Self {
        let mut hash = FNV_OFFSET_BASIS;
        let mut feed = |bytes: &[u8]| {
            for byte in bytes {
                hash ^= *byte as u64;
                hash = hash.wrapping_mul(FNV_PRIME);
            }
            // separator so ("ab", "c") and ("a", "bc") differ
            hash ^= 0xff;
            hash = hash.wrapping_mul(FNV_PRIME);
        };
        feed(vertex.as_bytes());
        feed(geometry.unwrap_or("").as_bytes());
        feed(fragment.as_bytes());
        feed(&device.vendor_id.to_le_bytes());
        feed(&device.device_id.to_le_bytes());
        Self(hash)
    }

    pub fn file_name(&self) -> String {
        format!("{:016x}.cache", self.0)
    }
}

/// Persistent storage for pipeline cache blobs.
pub trait CacheStore {
    /// Load the blob stored under `key`, None when there is none.
    fn load(&self, key: PipelineCacheKey) -> Option<Vec<u8>>;

    /// Persist a blob under `key`.
    fn store(
        &mut self,
        key: PipelineCacheKey,
        blob: &[u8],
    ) -> anyhow::Result<()>;
}

/// Stores blobs as `<root>/Vulkan/<key>.cache`.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    directory: PathBuf,
}

impl FileCacheStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            directory: root.as_ref().join("Vulkan"),
        }
    }

    pub fn path_for(&self, key: PipelineCacheKey) -> PathBuf {
        self.directory.join(key.file_name())
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, key: PipelineCacheKey) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(blob) => Some(blob),
            Err(error) => {
                log::trace!(
                    "No pipeline cache at {}: {}",
                    path.display(),
                    error
                );
                None
            }
        }
    }

    fn store(
        &mut self,
        key: PipelineCacheKey,
        blob: &[u8],
    ) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.directory).with_context(|| {
            format!(
                "Unable to create the pipeline cache directory {}",
                self.directory.display()
            )
        })?;
        let path = self.path_for(key);
        std::fs::write(&path, blob).with_context(|| {
            format!("Unable to write the pipeline cache {}", path.display())
        })?;
        log::trace!("Wrote pipeline cache {}", path.display());
        Ok(())
    }
}

/// Keeps blobs in memory, used when no cache directory is configured.
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheStore {
    pub blobs: HashMap<PipelineCacheKey, Vec<u8>>,
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, key: PipelineCacheKey) -> Option<Vec<u8>> {
        self.blobs.get(&key).cloned()
    }

    fn store(
        &mut self,
        key: PipelineCacheKey,
        blob: &[u8],
    ) -> anyhow::Result<()> {
        self.blobs.insert(key, blob.to_vec());
        Ok(())
    }
}
