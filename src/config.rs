use {
    crate::{descriptor::MergeGrowth, RendererError},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

/// The most frames the renderer will keep in flight.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Tunables for the mesh descriptor pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Mesh descriptor sets per pool before the first merge, per frame in
    /// flight.
    pub initial_mesh_capacity: u32,

    pub merge_growth_numerator: u32,
    pub merge_growth_denominator: u32,

    /// Merge the mesh pools every this many rendered frames. Zero disables
    /// periodic merges.
    pub merge_interval_frames: u64,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            initial_mesh_capacity: 100,
            merge_growth_numerator: 3,
            merge_growth_denominator: 2,
            merge_interval_frames: 600,
        }
    }
}

impl DescriptorConfig {
    pub fn merge_growth(&self) -> MergeGrowth {
        MergeGrowth {
            numerator: self.merge_growth_numerator,
            denominator: self.merge_growth_denominator,
        }
    }
}

/// Everything the renderer context reads when it is created.
///
/// Every field has a default so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub application_name: String,
    pub frames_in_flight: usize,
    pub enable_validation: bool,
    pub clear_color: [f32; 4],

    /// The initial size of the device-local vertex, index and uniform buffer.
    pub main_buffer_size: u64,

    /// The initial size of the host-visible upload buffer.
    pub staging_buffer_size: u64,
    pub descriptor: DescriptorConfig,

    /// Where pipeline cache blobs are persisted. None keeps them in memory.
    pub pipeline_cache_dir: Option<PathBuf>,

    /// Resize requests closer together than this are coalesced.
    pub resize_debounce_ms: u64,

    /// Extensions a device must support, in addition to the swapchain.
    pub required_device_extensions: Vec<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "deng".to_owned(),
            frames_in_flight: 2,
            enable_validation: cfg!(debug_assertions),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            main_buffer_size: 1 << 24,
            staging_buffer_size: 1 << 22,
            descriptor: DescriptorConfig::default(),
            pipeline_cache_dir: None,
            resize_debounce_ms: 100,
            required_device_extensions: vec![],
        }
    }
}

impl RendererConfig {
    /// Parse a config from TOML, then bring out-of-range values back in
    /// range.
    pub fn from_toml_str(source: &str) -> Result<Self, RendererError> {
        let config: Self = toml::from_str(source)
            .map_err(|error| RendererError::Config(error.to_string()))?;
        config.validated()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RendererError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|error| {
            RendererError::Config(format!(
                "unable to read {}: {}",
                path.display(),
                error
            ))
        })?;
        Self::from_toml_str(&source)
    }

    /// Clamp frames in flight and reject values the renderer cannot use.
    pub fn validated(mut self) -> Result<Self, RendererError> {
        let clamped = self.frames_in_flight.clamp(1, MAX_FRAMES_IN_FLIGHT);
        if clamped != self.frames_in_flight {
            log::warn!(
                "frames_in_flight = {} is out of range, using {}",
                self.frames_in_flight,
                clamped
            );
            self.frames_in_flight = clamped;
        }
        if self.descriptor.initial_mesh_capacity == 0 {
            return Err(RendererError::Config(
                "descriptor.initial_mesh_capacity must be at least 1".into(),
            ));
        }
        if self.descriptor.merge_growth_denominator == 0 {
            return Err(RendererError::Config(
                "descriptor.merge_growth_denominator must not be zero".into(),
            ));
        }
        if self.main_buffer_size == 0 || self.staging_buffer_size == 0 {
            return Err(RendererError::Config(
                "buffer sizes must not be zero".into(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod test {
    use {super::*, assert2::assert, pretty_assertions::assert_eq};

    #[test]
    fn test_empty_config_uses_defaults() -> anyhow::Result<()> {
        let config = RendererConfig::from_toml_str("")?;
        assert_eq!(config, RendererConfig::default());
        Ok(())
    }

    #[test]
    fn test_partial_config() -> anyhow::Result<()> {
        let config = RendererConfig::from_toml_str(
            r#"
            application_name = "sandbox"
            frames_in_flight = 3
            clear_color = [0.1, 0.2, 0.3, 1.0]

            [descriptor]
            initial_mesh_capacity = 16
            "#,
        )?;
        assert_eq!(config.application_name, "sandbox");
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.descriptor.initial_mesh_capacity, 16);
        assert_eq!(config.descriptor.merge_growth_numerator, 3);
        assert_eq!(config.main_buffer_size, 1 << 24);
        Ok(())
    }

    #[test]
    fn test_frames_in_flight_are_clamped() -> anyhow::Result<()> {
        let many = RendererConfig::from_toml_str("frames_in_flight = 8")?;
        assert_eq!(many.frames_in_flight, 3);

        let none = RendererConfig::from_toml_str("frames_in_flight = 0")?;
        assert_eq!(none.frames_in_flight, 1);
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(
            let Err(RendererError::Config(_)) =
                RendererConfig::from_toml_str("frames_in_flight = \"two\"")
        );
        assert!(
            let Err(RendererError::Config(message)) =
                RendererConfig::from_toml_str(
                    "[descriptor]\nmerge_growth_denominator = 0"
                )
        );
        assert!(message.contains("merge_growth_denominator"));
    }

    #[test]
    fn test_from_file() -> anyhow::Result<()> {
        let directory = tempfile::tempdir()?;
        let path = directory.path().join("renderer.toml");
        std::fs::write(&path, "enable_validation = false\n")?;

        let config = RendererConfig::from_file(&path)?;
        assert!(!config.enable_validation);

        assert!(
            let Err(RendererError::Config(_)) =
                RendererConfig::from_file(directory.path().join("missing.toml"))
        );
        Ok(())
    }
}
