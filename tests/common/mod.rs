use {
    ash::vk::{self, Handle},
    deng_vulkan::descriptor::{TextureHandles, TextureRegistry},
    flexi_logger::Logger,
    std::sync::Once,
};

static INIT_LOGGER: Once = Once::new();

/// Route log output to stderr for every test in the binary. Safe to call
/// from each test.
pub fn setup_logger() {
    INIT_LOGGER.call_once(|| {
        let started = Logger::try_with_env_or_str("trace")
            .and_then(|logger| logger.log_to_stderr().start());
        if let Ok(handle) = started {
            // the logger stops when its handle is dropped
            std::mem::forget(handle);
        }
    });
}

/// Fake image view and sampler handles derived from `raw`.
#[allow(dead_code)]
pub fn handles(raw: u64) -> TextureHandles {
    TextureHandles {
        image_view: vk::ImageView::from_raw(raw),
        sampler: vk::Sampler::from_raw(raw + 1000),
    }
}

/// A registry whose placeholders use the handles 1 and 2.
#[allow(dead_code)]
pub fn registry() -> TextureRegistry {
    TextureRegistry::new(handles(1), handles(2))
}
