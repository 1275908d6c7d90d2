//! Frames in flight: the slot ring, the per-slot frame protocol, swapchains,
//! and the framebuffers commands are recorded into.

mod fake_target;
mod framebuffer;
mod protocol;
mod record;
mod slots;
mod swapchain;
mod sync;

pub use self::{
    fake_target::{FakeFrameTarget, FrameEvent},
    framebuffer::{FrameQueues, VulkanFramebuffer},
    protocol::{run_frame, FrameOutcome, FrameTarget},
    record::{
        custom_viewport, flipped_viewport, full_scissor, record_draws,
        DrawCall, RecordTarget,
    },
    slots::FrameSlots,
    swapchain::{
        choose_extent, choose_image_count, choose_present_mode,
        choose_surface_format, SurfaceContext, Swapchain,
    },
    sync::FrameSync,
};
