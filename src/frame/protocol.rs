use crate::{frame::FrameSlots, RendererError};

/// What happened to a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented.
    Presented,

    /// The frame was submitted, but presenting reported that the swapchain
    /// no longer matches the surface and must be recreated.
    NeedsRecreation,

    /// No image could be acquired. Nothing was recorded or submitted and the
    /// slot is untouched.
    Dropped,
}

/// The device operations used by the per-slot frame protocol.
///
/// Every method receives the slot index so an implementation can keep one
/// fence, semaphore pair, and command buffer per slot.
pub trait FrameTarget {
    /// Block until the slot's fence signals.
    ///
    /// # Safety
    ///
    /// Unsafe because implementations wait on device fences.
    unsafe fn wait_for_slot(
        &mut self,
        slot: usize,
    ) -> Result<(), RendererError>;

    /// Acquire the image to render into. None means the frame must be
    /// dropped, for example because the swapchain is out of date.
    ///
    /// # Safety
    ///
    /// Unsafe because implementations acquire swapchain images.
    unsafe fn acquire_image(
        &mut self,
        slot: usize,
    ) -> Result<Option<u32>, RendererError>;

    /// Reset the slot's fence so the next submission can signal it.
    ///
    /// # Safety
    ///
    /// Unsafe because the fence must not be in use by a pending submission.
    unsafe fn reset_slot(&mut self, slot: usize) -> Result<(), RendererError>;

    /// Signal the slot's fence again after recording or submitting failed,
    /// so the next wait on the slot returns.
    ///
    /// # Safety
    ///
    /// Unsafe because the fence must have been reset without a submission
    /// which signals it.
    unsafe fn restore_slot(
        &mut self,
        slot: usize,
    ) -> Result<(), RendererError>;

    /// Submit the slot's recorded command buffer, signaling its fence.
    ///
    /// # Safety
    ///
    /// Unsafe because the command buffer must be fully recorded.
    unsafe fn submit(&mut self, slot: usize) -> Result<(), RendererError>;

    /// Present the image. Returns true when the swapchain must be recreated.
    ///
    /// # Safety
    ///
    /// Unsafe because the image must have been acquired by this slot.
    unsafe fn present(
        &mut self,
        slot: usize,
        image_index: u32,
    ) -> Result<bool, RendererError>;
}

/// Run one frame: Wait, Acquire, Record, Submit, Present, Advance.
///
/// The slot's fence is reset only after an image was acquired. A dropped
/// frame leaves the fence signaled and does not advance the ring, so the
/// next attempt on the same slot does not block forever. When recording or
/// submitting fails the fence is restored before the error is returned.
///
/// # Params
///
/// * `target` - the framebuffer or swapchain being rendered
/// * `slots` - the frame-in-flight ring, advanced after presenting
/// * `record` - records the slot's command buffer for the acquired image
///
/// # Safety
///
/// Unsafe because:
///   - all resources referenced by the recorded commands must stay alive
///     until the slot's fence signals
pub unsafe fn run_frame<T, F>(
    target: &mut T,
    slots: &mut FrameSlots,
    record: F,
) -> Result<FrameOutcome, RendererError>
where
    T: FrameTarget + ?Sized,
    F: FnOnce(&mut T, usize, u32) -> Result<(), RendererError>,
{
    let slot = slots.current();
    target.wait_for_slot(slot)?;

    let Some(image_index) = target.acquire_image(slot)? else {
        log::debug!("Dropped frame in slot {}", slot);
        return Ok(FrameOutcome::Dropped);
    };

    target.reset_slot(slot)?;
    let submitted = record(target, slot, image_index)
        .and_then(|()| target.submit(slot));
    if let Err(error) = submitted {
        if let Err(restore_error) = target.restore_slot(slot) {
            log::error!(
                "Unable to restore the fence of slot {}: {}",
                slot,
                restore_error
            );
        }
        return Err(error);
    }
    let needs_recreation = target.present(slot, image_index)?;
    slots.advance();

    if needs_recreation {
        log::debug!("Swapchain is out of date after presenting slot {}", slot);
        Ok(FrameOutcome::NeedsRecreation)
    } else {
        Ok(FrameOutcome::Presented)
    }
}
