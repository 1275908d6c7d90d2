use {
    crate::{frame::FrameTarget, RendererError},
    anyhow::anyhow,
};

/// A single call made to a [FakeFrameTarget].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameEvent {
    Wait(usize),
    Acquire(usize),
    Reset(usize),
    Restore(usize),
    Record(usize, u32),
    Submit(usize),
    Present(usize, u32),
}

/// A frame target with one fence per slot which signals as soon as work is
/// submitted.
///
/// Waiting on a fence which was reset but never submitted is reported as an
/// error instead of blocking forever.
#[derive(Debug, Clone)]
pub struct FakeFrameTarget {
    /// Every call, in order.
    pub events: Vec<FrameEvent>,

    /// Whether each slot's fence is signaled.
    pub fences: Vec<bool>,

    /// The number of upcoming acquisitions which fail.
    pub failed_acquisitions: usize,

    /// When set, every present reports an out of date swapchain.
    pub present_out_of_date: bool,

    /// The number of upcoming submissions which fail.
    pub failed_submissions: usize,

    image_count: u32,
    next_image: u32,
}

impl FakeFrameTarget {
    /// A target with `slot_count` signaled fences and `image_count`
    /// swapchain images.
    pub fn new(slot_count: usize, image_count: u32) -> Self {
        Self {
            events: vec![],
            fences: vec![true; slot_count],
            failed_acquisitions: 0,
            present_out_of_date: false,
            failed_submissions: 0,
            image_count: image_count.max(1),
            next_image: 0,
        }
    }

    pub fn record(&mut self, slot: usize, image_index: u32) {
        self.events.push(FrameEvent::Record(slot, image_index));
    }

    /// The slots which submitted work, in order.
    pub fn submitted_slots(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|event| match event {
                FrameEvent::Submit(slot) => Some(*slot),
                _ => None,
            })
            .collect()
    }
}

impl FrameTarget for FakeFrameTarget {
    unsafe fn wait_for_slot(
        &mut self,
        slot: usize,
    ) -> Result<(), RendererError> {
        self.events.push(FrameEvent::Wait(slot));
        if !self.fences[slot] {
            return Err(
                anyhow!("The fence for slot {} never signals", slot).into()
            );
        }
        Ok(())
    }

    unsafe fn acquire_image(
        &mut self,
        slot: usize,
    ) -> Result<Option<u32>, RendererError> {
        self.events.push(FrameEvent::Acquire(slot));
        if self.failed_acquisitions > 0 {
            self.failed_acquisitions -= 1;
            return Ok(None);
        }
        let image = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(Some(image))
    }

    unsafe fn reset_slot(&mut self, slot: usize) -> Result<(), RendererError> {
        self.events.push(FrameEvent::Reset(slot));
        self.fences[slot] = false;
        Ok(())
    }

    unsafe fn restore_slot(
        &mut self,
        slot: usize,
    ) -> Result<(), RendererError> {
        self.events.push(FrameEvent::Restore(slot));
        self.fences[slot] = true;
        Ok(())
    }

    unsafe fn submit(&mut self, slot: usize) -> Result<(), RendererError> {
        if self.failed_submissions > 0 {
            self.failed_submissions -= 1;
            return Err(anyhow!("Submitting slot {} failed", slot).into());
        }
        self.events.push(FrameEvent::Submit(slot));
        self.fences[slot] = true;
        Ok(())
    }

    unsafe fn present(
        &mut self,
        slot: usize,
        image_index: u32,
    ) -> Result<bool, RendererError> {
        self.events.push(FrameEvent::Present(slot, image_index));
        Ok(self.present_out_of_date)
    }
}
