/// The round-robin ring of frame-in-flight slots.
///
/// Slot `i` owns the i'th fence, semaphore pair, and command buffer of a
/// framebuffer. A slot is reused only after its fence has signaled.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameSlots {
    count: usize,
    current: usize,
}

impl FrameSlots {
    /// Create a ring with `count` slots. There is always at least one slot.
    pub fn new(count: usize) -> Self {
        Self {
            count: count.max(1),
            current: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The slot the next frame will use.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Move to the next slot and return it.
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.count;
        self.current
    }
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn test_slots_rotate_in_order() {
        let mut slots = FrameSlots::new(3);
        let visited: Vec<usize> = (0..7)
            .map(|_| {
                let slot = slots.current();
                slots.advance();
                slot
            })
            .collect();
        assert_eq!(visited, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_zero_slots_is_one_slot() {
        let mut slots = FrameSlots::new(0);
        assert_eq!(slots.count(), 1);
        assert_eq!(slots.advance(), 0);
    }
}
