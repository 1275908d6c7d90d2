use std::time::{Duration, Instant};

/// What a debounced resize wants the renderer to do this frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ResizeState {
    /// No resize is pending.
    Idle,

    /// A resize is pending but the window is still changing size. Frames are
    /// skipped until it settles.
    Settling,

    /// Recreate the window framebuffer at this size.
    Ready { width: u32, height: u32 },
}

/// Coalesces a burst of window resize requests into a single framebuffer
/// recreation.
///
/// The debounce period starts with the first request of a burst. Later
/// requests only update the target size.
#[derive(Debug, Clone)]
pub struct ResizeDebounce {
    period: Duration,
    pending: Option<PendingResize>,
}

#[derive(Debug, Copy, Clone)]
struct PendingResize {
    started: Instant,
    width: u32,
    height: u32,
}

impl ResizeDebounce {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            pending: None,
        }
    }

    pub fn request(&mut self, width: u32, height: u32, now: Instant) {
        let started = self
            .pending
            .map(|pending| pending.started)
            .unwrap_or(now);
        self.pending = Some(PendingResize {
            started,
            width,
            height,
        });
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Check whether the pending resize has settled. A zero sized window,
    /// usually a minimized one, keeps the resize pending.
    pub fn poll(&mut self, now: Instant) -> ResizeState {
        let Some(pending) = self.pending else {
            return ResizeState::Idle;
        };
        let settled = now.saturating_duration_since(pending.started)
            >= self.period;
        if settled && pending.width > 0 && pending.height > 0 {
            self.pending = None;
            ResizeState::Ready {
                width: pending.width,
                height: pending.height,
            }
        } else {
            ResizeState::Settling
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    const PERIOD: Duration = Duration::from_millis(100);

    #[test]
    fn test_idle_without_requests() {
        let mut debounce = ResizeDebounce::new(PERIOD);
        assert_eq!(debounce.poll(Instant::now()), ResizeState::Idle);
        assert!(!debounce.is_pending());
    }

    #[test]
    fn test_burst_is_coalesced_into_the_last_size() {
        let start = Instant::now();
        let mut debounce = ResizeDebounce::new(PERIOD);

        debounce.request(640, 480, start);
        debounce.request(800, 600, start + Duration::from_millis(40));
        assert_eq!(
            debounce.poll(start + Duration::from_millis(60)),
            ResizeState::Settling
        );

        // measured from the first request of the burst
        assert_eq!(
            debounce.poll(start + Duration::from_millis(100)),
            ResizeState::Ready {
                width: 800,
                height: 600
            }
        );
        assert_eq!(
            debounce.poll(start + Duration::from_millis(200)),
            ResizeState::Idle
        );
    }

    #[test]
    fn test_minimized_window_stays_pending() {
        let start = Instant::now();
        let mut debounce = ResizeDebounce::new(PERIOD);
        debounce.request(0, 0, start);
        assert_eq!(
            debounce.poll(start + Duration::from_secs(1)),
            ResizeState::Settling
        );

        debounce.request(1024, 768, start + Duration::from_secs(2));
        assert_eq!(
            debounce.poll(start + Duration::from_secs(2)),
            ResizeState::Ready {
                width: 1024,
                height: 768
            }
        );
    }
}
