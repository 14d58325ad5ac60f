// SPDX-License-Identifier: CEPL-1.0
use std::time::Instant;

/// Ticks are milliseconds.
pub const TICKS_PER_SECOND: u64 = 1000;

pub trait TickSource {
    /// Monotonic tick count since some fixed origin.
    fn ticks(&self) -> u64;
}

#[derive(Debug, Clone)]
pub struct MonotonicTicks {
    origin: Instant,
}

impl TickSource for MonotonicTicks {
    fn ticks(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Tick source for the frame loop.
///
/// Built once during bootstrap and lent to the driver; nothing about it is
/// initialized lazily.
#[derive(Debug, Clone)]
pub struct FrameClock<S: TickSource = MonotonicTicks> {
    source: S,
}

impl FrameClock<MonotonicTicks> {
    pub fn monotonic() -> Self {
        Self {
            source: MonotonicTicks {
                origin: Instant::now(),
            },
        }
    }
}

impl<S: TickSource> FrameClock<S> {
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    pub fn now(&self) -> u64 {
        self.source.ticks()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Rolling present counter over one-second windows.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: u64,
    frames: u32,
}

impl FpsCounter {
    pub fn starting_at(now: u64) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Counts one completed present. Once a full second has elapsed since the
    /// last reset, returns the count for that window and starts a new one.
    pub fn record_present(&mut self, now: u64) -> Option<u32> {
        self.frames = self.frames.saturating_add(1);
        if now.saturating_sub(self.window_start) < TICKS_PER_SECOND {
            return None;
        }
        let fps = self.frames;
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }

    pub fn pending(&self) -> u32 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Manual(Cell<u64>);

    impl TickSource for Manual {
        fn ticks(&self) -> u64 {
            self.0.get()
        }
    }

    #[test]
    fn clock_reads_its_source() {
        let clock = FrameClock::with_source(Manual(Cell::new(7)));
        assert_eq!(clock.now(), 7);
        clock.source().0.set(1500);
        assert_eq!(clock.now(), 1500);
    }

    #[test]
    fn monotonic_clock_never_goes_back() {
        let clock = FrameClock::monotonic();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn reports_presents_after_exactly_one_second() {
        let mut fps = FpsCounter::starting_at(0);
        for t in 1..60u64 {
            assert_eq!(fps.record_present(t * 16), None);
        }
        assert_eq!(fps.pending(), 59);
        assert_eq!(fps.record_present(1000), Some(60));
        assert_eq!(fps.pending(), 0);
    }

    #[test]
    fn window_restarts_at_the_reporting_tick() {
        let mut fps = FpsCounter::starting_at(500);
        assert_eq!(fps.record_present(1499), None);
        assert_eq!(fps.record_present(1500), Some(2));
        assert_eq!(fps.record_present(2499), None);
        assert_eq!(fps.record_present(2500), Some(2));
    }

    #[test]
    fn long_stall_reports_once() {
        let mut fps = FpsCounter::starting_at(0);
        assert_eq!(fps.record_present(5000), Some(1));
        assert_eq!(fps.record_present(5001), None);
    }
}
