// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use tracing::{debug, info};

use crate::clock::{FpsCounter, FrameClock, MonotonicTicks, TickSource};
use crate::color::ColorCycle;
use crate::{FrameTarget, WindowHost};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Submitting,
    Presenting,
    Stopped,
}

/// Steady-state loop: recolor, re-record, acquire, submit, present, count.
///
/// The window is polled once at the top of every iteration; that is the
/// only point where a quit ends the loop.
pub struct FrameDriver<'c, S: TickSource = MonotonicTicks> {
    clock: &'c FrameClock<S>,
    colors: ColorCycle,
    fps: FpsCounter,
    state: FrameState,
    title: String,
    presented: u64,
    frame_limit: Option<u64>,
}

impl<'c, S: TickSource> FrameDriver<'c, S> {
    pub fn new(clock: &'c FrameClock<S>, colors: ColorCycle, title: impl Into<String>) -> Self {
        Self {
            clock,
            colors,
            fps: FpsCounter::starting_at(clock.now()),
            state: FrameState::Idle,
            title: title.into(),
            presented: 0,
            frame_limit: None,
        }
    }

    /// Stops the loop after `limit` presented frames, as if the window had closed.
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn colors(&self) -> &ColorCycle {
        &self.colors
    }

    /// Runs until the window reports quit, then shuts the target down.
    /// Returns the number of presented frames.
    pub fn run<T, W>(&mut self, target: &mut T, window: &mut W) -> Result<u64>
    where
        T: FrameTarget + ?Sized,
        W: WindowHost + ?Sized,
    {
        info!("frame loop started");
        while window.poll() {
            if self.frame_limit.is_some_and(|limit| self.presented >= limit) {
                info!(limit = self.presented, "frame limit reached");
                break;
            }
            self.step(target, window)?;
        }
        self.state = FrameState::Stopped;
        info!(frames = self.presented, "frame loop stopped");
        target.shutdown()?;
        Ok(self.presented)
    }

    /// One full acquire/submit/present cycle.
    pub fn step<T, W>(&mut self, target: &mut T, window: &mut W) -> Result<()>
    where
        T: FrameTarget + ?Sized,
        W: WindowHost + ?Sized,
    {
        let clear = self.colors.advance();
        target.record(clear)?;

        self.state = FrameState::Acquiring;
        let image_index = target.acquire()?;

        self.state = FrameState::Submitting;
        target.submit(image_index)?;

        self.state = FrameState::Presenting;
        target.present(image_index)?;

        self.state = FrameState::Idle;
        self.presented += 1;

        if let Some(fps) = self.fps.record_present(self.clock.now()) {
            debug!(fps, "frame rate");
            window.set_title(&format!("{} | {} fps", self.title, fps));
        }
        Ok(())
    }
}
