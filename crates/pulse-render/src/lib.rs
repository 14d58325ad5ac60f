// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;

mod clock;
mod color;
mod driver;

pub use clock::{FpsCounter, FrameClock, MonotonicTicks, TickSource, TICKS_PER_SECOND};
pub use color::{Channel, ColorCycle};
pub use driver::{FrameDriver, FrameState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

/// Linear RGBA clear value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearColor(pub [f32; 4]);

/// A presentation backend driven one frame at a time.
///
/// Calls arrive in a fixed order per frame: `record`, `acquire`, `submit`,
/// `present`. `shutdown` is called once after the last frame, possibly
/// without any frame before it.
pub trait FrameTarget {
    /// Rebuilds the per-image command lists with `clear` baked in.
    fn record(&mut self, clear: ClearColor) -> Result<()>;
    fn acquire(&mut self) -> Result<u32>;
    fn submit(&mut self, image_index: u32) -> Result<()>;
    fn present(&mut self, image_index: u32) -> Result<()>;
    fn shutdown(&mut self) -> Result<()>;
}

/// The window side of the loop: a non-blocking message pump and a title.
pub trait WindowHost {
    /// Processes pending messages; false once a quit signal has been seen.
    fn poll(&mut self) -> bool;
    fn set_title(&mut self, title: &str);
}
