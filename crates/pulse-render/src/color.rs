// SPDX-License-Identifier: CEPL-1.0
use crate::ClearColor;

/// One bouncing scalar in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Channel {
    pub value: f32,
    pub velocity: f32,
}

impl Channel {
    /// Out-of-range starts are clamped. NaN starts at 0 and a non-finite
    /// velocity holds the channel still.
    pub fn new(value: f32, velocity: f32) -> Self {
        Self {
            value: if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) },
            velocity: if velocity.is_finite() { velocity } else { 0.0 },
        }
    }

    /// Moves by one velocity step. Crossing a bound pins the value to it and
    /// points the velocity back into the range.
    pub fn step(&mut self) {
        let next = self.value + self.velocity;
        if next > 1.0 {
            self.value = 1.0;
            self.velocity = -self.velocity.abs();
        } else if next < 0.0 {
            self.value = 0.0;
            self.velocity = self.velocity.abs();
        } else {
            self.value = next;
        }
    }
}

/// Three independent channels feeding the clear color, alpha fixed at 1.
#[derive(Clone, Debug)]
pub struct ColorCycle {
    channels: [Channel; 3],
}

impl ColorCycle {
    pub fn new(start: [f32; 3], velocity: [f32; 3]) -> Self {
        Self {
            channels: [
                Channel::new(start[0], velocity[0]),
                Channel::new(start[1], velocity[1]),
                Channel::new(start[2], velocity[2]),
            ],
        }
    }

    pub fn channels(&self) -> &[Channel; 3] {
        &self.channels
    }

    pub fn advance(&mut self) -> ClearColor {
        for c in &mut self.channels {
            c.step();
        }
        self.color()
    }

    pub fn color(&self) -> ClearColor {
        let [r, g, b] = self.channels;
        ClearColor([r.value, g.value, b.value, 1.0])
    }
}
