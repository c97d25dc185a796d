//! Frame timing utilities
//!
//! The world update expects a sane `dt`. After a stalled frame every moving
//! entity would jump, so the clock caps each delta before handing it out.

use std::time::Instant;

/// Default upper bound for a single frame delta, in seconds
pub const DEFAULT_MAX_DELTA: f32 = 0.1;

/// Frame clock producing clamped delta times
pub struct FrameClock {
    last_frame: Instant,
    delta_time: f32,
    raw_delta_time: f32,
    total_time: f32,
    frame_count: u64,
    max_delta: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a new clock with [`DEFAULT_MAX_DELTA`]
    pub fn new() -> Self {
        Self::with_max_delta(DEFAULT_MAX_DELTA)
    }

    /// Create a new clock with a custom delta cap
    pub fn with_max_delta(max_delta: f32) -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            raw_delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
            max_delta,
        }
    }

    /// Sample the wall clock; call once per frame before updating the world
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.advance(elapsed)
    }

    /// Feed an externally measured delta through the clamp
    pub fn advance(&mut self, elapsed: f32) -> f32 {
        self.raw_delta_time = elapsed;
        self.delta_time = clamp_delta(elapsed, self.max_delta);
        if self.raw_delta_time > self.max_delta {
            log::debug!(
                "Frame delta {:.3}s clamped to {:.3}s",
                self.raw_delta_time,
                self.delta_time
            );
        }
        self.total_time += self.delta_time;
        self.frame_count += 1;
        self.delta_time
    }

    /// Clamped delta of the last frame
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Unclamped delta of the last frame
    pub fn raw_delta_time(&self) -> f32 {
        self.raw_delta_time
    }

    /// Sum of clamped deltas since creation
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Current delta cap
    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }
}

/// Clamp a frame delta into `[0, max_delta]`; non-finite input becomes 0
pub fn clamp_delta(dt: f32, max_delta: f32) -> f32 {
    if dt.is_finite() {
        dt.clamp(0.0, max_delta)
    } else {
        0.0
    }
}
