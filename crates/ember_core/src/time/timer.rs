//! # Real-Time Delta Timer
//!
//! Measures wall-clock time between `update()` calls, optionally as a
//! running average over the last N frames to smooth out spikes.

use std::time::Instant;

/// A frame timer.
///
/// With a window size of 1 (the default) [`Self::delta_time`] is simply
/// the duration between the last two [`Self::update`] calls. With a
/// larger window it converges on the windowed running average of recent
/// frame durations, which is what you want when pacing a main loop.
///
/// The constructor records the first timestamp, so call [`Self::update`]
/// once before the block being timed and once after each iteration.
#[derive(Clone, Debug)]
pub struct Timer {
    /// When `update` last ran.
    last_update: Instant,
    /// Current (possibly averaged) frame duration in seconds.
    delta_time: f32,
    /// Circular buffer of recent frame durations.
    window: Vec<f32>,
    /// Total updates so far; indexes the circular buffer.
    frame_idx: u64,
}

impl Timer {
    /// Creates a timer averaging over the last `window_size` frames.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero.
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        assert!(window_size >= 1, "timer window must hold at least one frame");
        Self {
            last_update: Instant::now(),
            delta_time: 0.0,
            window: vec![0.0; window_size],
            frame_idx: 0,
        }
    }

    /// Returns the time between updates in seconds, averaged over the
    /// window when one was configured.
    #[inline]
    #[must_use]
    pub const fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Samples the wall clock and folds the new frame duration into the
    /// running average.
    pub fn update(&mut self) {
        let now = Instant::now();
        let frame_dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        let window_size = self.window.len() as u64;
        let slot = (self.frame_idx % window_size) as usize;

        if self.frame_idx > window_size {
            // Steady state: swap the oldest sample for the newest.
            self.delta_time += (frame_dt - self.window[slot]) / window_size as f32;
        } else {
            // Warm-up: plain cumulative average until the window fills.
            self.delta_time += (frame_dt - self.delta_time) / (self.frame_idx + 1) as f32;
        }

        self.window[slot] = frame_dt;
        self.frame_idx += 1;
    }
}

impl Default for Timer {
    /// A timer with no averaging window.
    fn default() -> Self {
        Self::new(1)
    }
}
