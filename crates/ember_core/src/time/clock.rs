//! # Scaled Clock
//!
//! A clock that runs its own timeline at a configurable rate relative to
//! the real-time deltas fed into it. Useful for slowing an animation
//! down, speeding it up, or pausing a subsystem without touching the
//! rest of the frame.

/// Internal ticks per second (nanosecond resolution).
const TICKS_PER_SECOND: f32 = 1_000_000_000.0;

/// Frame rate assumed by [`Clock::step_single_frame`].
const TARGET_FPS: f32 = 60.0;

/// A pausable, scalable game-time clock.
///
/// The clock only advances when [`Self::update`] (or
/// [`Self::step_single_frame`]) is called; it is bookkeeping, not a
/// thread.
#[derive(Clone, Debug)]
pub struct Clock {
    /// Elapsed scaled time in ticks.
    time_ticks: u64,
    /// Rate relative to the deltas fed in.
    time_scale: f32,
    /// Paused clocks ignore updates.
    paused: bool,
}

impl Clock {
    /// Creates a running clock starting at `start_time_seconds` on its
    /// own timeline, advancing at `time_scale` times the fed-in rate.
    #[must_use]
    pub fn new(start_time_seconds: f32, time_scale: f32) -> Self {
        Self {
            time_ticks: seconds_to_ticks(start_time_seconds),
            time_scale,
            paused: false,
        }
    }

    /// Returns elapsed scaled time in ticks.
    #[inline]
    #[must_use]
    pub const fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    /// Returns the clock's rate relative to real time.
    #[inline]
    #[must_use]
    pub const fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Sets the clock's rate relative to real time.
    #[inline]
    pub fn set_time_scale(&mut self, time_scale: f32) {
        self.time_scale = time_scale;
    }

    /// Stops the clock; updates become no-ops.
    #[inline]
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes a paused clock.
    #[inline]
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Difference between this clock and another, in seconds.
    ///
    /// Positive when this clock is ahead. Float precision makes this
    /// only trustworthy for sub-second differences.
    #[must_use]
    pub fn time_difference(&self, other: &Clock) -> f32 {
        let delta_ticks = self.time_ticks as i64 - other.time_ticks as i64;
        delta_ticks as f32 / TICKS_PER_SECOND
    }

    /// Advances the clock by the last frame's duration, scaled.
    ///
    /// Does nothing while paused.
    pub fn update(&mut self, delta_time_seconds: f32) {
        if !self.paused {
            self.time_ticks += seconds_to_ticks(delta_time_seconds * self.time_scale);
        }
    }

    /// Advances the clock by exactly one target-rate frame, scaled.
    ///
    /// Does nothing while paused.
    pub fn step_single_frame(&mut self) {
        if !self.paused {
            self.time_ticks += seconds_to_ticks((1.0 / TARGET_FPS) * self.time_scale);
        }
    }
}

impl Default for Clock {
    /// A clock at t=0 running at real-time rate.
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// Converts seconds to clock ticks.
fn seconds_to_ticks(seconds: f32) -> u64 {
    (TICKS_PER_SECOND * seconds) as u64
}
