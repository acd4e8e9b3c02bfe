//! Simulation clock
//!
//! Time advances in whole ticks. Each tick covers `tick_duration * speed`
//! simulated seconds, so the speed multiplier changes how much happens per
//! step without changing the step count.

/// Slowest allowed speed multiplier
pub const MIN_SPEED: f32 = 0.1;

/// Fastest allowed speed multiplier
pub const MAX_SPEED: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    tick: u64,
    tick_duration: f32,
    speed: f32,
    running: bool,
    elapsed: f32,
}

impl SimClock {
    pub fn new(tick_duration: f32) -> Self {
        Self {
            tick: 0,
            tick_duration,
            speed: 1.0,
            running: true,
            elapsed: 0.0,
        }
    }

    /// Advance by one tick and return the new tick count.
    ///
    /// While paused this is a no-op and the unchanged count is returned.
    pub fn tick(&mut self) -> u64 {
        if self.running {
            self.tick += 1;
            self.elapsed += self.step_secs();
        }
        self.tick
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Zero the counter and elapsed time. Speed and the running flag survive.
    pub fn reset(&mut self) {
        self.tick = 0;
        self.elapsed = 0.0;
    }

    /// Set the speed multiplier, clamped to `[MIN_SPEED, MAX_SPEED]`.
    /// Returns the multiplier actually applied.
    pub fn set_speed(&mut self, multiplier: f32) -> f32 {
        self.speed = if multiplier.is_nan() {
            1.0
        } else {
            multiplier.clamp(MIN_SPEED, MAX_SPEED)
        };
        self.speed
    }

    /// Simulated seconds covered by one tick at the current speed
    pub fn step_secs(&self) -> f32 {
        self.tick_duration * self.speed
    }

    pub fn now(&self) -> u64 {
        self.tick
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
