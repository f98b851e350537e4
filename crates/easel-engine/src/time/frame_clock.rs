use std::time::{Duration, Instant};

/// Timing of one tick.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped by the clock.
    pub dt: f32,

    pub now: Instant,

    /// Ticks taken before this one.
    pub frame_index: u64,
}

impl FrameTime {
    pub fn new(dt: f32, now: Instant, frame_index: u64) -> Self {
        Self { dt, now, frame_index }
    }

    /// Whole frames per second implied by `dt`, truncated.
    ///
    /// A non-positive or non-finite `dt` yields 0.
    pub fn frame_rate(&self) -> u32 {
        if self.dt > 0.0 && self.dt.is_finite() {
            (1.0 / self.dt) as u32
        } else {
            0
        }
    }
}

/// Produces [`FrameTime`] snapshots for one render loop.
///
/// Delta time is clamped so a stalled or minimized window does not report
/// a zero or enormous step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Restarts the delta baseline, e.g. after the loop was suspended.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max);

        self.last = now;
        let ft = FrameTime::new(dt.as_secs_f32(), now, self.frame_index);
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── frame_rate ────────────────────────────────────────────────────────

    #[test]
    fn rate_truncates_reciprocal() {
        let t = FrameTime::new(0.016, Instant::now(), 0);
        assert_eq!(t.frame_rate(), 62);
        let t = FrameTime::new(0.1, Instant::now(), 0);
        assert_eq!(t.frame_rate(), 10);
    }

    #[test]
    fn degenerate_dt_has_zero_rate() {
        assert_eq!(FrameTime::new(0.0, Instant::now(), 0).frame_rate(), 0);
        assert_eq!(FrameTime::new(f32::NAN, Instant::now(), 0).frame_rate(), 0);
    }

    // ── tick ──────────────────────────────────────────────────────────────

    #[test]
    fn tick_clamps_and_counts() {
        let min = Duration::from_millis(5);
        let mut clock = FrameClock::with_clamps(min, Duration::from_millis(10));
        let a = clock.tick();
        let b = clock.tick();
        assert_eq!((a.frame_index, b.frame_index), (0, 1));
        assert!(b.dt >= min.as_secs_f32());
        assert!(b.dt <= 0.010 + f32::EPSILON);
    }
}
