use std::time::{Duration, Instant};

/// Elapsed animation time. Only moves forward, and only through `advance`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct AnimationClock {
    elapsed: Duration,
}

impl AnimationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, delta: Duration) {
        self.elapsed += delta;
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}

/// Wall-clock deltas between display ticks, for driving `AnimationClock`.
#[derive(Debug, Copy, Clone)]
pub struct FrameTimer {
    last_tick: Instant,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last_tick: Instant::now(),
        }
    }

    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        delta
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let mut clock = AnimationClock::new();
        let mut last = clock.elapsed();
        for ms in [16, 0, 17, 33] {
            clock.advance(Duration::from_millis(ms));
            assert!(clock.elapsed() >= last);
            last = clock.elapsed();
        }
        assert_eq!(clock.elapsed(), Duration::from_millis(66));
        assert!((clock.elapsed_secs() - 0.066).abs() < 1e-6);
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut clock = AnimationClock::new();
        clock.advance(Duration::from_secs(3));
        clock.reset();
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn frame_timer_deltas_are_non_negative() {
        let mut timer = FrameTimer::new();
        let first = timer.tick();
        let second = timer.tick();
        assert!(first >= Duration::ZERO);
        assert!(second >= Duration::ZERO);
    }
}
