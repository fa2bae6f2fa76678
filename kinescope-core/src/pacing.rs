//! Adaptive render pacing
//!
//! The pacer enforces a minimum interval between renders and nudges that
//! interval once per sampling window. Throughput is measured in tenths of
//! a frame per second so all arithmetic stays in integers.
//!
//! A window whose throughput overshoots the target by more than the margin
//! lengthens the interval by one step; one that undershoots shortens it.
//! The interval never leaves `[fast_interval, slow_interval]`.

use embassy_time::{Duration, Instant};

use crate::config::StreamConfig;

/// Result of closing a sampling window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacingSample {
    /// Throughput over the window, frames per second x10
    pub measured_fps_x10: u32,
    /// Interval before the window closed
    pub previous: Duration,
    /// Interval from now on
    pub interval: Duration,
}

impl PacingSample {
    /// Whether the window moved the interval
    pub fn changed(&self) -> bool {
        self.previous != self.interval
    }
}

/// Step the pacing interval given one window's measured throughput
pub fn next_interval(current: Duration, measured_fps_x10: u32, config: &StreamConfig) -> Duration {
    let target_x10 = config.target_fps as u64 * 10;
    let margin = config.pacing_margin_percent as u64;
    let measured = measured_fps_x10 as u64;

    let upper = target_x10 * (100 + margin) / 100;
    let lower = target_x10 * 100u64.saturating_sub(margin) / 100;

    if measured > upper {
        (current + config.pacing_step).min(config.slow_interval)
    } else if measured < lower {
        let faster = current
            .checked_sub(config.pacing_step)
            .unwrap_or(config.fast_interval);
        faster.max(config.fast_interval)
    } else {
        current
    }
}

/// Frames per second x10 for `frames` renders over `elapsed`
fn throughput_x10(frames: u32, elapsed: Duration) -> u32 {
    let micros = elapsed.as_micros();
    if micros == 0 {
        return u32::MAX;
    }
    let fps_x10 = frames as u64 * 10_000_000 / micros;
    u32::try_from(fps_x10).unwrap_or(u32::MAX)
}

/// Render pacer
#[derive(Debug, Clone)]
pub struct AdaptivePacer {
    config: StreamConfig,
    interval: Duration,
    last_render: Option<Instant>,
    window_start: Option<Instant>,
    window_frames: u32,
}

impl AdaptivePacer {
    /// Create a pacer starting at the slow bound
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            config: *config,
            interval: config.slow_interval,
            last_render: None,
            window_start: None,
            window_frames: 0,
        }
    }

    /// Current minimum interval between renders
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether enough time has passed since the last render
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_render {
            None => true,
            Some(last) => now.checked_duration_since(last).is_some_and(|d| d >= self.interval),
        }
    }

    /// Record a successful render
    ///
    /// Returns a sample when this render closes a sampling window.
    pub fn record_render(&mut self, now: Instant) -> Option<PacingSample> {
        self.last_render = Some(now);

        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return None;
        };

        self.window_frames += 1;
        if self.window_frames < self.config.pacing_window {
            return None;
        }

        let elapsed = now.checked_duration_since(start).unwrap_or(Duration::from_ticks(0));
        let measured_fps_x10 = throughput_x10(self.window_frames, elapsed);
        let previous = self.interval;
        self.interval = next_interval(previous, measured_fps_x10, &self.config);

        self.window_start = Some(now);
        self.window_frames = 0;

        Some(PacingSample {
            measured_fps_x10,
            previous,
            interval: self.interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_starts_slow_and_due() {
        let pacer = AdaptivePacer::new(&StreamConfig::DEFAULT);
        assert_eq!(pacer.interval(), ms(16));
        assert!(pacer.is_due(Instant::from_millis(0)));
    }

    #[test]
    fn test_due_after_interval() {
        let mut pacer = AdaptivePacer::new(&StreamConfig::DEFAULT);
        pacer.record_render(Instant::from_millis(100));
        assert!(!pacer.is_due(Instant::from_millis(115)));
        assert!(pacer.is_due(Instant::from_millis(116)));
    }

    #[test]
    fn test_overshoot_steps_slower() {
        // 72 FPS against a 60 FPS target
        let config = StreamConfig::DEFAULT;
        assert_eq!(next_interval(ms(12), 720, &config), ms(13));
    }

    #[test]
    fn test_overshoot_clamped_at_slow_bound() {
        let config = StreamConfig::DEFAULT;
        assert_eq!(next_interval(ms(16), 720, &config), ms(16));
    }

    #[test]
    fn test_undershoot_steps_faster() {
        let config = StreamConfig::DEFAULT;
        assert_eq!(next_interval(ms(16), 400, &config), ms(15));
        assert_eq!(next_interval(ms(8), 400, &config), ms(8));
    }

    #[test]
    fn test_within_margin_unchanged() {
        let config = StreamConfig::DEFAULT;
        // 54.0 and 66.0 FPS are exactly on the margins
        assert_eq!(next_interval(ms(12), 540, &config), ms(12));
        assert_eq!(next_interval(ms(12), 660, &config), ms(12));
        assert_eq!(next_interval(ms(12), 600, &config), ms(12));
    }

    #[test]
    fn test_fast_window_held_at_slow_bound() {
        let config = StreamConfig {
            slow_interval: ms(20),
            ..StreamConfig::DEFAULT
        };
        let mut pacer = AdaptivePacer::new(&config);
        assert_eq!(pacer.interval(), ms(20));

        // Opening render, then 30 renders 10 ms apart: 100 FPS
        let mut now = 0;
        assert_eq!(pacer.record_render(Instant::from_millis(now)), None);
        for _ in 0..29 {
            now += 10;
            assert_eq!(pacer.record_render(Instant::from_millis(now)), None);
        }
        now += 10;
        let sample = pacer.record_render(Instant::from_millis(now)).unwrap();
        assert_eq!(sample.measured_fps_x10, 1000);
        assert!(!sample.changed());
        assert_eq!(pacer.interval(), ms(20));
    }

    #[test]
    fn test_window_of_slow_renders_speeds_up() {
        let mut pacer = AdaptivePacer::new(&StreamConfig::DEFAULT);

        // 25 ms per frame: 40 FPS
        let mut now = 0;
        pacer.record_render(Instant::from_millis(now));
        let mut sample = None;
        for _ in 0..30 {
            now += 25;
            sample = pacer.record_render(Instant::from_millis(now));
        }

        let sample = sample.unwrap();
        assert_eq!(sample.measured_fps_x10, 400);
        assert_eq!(sample.previous, ms(16));
        assert_eq!(pacer.interval(), ms(15));
    }

    #[test]
    fn test_one_adjustment_per_window() {
        let mut pacer = AdaptivePacer::new(&StreamConfig::DEFAULT);
        let mut now = 0;
        pacer.record_render(Instant::from_millis(now));

        let mut adjustments = 0;
        for _ in 0..90 {
            now += 25;
            if pacer.record_render(Instant::from_millis(now)).is_some_and(|s| s.changed()) {
                adjustments += 1;
            }
        }
        assert_eq!(adjustments, 3);
        assert_eq!(pacer.interval(), ms(13));
    }

    #[test]
    fn test_throughput_of_empty_window() {
        assert_eq!(throughput_x10(30, Duration::from_ticks(0)), u32::MAX);
    }
}
