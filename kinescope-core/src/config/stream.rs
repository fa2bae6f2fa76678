//! Stream and pipeline tunables
//!
//! Every limit is fixed at build time. The named constants are the
//! defaults the firmware runs with; [`StreamConfig`] gathers them so tests
//! can run the same code with small frames and tiny displays.

use embassy_time::Duration;

/// Panel width in pixels (landscape)
pub const DISPLAY_WIDTH: u16 = 480;

/// Panel height in pixels (landscape)
pub const DISPLAY_HEIGHT: u16 = 320;

/// Largest reassembled frame in bytes
pub const MAX_FRAME_SIZE: usize = 35_000;

/// Largest number of fragments a frame may declare
pub const MAX_PACKETS: u16 = 500;

/// An unfinished frame older than this is abandoned
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(150);

/// Free heap below this counts as a memory error
pub const MIN_FREE_HEAP: usize = 15_000;

/// Frame rate the pacer steers towards
pub const TARGET_FPS: u32 = 60;

/// Slowest pacing interval (16 ms = 60 FPS)
pub const SLOW_RENDER_INTERVAL: Duration = Duration::from_millis(16);

/// Fastest pacing interval (8 ms = 125 FPS)
pub const FAST_RENDER_INTERVAL: Duration = Duration::from_millis(8);

/// Amount the pacing interval moves per adjustment
pub const PACING_STEP: Duration = Duration::from_millis(1);

/// Rendered frames per throughput sample
pub const PACING_WINDOW_FRAMES: u32 = 30;

/// Tolerance around the target rate before the interval moves, in percent
pub const PACING_MARGIN_PERCENT: u32 = 10;

/// Rows per strip when flushing at normal rates
pub const STRIP_HEIGHT: u16 = 20;

/// Rows per strip when flushing at high rates
pub const FAST_STRIP_HEIGHT: u16 = 10;

/// Target rates above this use [`FAST_STRIP_HEIGHT`]
pub const FAST_STRIP_MIN_FPS: u32 = 45;

/// Yield after this many flushed strips
pub const STRIPS_PER_YIELD: u16 = 4;

/// Yield after this many decoded tiles
pub const TILES_PER_YIELD: u32 = 32;

/// Heap that must stay free after allocating the pixel buffer
pub const PIXEL_BUFFER_HEADROOM: usize = 60_000;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Display has a zero dimension
    EmptyDisplay,
    /// Frame size cannot hold even a minimal JPEG
    FrameTooSmall,
    /// Fragment limit is zero
    NoPackets,
    /// Fast interval is slower than the slow interval, or zero
    InvalidPacing,
    /// Strip height is zero
    InvalidStrip,
}

/// Runtime copy of the build-time tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    /// Panel width in pixels
    pub display_width: u16,
    /// Panel height in pixels
    pub display_height: u16,
    /// Assembly and render buffer capacity in bytes
    pub max_frame_size: usize,
    /// Fragment tracking capacity
    pub max_packets: u16,
    /// Age after which an unfinished frame is abandoned
    pub frame_timeout: Duration,
    /// Minimum free heap before a memory error is counted
    pub min_free_heap: usize,
    /// Target frames per second
    pub target_fps: u32,
    /// Slowest pacing interval
    pub slow_interval: Duration,
    /// Fastest pacing interval
    pub fast_interval: Duration,
    /// Pacing adjustment step
    pub pacing_step: Duration,
    /// Rendered frames per throughput sample
    pub pacing_window: u32,
    /// Pacing tolerance in percent
    pub pacing_margin_percent: u32,
    /// Strip height at normal rates
    pub strip_height: u16,
    /// Strip height at high rates
    pub fast_strip_height: u16,
    /// Headroom required to enable the pixel buffer
    pub pixel_buffer_headroom: usize,
}

impl StreamConfig {
    /// The configuration the firmware is built with
    pub const DEFAULT: Self = Self {
        display_width: DISPLAY_WIDTH,
        display_height: DISPLAY_HEIGHT,
        max_frame_size: MAX_FRAME_SIZE,
        max_packets: MAX_PACKETS,
        frame_timeout: FRAME_TIMEOUT,
        min_free_heap: MIN_FREE_HEAP,
        target_fps: TARGET_FPS,
        slow_interval: SLOW_RENDER_INTERVAL,
        fast_interval: FAST_RENDER_INTERVAL,
        pacing_step: PACING_STEP,
        pacing_window: PACING_WINDOW_FRAMES,
        pacing_margin_percent: PACING_MARGIN_PERCENT,
        strip_height: STRIP_HEIGHT,
        fast_strip_height: FAST_STRIP_HEIGHT,
        pixel_buffer_headroom: PIXEL_BUFFER_HEADROOM,
    };

    /// Check that the tunables are mutually consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display_width == 0 || self.display_height == 0 {
            return Err(ConfigError::EmptyDisplay);
        }
        if self.max_frame_size < kinescope_protocol::MIN_JPEG_LEN {
            return Err(ConfigError::FrameTooSmall);
        }
        if self.max_packets == 0 {
            return Err(ConfigError::NoPackets);
        }
        if self.fast_interval.as_ticks() == 0
            || self.fast_interval > self.slow_interval
            || self.pacing_window == 0
        {
            return Err(ConfigError::InvalidPacing);
        }
        if self.strip_height == 0 || self.fast_strip_height == 0 {
            return Err(ConfigError::InvalidStrip);
        }
        Ok(())
    }

    /// Strip height for the configured target rate
    ///
    /// High target rates flush in thinner strips so the render task yields
    /// more often; lower rates favour fewer, larger transfers.
    pub fn flush_strip_height(&self) -> u16 {
        if self.target_fps > FAST_STRIP_MIN_FPS {
            self.fast_strip_height
        } else {
            self.strip_height
        }
    }

    /// Number of pixels on the panel
    pub fn pixel_count(&self) -> usize {
        self.display_width as usize * self.display_height as usize
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
