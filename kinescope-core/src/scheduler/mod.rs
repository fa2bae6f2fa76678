//! Pipeline scheduling
//!
//! One cycle of each control loop. The firmware runs every cycle in its
//! own task and sleeps between cycles; the cycles themselves take the
//! time as a parameter so they can be driven directly from tests.
//!
//! The reassembler lives behind the frame lock and the render pipeline
//! behind the render lock. Every acquisition is bounded: a cycle that
//! cannot get a lock in time skips that step and tries again next cycle.

pub mod ingest;
pub mod lock;
pub mod render;

use embassy_time::Duration;

pub use ingest::{IngestCycle, IngestReport};
pub use lock::{lock_within, LockTimeout};
pub use render::{RenderCycle, RenderOutcome, RenderReport};

/// Longest wait for the frame lock when processing a packet or releasing a frame
pub const FRAME_LOCK_TIMEOUT: Duration = Duration::from_millis(5);

/// Longest wait for the render lock
pub const RENDER_LOCK_TIMEOUT: Duration = Duration::from_millis(15);

/// Longest wait for the frame lock when checking for a stale frame
pub const TIMEOUT_CHECK_LOCK_TIMEOUT: Duration = Duration::from_millis(2);

/// Datagrams drained per ingest cycle
pub const INGEST_BURST: usize = 3;

/// Sleep between ingest cycles
pub const INGEST_PERIOD: Duration = Duration::from_millis(1);

/// Sleep between render cycles
pub const RENDER_PERIOD: Duration = Duration::from_millis(8);

/// Interval between telemetry reports
pub const MONITOR_PERIOD: Duration = Duration::from_secs(3);

/// Lock wait bounds used by the cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockBounds {
    /// Frame lock, packet processing and release
    pub frame: Duration,
    /// Render lock
    pub render: Duration,
    /// Frame lock, stale-frame check
    pub timeout_check: Duration,
}

impl LockBounds {
    pub const DEFAULT: Self = Self {
        frame: FRAME_LOCK_TIMEOUT,
        render: RENDER_LOCK_TIMEOUT,
        timeout_check: TIMEOUT_CHECK_LOCK_TIMEOUT,
    };

    /// Never wait; contended locks are skipped immediately
    pub const IMMEDIATE: Self = Self {
        frame: Duration::from_ticks(0),
        render: Duration::from_ticks(0),
        timeout_check: Duration::from_ticks(0),
    };
}

impl Default for LockBounds {
    fn default() -> Self {
        Self::DEFAULT
    }
}
