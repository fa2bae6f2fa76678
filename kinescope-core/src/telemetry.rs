//! Pipeline telemetry
//!
//! Monotonic counters bumped by the reassembler and the render task, and
//! gauges mirroring the in-flight frame. Everything is a relaxed atomic:
//! readers get a snapshot that may mix values from neighbouring instants,
//! which is fine for periodic reporting and never blocks a writer.

use embassy_time::Duration;
use portable_atomic::{AtomicU32, Ordering};

/// Counters and gauges shared by the pipeline tasks
#[derive(Debug)]
pub struct Telemetry {
    frames_started: AtomicU32,
    frames_completed: AtomicU32,
    frames_rendered: AtomicU32,
    frames_incomplete: AtomicU32,
    frames_corrupt: AtomicU32,
    memory_errors: AtomicU32,
    current_frame_id: AtomicU32,
    current_received: AtomicU32,
    current_total: AtomicU32,
    current_size: AtomicU32,
    clients: AtomicU32,
    last_render_us: AtomicU32,
}

/// Copy of the in-flight frame gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameGauge {
    /// Identifier of the frame being assembled
    pub frame_id: u32,
    /// Fragments received so far
    pub received_packets: u16,
    /// Fragments expected
    pub total_packets: u16,
    /// Payload bytes received so far
    pub total_size: u32,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryReport {
    /// Frames whose first fragment was accepted
    pub frames_started: u32,
    /// Frames that passed validation
    pub frames_completed: u32,
    /// Frames drawn to the panel
    pub frames_rendered: u32,
    /// Frames abandoned after the timeout
    pub frames_incomplete: u32,
    /// Frames rejected by validation
    pub frames_corrupt: u32,
    /// Memory pressure events
    pub memory_errors: u32,
    /// In-flight frame
    pub current: FrameGauge,
    /// Clients currently streaming
    pub clients: u32,
    /// Decode and flush time of the latest rendered frame, microseconds
    pub last_render_us: u32,
}

impl TelemetryReport {
    /// Completed frames as a share of started frames, in tenths of a percent
    pub fn completion_rate_x10(&self) -> u32 {
        ratio_x10(self.frames_completed, self.frames_started)
    }

    /// Rendered frames as a share of completed frames, in tenths of a percent
    pub fn render_rate_x10(&self) -> u32 {
        ratio_x10(self.frames_rendered, self.frames_completed)
    }
}

fn ratio_x10(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as u64 * 1000 / whole as u64) as u32
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    /// Create a telemetry block with all counters at zero
    pub const fn new() -> Self {
        Self {
            frames_started: AtomicU32::new(0),
            frames_completed: AtomicU32::new(0),
            frames_rendered: AtomicU32::new(0),
            frames_incomplete: AtomicU32::new(0),
            frames_corrupt: AtomicU32::new(0),
            memory_errors: AtomicU32::new(0),
            current_frame_id: AtomicU32::new(0),
            current_received: AtomicU32::new(0),
            current_total: AtomicU32::new(0),
            current_size: AtomicU32::new(0),
            clients: AtomicU32::new(0),
            last_render_us: AtomicU32::new(0),
        }
    }

    /// A frame's first fragment was accepted
    pub fn frame_started(&self) {
        self.frames_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame passed validation
    pub fn frame_completed(&self) {
        self.frames_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame reached the panel
    pub fn frame_rendered(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame timed out before all fragments arrived
    pub fn frame_incomplete(&self) {
        self.frames_incomplete.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame failed validation
    pub fn frame_corrupt(&self) {
        self.frames_corrupt.fetch_add(1, Ordering::Relaxed);
    }

    /// Free heap dropped below the configured floor
    pub fn memory_error(&self) {
        self.memory_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Mirror the in-flight frame
    pub fn set_current(&self, gauge: FrameGauge) {
        self.current_frame_id.store(gauge.frame_id, Ordering::Relaxed);
        self.current_received
            .store(gauge.received_packets as u32, Ordering::Relaxed);
        self.current_total
            .store(gauge.total_packets as u32, Ordering::Relaxed);
        self.current_size.store(gauge.total_size, Ordering::Relaxed);
    }

    /// Number of clients currently streaming
    pub fn set_clients(&self, count: u32) {
        self.clients.store(count, Ordering::Relaxed);
    }

    /// How long the latest frame took to decode and flush
    pub fn set_render_time(&self, elapsed: Duration) {
        let us = u32::try_from(elapsed.as_micros()).unwrap_or(u32::MAX);
        self.last_render_us.store(us, Ordering::Relaxed);
    }

    pub fn clients(&self) -> u32 {
        self.clients.load(Ordering::Relaxed)
    }

    pub fn last_render_us(&self) -> u32 {
        self.last_render_us.load(Ordering::Relaxed)
    }

    pub fn frames_started(&self) -> u32 {
        self.frames_started.load(Ordering::Relaxed)
    }

    pub fn frames_completed(&self) -> u32 {
        self.frames_completed.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u32 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn frames_incomplete(&self) -> u32 {
        self.frames_incomplete.load(Ordering::Relaxed)
    }

    pub fn frames_corrupt(&self) -> u32 {
        self.frames_corrupt.load(Ordering::Relaxed)
    }

    pub fn memory_errors(&self) -> u32 {
        self.memory_errors.load(Ordering::Relaxed)
    }

    /// Current in-flight frame gauges
    pub fn current(&self) -> FrameGauge {
        FrameGauge {
            frame_id: self.current_frame_id.load(Ordering::Relaxed),
            received_packets: self.current_received.load(Ordering::Relaxed) as u16,
            total_packets: self.current_total.load(Ordering::Relaxed) as u16,
            total_size: self.current_size.load(Ordering::Relaxed),
        }
    }

    /// Read every counter without taking any lock
    pub fn report(&self) -> TelemetryReport {
        TelemetryReport {
            frames_started: self.frames_started(),
            frames_completed: self.frames_completed(),
            frames_rendered: self.frames_rendered(),
            frames_incomplete: self.frames_incomplete(),
            frames_corrupt: self.frames_corrupt(),
            memory_errors: self.memory_errors(),
            current: self.current(),
            clients: self.clients(),
            last_render_us: self.last_render_us(),
        }
    }

    /// Count a memory error if `probe` reports less than `floor` bytes free
    ///
    /// Returns true when the floor was breached.
    pub fn check_memory<P: crate::traits::MemoryProbe>(&self, probe: &P, floor: usize) -> bool {
        let low = probe.free_bytes() < floor;
        if low {
            self.memory_error();
        }
        low
    }
}
