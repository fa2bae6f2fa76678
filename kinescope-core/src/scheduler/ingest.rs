//! Ingest cycle
//!
//! Drains a short burst of datagrams into the reassembler, then abandons
//! the in-flight frame if it has gone stale.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Instant;
use kinescope_protocol::MAX_DATAGRAM_SIZE;

use super::lock::lock_within;
use super::{LockBounds, INGEST_BURST};
use crate::reassembly::{FrameReassembler, PacketError, PacketStatus};
use crate::traits::DatagramSource;

/// What one ingest cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IngestReport {
    /// Datagrams read from the source
    pub received: u8,
    /// Datagrams the reassembler accepted
    pub accepted: u8,
    /// Frames completed during this cycle
    pub completed: u8,
    /// Datagrams the reassembler rejected
    pub rejected: u8,
    /// Datagrams dropped because the frame lock was busy
    pub dropped: u8,
    /// Most recent rejection
    pub last_error: Option<PacketError>,
    /// Stale frame abandoned
    pub timed_out: bool,
    /// Stale-frame check skipped on contention
    pub timeout_check_skipped: bool,
}

/// Ingest loop body
pub struct IngestCycle<S> {
    source: S,
    bounds: LockBounds,
    burst: usize,
    scratch: [u8; MAX_DATAGRAM_SIZE],
}

impl<S: DatagramSource> IngestCycle<S> {
    pub fn new(source: S) -> Self {
        Self::with_bounds(source, LockBounds::DEFAULT)
    }

    pub fn with_bounds(source: S, bounds: LockBounds) -> Self {
        Self {
            source,
            bounds,
            burst: INGEST_BURST,
            scratch: [0; MAX_DATAGRAM_SIZE],
        }
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Run one cycle at time `now`
    pub async fn run_once<M: RawMutex>(
        &mut self,
        frame: &Mutex<M, FrameReassembler<'_>>,
        now: Instant,
    ) -> IngestReport {
        let mut report = IngestReport::default();

        for _ in 0..self.burst {
            if !self.source.is_pending() {
                break;
            }
            let len = self.source.read_datagram(&mut self.scratch);
            if len == 0 {
                break;
            }
            report.received += 1;

            let Ok(mut reassembler) = lock_within(frame, self.bounds.frame).await else {
                report.dropped += 1;
                continue;
            };
            match reassembler.process_packet(&self.scratch[..len], now) {
                Ok(status) => {
                    report.accepted += 1;
                    if status == PacketStatus::Completed {
                        report.completed += 1;
                    }
                }
                Err(err) => {
                    report.rejected += 1;
                    report.last_error = Some(err);
                }
            }
        }

        match lock_within(frame, self.bounds.timeout_check).await {
            Ok(mut reassembler) => report.timed_out = reassembler.handle_frame_timeout(now),
            Err(_) => report.timeout_check_skipped = true,
        }

        report
    }
}
