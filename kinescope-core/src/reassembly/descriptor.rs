//! In-flight frame bookkeeping

use alloc::boxed::Box;

use embassy_time::Instant;

use crate::buffer::{alloc_slice, InitError};
use crate::telemetry::FrameGauge;

/// State of the single frame currently being assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameDescriptor {
    /// Sender-assigned identifier
    pub frame_id: u32,
    /// Fragments the frame was split into
    pub total_packets: u16,
    /// Fragments accepted so far
    pub received_packets: u16,
    /// Payload bytes accepted so far
    pub total_size: u32,
    /// Payload length of fragment 0, the slot size for fragments that
    /// arrive ahead of sequence
    pub stride: u32,
    /// Fragments received without a gap from fragment 0
    pub contiguous_packets: u16,
    /// Bytes covered by the gap-free prefix
    pub contiguous_size: u32,
    /// Length of the final fragment if it arrived ahead of sequence
    pub tail_size: u32,
    /// When fragment 0 was accepted
    pub started_at: Instant,
    /// All fragments received
    pub is_complete: bool,
    /// Passed structural validation
    pub is_valid: bool,
    /// Handed to the renderer
    pub is_rendering: bool,
}

impl FrameDescriptor {
    /// A descriptor with no frame in flight
    pub const fn empty() -> Self {
        Self {
            frame_id: 0,
            total_packets: 0,
            received_packets: 0,
            total_size: 0,
            stride: 0,
            contiguous_packets: 0,
            contiguous_size: 0,
            tail_size: 0,
            started_at: Instant::from_ticks(0),
            is_complete: false,
            is_valid: false,
            is_rendering: false,
        }
    }

    /// Whether fragments are still being collected for this frame
    pub fn in_flight(&self) -> bool {
        self.received_packets > 0
    }

    /// Fragments held past a gap in the sequence
    pub fn ahead_packets(&self) -> u16 {
        self.received_packets.saturating_sub(self.contiguous_packets)
    }

    /// Whether the gap-free prefix is made of whole stride-sized slots
    pub fn prefix_on_stride(&self) -> bool {
        self.contiguous_size == self.contiguous_packets as u32 * self.stride
    }

    /// Gauge view for telemetry
    pub fn gauge(&self) -> FrameGauge {
        FrameGauge {
            frame_id: self.frame_id,
            received_packets: self.received_packets,
            total_packets: self.total_packets,
            total_size: self.total_size,
        }
    }
}

impl Default for FrameDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

/// Received-fragment flags indexed by fragment index
#[derive(Debug)]
pub struct PacketTracker {
    received: Box<[bool]>,
}

impl PacketTracker {
    /// Allocate a tracker for up to `capacity` fragments
    pub fn new(capacity: u16) -> Result<Self, InitError> {
        Ok(Self {
            received: alloc_slice(capacity as usize, false)?,
        })
    }

    /// Forget every fragment
    pub fn clear(&mut self) {
        self.received.fill(false);
    }

    /// Record fragment `index` as received
    ///
    /// Returns false if it was already recorded.
    pub fn mark(&mut self, index: u16) -> bool {
        match self.received.get_mut(index as usize) {
            Some(flag) if !*flag => {
                *flag = true;
                true
            }
            _ => false,
        }
    }

    /// Forget fragments in `start..end`
    pub fn forget(&mut self, start: u16, end: u16) {
        let end = (end as usize).min(self.received.len());
        if let Some(flags) = self.received.get_mut(start as usize..end) {
            flags.fill(false);
        }
    }

    /// Whether fragment `index` has been received
    pub fn contains(&self, index: u16) -> bool {
        self.received.get(index as usize).copied().unwrap_or(false)
    }

    /// First fragment below `total` that has not arrived
    pub fn first_missing(&self, total: u16) -> Option<u16> {
        (0..total).find(|&i| !self.contains(i))
    }

    /// Tracker capacity
    pub fn capacity(&self) -> u16 {
        self.received.len() as u16
    }
}
