//! Frame reassembler
//!
//! Rebuilds one JPEG at a time from its datagram fragments. There is a
//! single in-flight frame: the first fragment of a new frame replaces
//! whatever was being assembled before, and so does a fragment 0 that
//! reuses the in-flight id with different content.
//!
//! The next fragment in sequence is appended to the gap-free prefix
//! whatever its size. A fragment that arrives ahead of a gap is parked at
//! `index * stride`, where the stride is the payload length of fragment 0;
//! this only works while fragments carry exactly `stride` bytes, so a
//! parked fragment must do so (the final one at most that), and an
//! in-sequence fragment that breaks the stride drops the parked ones.

use alloc::boxed::Box;

use embassy_time::{Duration, Instant};
use kinescope_protocol::{starts_with_soi, validate_structure, FragmentHeader, HeaderError};

use super::descriptor::{FrameDescriptor, PacketTracker};
use crate::buffer::{alloc_slice, InitError};
use crate::config::StreamConfig;
use crate::telemetry::Telemetry;

/// Outcome of an accepted fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketStatus {
    /// Fragment 0 opened a new frame
    Started,
    /// Continuation fragment stored
    Accepted,
    /// Frame now has every fragment
    Completed,
}

/// Reasons a fragment is dropped
///
/// A rejected fragment never changes the reassembler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Malformed header
    Header(HeaderError),
    /// Frame declares more fragments than can be tracked
    TooManyPackets,
    /// Fragment 0 does not begin with the JPEG SOI marker
    MissingStartMarker,
    /// Fragment would not fit in the assembly buffer
    FrameTooLarge,
    /// Continuation for a frame that is not in flight
    UnknownFrame,
    /// Fragment count differs from the one fragment 0 declared
    CountMismatch,
    /// Fragment already received
    Duplicate,
    /// Out-of-sequence fragment that cannot be parked on the stride
    UnevenFragment,
}

impl From<HeaderError> for PacketError {
    fn from(err: HeaderError) -> Self {
        PacketError::Header(err)
    }
}

/// Reasons a complete frame cannot be handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReassemblyError {
    /// Not every fragment has arrived
    NotComplete,
    /// Frame was already handed out
    AlreadyTaken,
    /// Tracking shows a gap despite the completion count
    MissingFragment(u16),
    /// SOI/EOI structure check failed
    InvalidJpeg,
    /// Destination cannot hold the frame
    BufferTooSmall,
}

/// A validated frame copied out of the assembly buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AssembledFrame {
    /// Sender-assigned identifier
    pub frame_id: u32,
    /// Encoded image length in bytes
    pub len: usize,
    /// Fragments the image arrived in
    pub total_packets: u16,
}

/// Structural check of a reassembled image
///
/// At least 20 bytes, SOI first, EOI within the last 20 bytes.
pub fn validate_complete_jpeg(buffer: &[u8]) -> bool {
    validate_structure(buffer)
}

/// Single-frame reassembler
pub struct FrameReassembler<'a> {
    config: StreamConfig,
    telemetry: &'a Telemetry,
    descriptor: FrameDescriptor,
    tracker: PacketTracker,
    assembly: Box<[u8]>,
}

impl<'a> FrameReassembler<'a> {
    /// Allocate the assembly buffer and fragment tracker
    pub fn new(config: &StreamConfig, telemetry: &'a Telemetry) -> Result<Self, InitError> {
        config.validate()?;

        Ok(Self {
            config: *config,
            telemetry,
            descriptor: FrameDescriptor::empty(),
            tracker: PacketTracker::new(config.max_packets)?,
            assembly: alloc_slice(config.max_frame_size, 0u8)?,
        })
    }

    /// Feed one received datagram
    pub fn process_packet(
        &mut self,
        datagram: &[u8],
        now: Instant,
    ) -> Result<PacketStatus, PacketError> {
        let (header, payload) = FragmentHeader::parse(datagram)?;

        if header.total_packets > self.config.max_packets {
            return Err(PacketError::TooManyPackets);
        }

        let status = if !header.is_first() {
            self.continue_frame(&header, payload)?
        } else if self.is_redelivery(&header, payload) {
            return Err(PacketError::Duplicate);
        } else {
            self.start_frame(&header, payload, now)?
        };

        self.telemetry.set_current(self.descriptor.gauge());
        Ok(status)
    }

    /// Fragment 0 of the frame already in flight, byte for byte
    fn is_redelivery(&self, header: &FragmentHeader, payload: &[u8]) -> bool {
        let descriptor = &self.descriptor;
        descriptor.in_flight()
            && descriptor.frame_id == header.frame_id
            && descriptor.total_packets == header.total_packets
            && descriptor.stride as usize == payload.len()
            && self.assembly.get(..payload.len()) == Some(payload)
    }

    fn start_frame(
        &mut self,
        header: &FragmentHeader,
        payload: &[u8],
        now: Instant,
    ) -> Result<PacketStatus, PacketError> {
        if !starts_with_soi(payload) {
            return Err(PacketError::MissingStartMarker);
        }
        if payload.len() > self.assembly.len() {
            return Err(PacketError::FrameTooLarge);
        }

        let complete = header.total_packets == 1;
        self.descriptor = FrameDescriptor {
            frame_id: header.frame_id,
            total_packets: header.total_packets,
            received_packets: 1,
            total_size: payload.len() as u32,
            stride: payload.len() as u32,
            contiguous_packets: 1,
            contiguous_size: payload.len() as u32,
            tail_size: 0,
            started_at: now,
            is_complete: complete,
            is_valid: false,
            is_rendering: false,
        };

        self.tracker.clear();
        self.tracker.mark(0);
        self.assembly[..payload.len()].copy_from_slice(payload);
        self.telemetry.frame_started();

        Ok(if complete {
            PacketStatus::Completed
        } else {
            PacketStatus::Started
        })
    }

    fn continue_frame(
        &mut self,
        header: &FragmentHeader,
        payload: &[u8],
    ) -> Result<PacketStatus, PacketError> {
        let descriptor = &self.descriptor;

        if header.frame_id != descriptor.frame_id || !descriptor.in_flight() {
            return Err(PacketError::UnknownFrame);
        }
        if header.total_packets != descriptor.total_packets {
            return Err(PacketError::CountMismatch);
        }
        if self.tracker.contains(header.fragment_index) {
            return Err(PacketError::Duplicate);
        }

        if header.fragment_index == descriptor.contiguous_packets {
            self.append(header, payload)?;
        } else {
            self.park(header, payload)?;
        }

        let descriptor = &mut self.descriptor;
        if descriptor.received_packets == descriptor.total_packets {
            descriptor.is_complete = true;
            return Ok(PacketStatus::Completed);
        }
        Ok(PacketStatus::Accepted)
    }

    /// Append the next fragment in sequence to the gap-free prefix
    fn append(&mut self, header: &FragmentHeader, payload: &[u8]) -> Result<(), PacketError> {
        let len = payload.len();
        let offset = self.descriptor.contiguous_size as usize;
        let end = offset + len;
        if end > self.assembly.len() {
            return Err(PacketError::FrameTooLarge);
        }

        // Parked fragments stay valid only if this one fills its stride slot
        let descriptor = self.descriptor;
        let on_stride = descriptor.prefix_on_stride() && len == descriptor.stride as usize;
        if descriptor.ahead_packets() > 0 && !on_stride {
            self.drop_parked();
        }

        self.assembly[offset..end].copy_from_slice(payload);
        self.tracker.mark(header.fragment_index);

        let descriptor = &mut self.descriptor;
        descriptor.received_packets += 1;
        descriptor.total_size += len as u32;
        descriptor.contiguous_packets += 1;
        descriptor.contiguous_size += len as u32;

        // Absorb parked fragments now joined to the prefix
        let last = descriptor.total_packets - 1;
        while descriptor.contiguous_packets <= last
            && self.tracker.contains(descriptor.contiguous_packets)
        {
            descriptor.contiguous_size += if descriptor.contiguous_packets == last {
                descriptor.tail_size
            } else {
                descriptor.stride
            };
            descriptor.contiguous_packets += 1;
        }
        Ok(())
    }

    /// Park a fragment that arrived ahead of a gap in its stride slot
    fn park(&mut self, header: &FragmentHeader, payload: &[u8]) -> Result<(), PacketError> {
        let descriptor = &self.descriptor;
        let stride = descriptor.stride as usize;
        let len = payload.len();

        let fits_slot = if header.is_last() { len <= stride } else { len == stride };
        if !fits_slot || !descriptor.prefix_on_stride() {
            return Err(PacketError::UnevenFragment);
        }

        let offset = header.fragment_index as usize * stride;
        let end = offset + len;
        if end > self.assembly.len() {
            return Err(PacketError::FrameTooLarge);
        }

        self.assembly[offset..end].copy_from_slice(payload);
        self.tracker.mark(header.fragment_index);

        let descriptor = &mut self.descriptor;
        descriptor.received_packets += 1;
        descriptor.total_size += len as u32;
        if header.is_last() {
            descriptor.tail_size = len as u32;
        }
        Ok(())
    }

    /// Forget every fragment past the gap-free prefix
    fn drop_parked(&mut self) {
        let descriptor = &mut self.descriptor;
        self.tracker
            .forget(descriptor.contiguous_packets, descriptor.total_packets);
        descriptor.received_packets = descriptor.contiguous_packets;
        descriptor.total_size = descriptor.contiguous_size;
        descriptor.tail_size = 0;
    }

    /// Validate the completed frame and copy it into `render_buffer`
    ///
    /// On success the frame is marked valid and handed to the renderer. A
    /// gap in the tracking set or a failed structure check counts the frame
    /// as corrupt and leaves `render_buffer` untouched.
    pub fn assemble_complete_frame(
        &mut self,
        render_buffer: &mut [u8],
    ) -> Result<AssembledFrame, ReassemblyError> {
        let descriptor = self.descriptor;

        if !descriptor.is_complete {
            return Err(ReassemblyError::NotComplete);
        }
        if descriptor.is_rendering {
            return Err(ReassemblyError::AlreadyTaken);
        }

        if let Some(missing) = self.tracker.first_missing(descriptor.total_packets) {
            self.telemetry.frame_corrupt();
            return Err(ReassemblyError::MissingFragment(missing));
        }

        let len = descriptor.total_size as usize;
        let image = &self.assembly[..len];
        if !validate_complete_jpeg(image) {
            self.telemetry.frame_corrupt();
            return Err(ReassemblyError::InvalidJpeg);
        }
        if render_buffer.len() < len {
            return Err(ReassemblyError::BufferTooSmall);
        }

        render_buffer[..len].copy_from_slice(image);
        self.descriptor.is_valid = true;
        self.descriptor.is_rendering = true;
        self.telemetry.frame_completed();

        Ok(AssembledFrame {
            frame_id: descriptor.frame_id,
            len,
            total_packets: descriptor.total_packets,
        })
    }

    /// Abandon the in-flight frame if it has been collecting for too long
    ///
    /// Frames already handed to the renderer are left alone. Returns true
    /// when a frame was abandoned.
    pub fn handle_frame_timeout(&mut self, now: Instant) -> bool {
        let descriptor = &mut self.descriptor;
        if !descriptor.in_flight() || descriptor.is_rendering {
            return false;
        }

        let age = now
            .checked_duration_since(descriptor.started_at)
            .unwrap_or(Duration::from_ticks(0));
        if age <= self.config.frame_timeout {
            return false;
        }

        descriptor.received_packets = 0;
        descriptor.is_complete = false;
        descriptor.is_valid = false;
        self.telemetry.frame_incomplete();
        self.telemetry.set_current(self.descriptor.gauge());
        true
    }

    /// Drop the in-flight frame's progress and flags
    pub fn reset_current_frame(&mut self) {
        let descriptor = &mut self.descriptor;
        descriptor.received_packets = 0;
        descriptor.is_complete = false;
        descriptor.is_valid = false;
        descriptor.is_rendering = false;
        self.telemetry.set_current(self.descriptor.gauge());
    }

    /// Release a frame the renderer has finished with
    ///
    /// Does nothing if a newer frame has replaced it in the meantime.
    /// Returns true when the frame was released.
    pub fn release_rendered(&mut self, frame_id: u32) -> bool {
        if self.descriptor.frame_id != frame_id || !self.descriptor.is_rendering {
            return false;
        }
        self.reset_current_frame();
        true
    }

    /// Completed frame waiting to be rendered
    pub fn ready_for_render(&self) -> bool {
        self.descriptor.is_complete && !self.descriptor.is_rendering
    }

    /// Current frame state
    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    /// Whether fragment `index` of the in-flight frame has arrived
    pub fn has_fragment(&self, index: u16) -> bool {
        self.descriptor.in_flight() && self.tracker.contains(index)
    }

    /// Assembled bytes of the in-flight frame
    pub fn assembled(&self) -> &[u8] {
        &self.assembly[..self.descriptor.total_size as usize]
    }

    /// Configuration this reassembler was built with
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}
