//! Frame reassembly
//!
//! Collects datagram fragments into complete JPEG frames and hands
//! validated frames to the renderer.

pub mod descriptor;
pub mod reassembler;

pub use descriptor::{FrameDescriptor, PacketTracker};
pub use reassembler::{
    validate_complete_jpeg, AssembledFrame, FrameReassembler, PacketError, PacketStatus,
    ReassemblyError,
};
