//! Board-agnostic core logic for the Kinescope stream display
//!
//! This crate contains everything between the network socket and the
//! panel that does not depend on a specific board:
//!
//! - Collaborator traits (datagram source, panel, tile decoder, heap probe)
//! - Frame reassembly and structural validation
//! - Render pipeline with strip flushing
//! - Adaptive render pacing
//! - Ingest and render cycles with bounded locking
//! - Telemetry counters and streaming client tracking
//! - Build-time tunables

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod buffer;
pub mod clients;
pub mod config;
pub mod pacing;
pub mod reassembly;
pub mod render;
pub mod scheduler;
pub mod telemetry;
pub mod traits;

#[cfg(test)]
mod testing;
