//! Kinescope stream wire format
//!
//! This crate defines the UDP datagram format used to carry a JPEG stream
//! to the display. Every encoded image is split into fragments that each
//! fit in a single datagram:
//!
//! ```text
//! ┌──────────┬───────────────┬────────────────┬──────────────┬─────────────┐
//! │ FRAME ID │ TOTAL PACKETS │ FRAGMENT INDEX │ PAYLOAD SIZE │ PAYLOAD     │
//! │ u32 LE   │ u16 LE        │ u16 LE         │ u32 LE       │ 0–1488B     │
//! └──────────┴───────────────┴────────────────┴──────────────┴─────────────┘
//! ```
//!
//! The receiver needs no acknowledgements and sends nothing back: a frame
//! either arrives whole in time or it is dropped.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod fragmenter;
pub mod header;
pub mod jpeg;

pub use fragmenter::{FragmentError, Fragmenter};
pub use header::{FragmentHeader, HeaderError, HEADER_LEN, MAX_DATAGRAM_SIZE, MAX_PAYLOAD_SIZE};
pub use jpeg::{starts_with_soi, validate_structure, EOI, MIN_JPEG_LEN, SOI};
