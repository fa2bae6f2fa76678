//! Hardware and codec implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in kinescope-core:
//!
//! - ST7796 SPI panel ([`PixelDisplay`](kinescope_core::traits::PixelDisplay))
//! - zune-jpeg tile decoder ([`TileDecoder`](kinescope_core::traits::TileDecoder)),
//!   behind the `zune` feature

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod st7796;
#[cfg(feature = "zune")]
pub mod zune;

pub use st7796::St7796;
#[cfg(feature = "zune")]
pub use zune::ZuneTileDecoder;
