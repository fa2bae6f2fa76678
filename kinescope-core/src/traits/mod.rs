//! Collaborator traits
//!
//! These traits define the interface between the pipeline logic and the
//! hardware or library code around it: the network socket, the panel,
//! the JPEG decoder and the heap.

pub mod decoder;
pub mod display;
pub mod memory;
pub mod network;

pub use decoder::{DecodeError, Tile, TileDecoder, TileSource};
pub use display::{DisplayError, PixelDisplay};
pub use memory::MemoryProbe;
pub use network::DatagramSource;
