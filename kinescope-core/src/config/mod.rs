//! Configuration
//!
//! Build-time tunables for the stream, the display and the pacer.

pub mod stream;

pub use stream::*;
