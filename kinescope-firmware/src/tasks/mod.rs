//! Embassy async tasks
//!
//! The ingest and render tasks share the frame and render locks; the
//! monitor only reads telemetry counters.

pub mod ingest;
pub mod monitor;
pub mod radio;
pub mod render;

use embassy_rp::gpio::Output;
use embassy_rp::peripherals::SPI1;
use embassy_rp::spi::{Blocking, Spi};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use kinescope_core::reassembly::FrameReassembler;
use kinescope_core::render::RenderPipeline;
use kinescope_drivers::{St7796, ZuneTileDecoder};

pub use ingest::ingest_task;
pub use monitor::monitor_task;
pub use radio::{cyw43_task, net_task};
pub use render::render_task;

/// Panel on SPI1
pub type Panel = St7796<Spi<'static, SPI1, Blocking>, Output<'static>, Output<'static>>;

/// Guards the in-flight frame
pub type FrameLock = Mutex<CriticalSectionRawMutex, FrameReassembler<'static>>;

/// Guards the render buffer, decoder and panel
pub type RenderLock = Mutex<CriticalSectionRawMutex, RenderPipeline<Panel, ZuneTileDecoder>>;
