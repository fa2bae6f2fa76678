//! Telemetry monitor task

use defmt::*;
use embassy_time::Ticker;
use kinescope_core::scheduler::MONITOR_PERIOD;
use kinescope_core::telemetry::Telemetry;

use kinescope_core::traits::MemoryProbe;

use crate::heap::HeapProbe;

#[embassy_executor::task]
pub async fn monitor_task(telemetry: &'static Telemetry) {
    info!("Monitor task started");

    let mut ticker = Ticker::every(MONITOR_PERIOD);

    loop {
        ticker.next().await;

        let report = telemetry.report();
        let completion = report.completion_rate_x10();
        let rendered = report.render_rate_x10();

        info!(
            "Frames: {} started, {} complete ({}.{}%), {} rendered ({}.{}%), {} incomplete, {} corrupt",
            report.frames_started,
            report.frames_completed,
            completion / 10,
            completion % 10,
            report.frames_rendered,
            rendered / 10,
            rendered % 10,
            report.frames_incomplete,
            report.frames_corrupt
        );
        info!(
            "Current frame {}: {}/{} fragments, {} bytes; heap free {}, {} memory errors",
            report.current.frame_id,
            report.current.received_packets,
            report.current.total_packets,
            report.current.total_size,
            HeapProbe.free_bytes(),
            report.memory_errors
        );
        info!(
            "Clients: {}, last render {} us",
            report.clients, report.last_render_us
        );
    }
}
