//! Render task
//!
//! Decodes finished frames onto the panel at the paced rate.

use defmt::*;
use embassy_time::{Instant, Timer};
use kinescope_core::config::StreamConfig;
use kinescope_core::scheduler::{RenderCycle, RenderOutcome, RENDER_PERIOD};
use kinescope_core::telemetry::Telemetry;

use super::{FrameLock, RenderLock};
use crate::heap::HeapProbe;

#[embassy_executor::task]
pub async fn render_task(
    frame: &'static FrameLock,
    render: &'static RenderLock,
    telemetry: &'static Telemetry,
    config: StreamConfig,
) {
    info!("Render task started");

    let mut cycle = RenderCycle::new(&config);

    loop {
        let report = cycle
            .run_once(frame, render, telemetry, &HeapProbe, Instant::now())
            .await;

        match report.outcome {
            RenderOutcome::Rendered {
                frame_id,
                stats,
                render_time,
                pacing,
            } => {
                trace!(
                    "Frame {} rendered in {} us: {}",
                    frame_id,
                    render_time.as_micros(),
                    stats
                );
                if let Some(sample) = pacing.filter(|s| s.changed()) {
                    debug!(
                        "Pacing: {}.{} fps, interval {} -> {} ms",
                        sample.measured_fps_x10 / 10,
                        sample.measured_fps_x10 % 10,
                        sample.previous.as_millis(),
                        sample.interval.as_millis()
                    );
                }
            }
            RenderOutcome::Failed { frame_id, error } => {
                warn!("Frame {} failed to render: {:?}", frame_id, error);
            }
            RenderOutcome::Rejected(err) => {
                warn!("Frame rejected: {:?}", err);
            }
            RenderOutcome::Contended => trace!("Render skipped, lock busy"),
            RenderOutcome::NotDue | RenderOutcome::Idle => {}
        }

        if report.memory_low {
            warn!("Free heap below floor");
        }

        Timer::after(RENDER_PERIOD).await;
    }
}
