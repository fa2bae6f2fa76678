//! Packet ingest task
//!
//! Drains the UDP socket into the reassembler in short bursts.

use defmt::*;
use embassy_time::{Instant, Timer};
use kinescope_core::scheduler::{IngestCycle, INGEST_PERIOD};

use super::FrameLock;
use crate::net::UdpIngress;

#[embassy_executor::task]
pub async fn ingest_task(frame: &'static FrameLock, source: UdpIngress) {
    info!("Ingest task started");

    let mut cycle = IngestCycle::new(source);

    loop {
        let report = cycle.run_once(frame, Instant::now()).await;

        if report.completed > 0 {
            trace!("Frame complete");
        }
        if let Some(err) = report.last_error {
            debug!("Rejected {} datagram(s): {:?}", report.rejected, err);
        }
        if report.dropped > 0 {
            warn!("Frame lock busy, dropped {} datagram(s)", report.dropped);
        }
        if report.timed_out {
            warn!("Incomplete frame abandoned");
        }
        cycle.source_mut().sweep_clients(Instant::now());

        Timer::after(INGEST_PERIOD).await;
    }
}
