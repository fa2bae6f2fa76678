//! UDP ingress
//!
//! Adapts an embassy-net UDP socket to the non-blocking
//! [`DatagramSource`] the ingest cycle polls, and keeps the streaming
//! client count in telemetry current.

use defmt::*;
use embassy_futures::poll_once;
use embassy_net::udp::UdpSocket;
use embassy_net::IpAddress;
use embassy_time::Instant;
use kinescope_core::clients::{ClientTracker, CLIENT_IDLE_TIMEOUT};
use kinescope_core::telemetry::Telemetry;
use kinescope_core::traits::DatagramSource;

pub struct UdpIngress {
    socket: UdpSocket<'static>,
    clients: ClientTracker<IpAddress>,
    telemetry: &'static Telemetry,
}

impl UdpIngress {
    pub fn new(socket: UdpSocket<'static>, telemetry: &'static Telemetry) -> Self {
        Self {
            socket,
            clients: ClientTracker::new(CLIENT_IDLE_TIMEOUT),
            telemetry,
        }
    }

    /// Drop clients that stopped sending
    pub fn sweep_clients(&mut self, now: Instant) {
        let left = self.clients.expire(now);
        if left > 0 {
            info!("{} client(s) went quiet, {} streaming", left, self.clients.len());
            self.telemetry.set_clients(self.clients.len() as u32);
        }
    }
}

impl DatagramSource for UdpIngress {
    fn is_pending(&self) -> bool {
        self.socket.may_recv()
    }

    fn read_datagram(&mut self, buf: &mut [u8]) -> usize {
        match poll_once(self.socket.recv_from(buf)) {
            core::task::Poll::Ready(Ok((len, meta))) => {
                let addr = meta.endpoint.addr;
                if self.clients.seen(addr, Instant::now()) {
                    info!("Client {} streaming, {} total", addr, self.clients.len());
                    self.telemetry.set_clients(self.clients.len() as u32);
                }
                len
            }
            core::task::Poll::Ready(Err(e)) => {
                warn!("Datagram dropped: {:?}", e);
                0
            }
            core::task::Poll::Pending => 0,
        }
    }
}
