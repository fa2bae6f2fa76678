//! Streaming client tracking
//!
//! A client is a datagram source heard from within the idle window. A new
//! source joins on its first datagram; one that stays quiet for longer
//! than the window leaves on the next sweep. The table is bounded: when it
//! is full, the least recently heard client makes room for a newcomer.

use embassy_time::{Duration, Instant};
use heapless::Vec;

/// Clients tracked at most
pub const MAX_CLIENTS: usize = 4;

/// Silence after which a client is considered gone
pub const CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Recently active datagram sources
#[derive(Debug)]
pub struct ClientTracker<A, const N: usize = MAX_CLIENTS> {
    idle_timeout: Duration,
    clients: Vec<(A, Instant), N>,
}

impl<A: PartialEq + Copy, const N: usize> ClientTracker<A, N> {
    pub const fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            clients: Vec::new(),
        }
    }

    /// Record a datagram from `addr`
    ///
    /// Returns true if `addr` was not a known client.
    pub fn seen(&mut self, addr: A, now: Instant) -> bool {
        if let Some((_, last)) = self.clients.iter_mut().find(|(a, _)| *a == addr) {
            *last = now;
            return false;
        }

        if self.clients.is_full() {
            let oldest = self
                .clients
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, last))| *last)
                .map(|(i, _)| i);
            if let Some(i) = oldest {
                self.clients.swap_remove(i);
            }
        }
        self.clients.push((addr, now)).is_ok()
    }

    /// Forget clients idle for longer than the timeout
    ///
    /// Returns how many left.
    pub fn expire(&mut self, now: Instant) -> usize {
        let timeout = self.idle_timeout;
        let before = self.clients.len();
        self.clients.retain(|(_, last)| {
            now.checked_duration_since(*last)
                .map_or(true, |idle| idle <= timeout)
        });
        before - self.clients.len()
    }

    /// Clients currently active
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
