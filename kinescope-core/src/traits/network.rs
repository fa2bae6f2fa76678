//! Datagram source trait

/// Non-blocking source of received datagrams
///
/// Implemented over a bound UDP socket. Neither method may wait for
/// traffic: the ingest task polls on its own schedule.
pub trait DatagramSource {
    /// Whether at least one datagram is waiting
    fn is_pending(&self) -> bool;

    /// Copy the next datagram into `buf`
    ///
    /// Returns the number of bytes written, or 0 if nothing was read.
    fn read_datagram(&mut self, buf: &mut [u8]) -> usize;
}
