//! Sender-side fragmentation
//!
//! Splits an encoded image into datagrams. Every fragment except the last
//! carries exactly `chunk_size` payload bytes, which is what the receiver
//! relies on to place fragments that arrive out of order.

use heapless::Vec;

use crate::header::{FragmentHeader, HEADER_LEN, MAX_DATAGRAM_SIZE, MAX_PAYLOAD_SIZE};

/// Errors that can occur when setting up fragmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FragmentError {
    /// Nothing to send
    EmptyImage,
    /// Chunk size is zero or does not fit in a datagram
    InvalidChunkSize,
    /// Image needs more fragments than the header can count
    TooManyFragments,
}

/// Iterator over the datagrams of one frame
#[derive(Debug, Clone)]
pub struct Fragmenter<'a> {
    frame_id: u32,
    image: &'a [u8],
    chunk_size: usize,
    total_packets: u16,
    next_index: u16,
}

impl<'a> Fragmenter<'a> {
    /// Prepare `image` for transmission as frame `frame_id`
    pub fn new(frame_id: u32, image: &'a [u8], chunk_size: usize) -> Result<Self, FragmentError> {
        if image.is_empty() {
            return Err(FragmentError::EmptyImage);
        }
        if chunk_size == 0 || chunk_size > MAX_PAYLOAD_SIZE {
            return Err(FragmentError::InvalidChunkSize);
        }

        let total = image.len().div_ceil(chunk_size);
        let total_packets = u16::try_from(total).map_err(|_| FragmentError::TooManyFragments)?;

        Ok(Self {
            frame_id,
            image,
            chunk_size,
            total_packets,
            next_index: 0,
        })
    }

    /// Number of datagrams this frame is split into
    pub fn total_packets(&self) -> u16 {
        self.total_packets
    }

    /// Build the datagram for a specific fragment index
    pub fn fragment(&self, index: u16) -> Option<Vec<u8, MAX_DATAGRAM_SIZE>> {
        if index >= self.total_packets {
            return None;
        }

        let start = index as usize * self.chunk_size;
        let end = (start + self.chunk_size).min(self.image.len());
        let payload = &self.image[start..end];

        let header = FragmentHeader::new(
            self.frame_id,
            self.total_packets,
            index,
            payload.len() as u32,
        );

        let mut head = [0u8; HEADER_LEN];
        header.encode(&mut head).ok()?;

        let mut datagram = Vec::new();
        datagram.extend_from_slice(&head).ok()?;
        datagram.extend_from_slice(payload).ok()?;
        Some(datagram)
    }
}

impl Iterator for Fragmenter<'_> {
    type Item = Vec<u8, MAX_DATAGRAM_SIZE>;

    fn next(&mut self) -> Option<Self::Item> {
        let datagram = self.fragment(self.next_index)?;
        self.next_index += 1;
        Some(datagram)
    }
}
