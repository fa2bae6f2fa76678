//! Fragment header encoding and decoding.
//!
//! Header format (12 bytes, little-endian):
//! - FRAME ID (4 bytes): sender-assigned frame identifier, may wrap
//! - TOTAL PACKETS (2 bytes): number of fragments the frame was split into
//! - FRAGMENT INDEX (2 bytes): position of this fragment, 0-based
//! - PAYLOAD SIZE (4 bytes): number of payload bytes following the header

/// Size of the fixed fragment header
pub const HEADER_LEN: usize = 12;

/// Largest datagram the receiver reads (one Ethernet MTU)
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Largest payload that fits in a single datagram
pub const MAX_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - HEADER_LEN;

/// Errors that can occur while parsing or encoding a fragment header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderError {
    /// Datagram shorter than the fixed header
    Truncated,
    /// Declared payload size differs from the bytes actually received
    SizeMismatch {
        /// Size written in the header
        declared: u32,
        /// Bytes following the header
        actual: u32,
    },
    /// Frame declares zero fragments
    NoPackets,
    /// Fragment index is not below the declared fragment count
    IndexOutOfRange,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// Header preceding every fragment payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FragmentHeader {
    /// Frame this fragment belongs to
    pub frame_id: u32,
    /// Number of fragments in the frame
    pub total_packets: u16,
    /// Position of this fragment within the frame
    pub fragment_index: u16,
    /// Payload length in bytes
    pub payload_size: u32,
}

impl FragmentHeader {
    /// Create a header for a fragment carrying `payload_size` bytes
    pub const fn new(
        frame_id: u32,
        total_packets: u16,
        fragment_index: u16,
        payload_size: u32,
    ) -> Self {
        Self {
            frame_id,
            total_packets,
            fragment_index,
            payload_size,
        }
    }

    /// Split a datagram into its header and payload
    ///
    /// Only structural checks are made here. Limits that depend on the
    /// receiver's configuration (fragment count, frame size) are left to
    /// the caller.
    pub fn parse(datagram: &[u8]) -> Result<(Self, &[u8]), HeaderError> {
        if datagram.len() < HEADER_LEN {
            return Err(HeaderError::Truncated);
        }

        let header = Self {
            frame_id: u32::from_le_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]),
            total_packets: u16::from_le_bytes([datagram[4], datagram[5]]),
            fragment_index: u16::from_le_bytes([datagram[6], datagram[7]]),
            payload_size: u32::from_le_bytes([
                datagram[8],
                datagram[9],
                datagram[10],
                datagram[11],
            ]),
        };
        let payload = &datagram[HEADER_LEN..];

        if header.payload_size as usize != payload.len() {
            return Err(HeaderError::SizeMismatch {
                declared: header.payload_size,
                actual: payload.len() as u32,
            });
        }
        if header.total_packets == 0 {
            return Err(HeaderError::NoPackets);
        }
        if header.fragment_index >= header.total_packets {
            return Err(HeaderError::IndexOutOfRange);
        }

        Ok((header, payload))
    }

    /// Encode this header into the first [`HEADER_LEN`] bytes of `buffer`
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, HeaderError> {
        if buffer.len() < HEADER_LEN {
            return Err(HeaderError::BufferTooSmall);
        }

        buffer[0..4].copy_from_slice(&self.frame_id.to_le_bytes());
        buffer[4..6].copy_from_slice(&self.total_packets.to_le_bytes());
        buffer[6..8].copy_from_slice(&self.fragment_index.to_le_bytes());
        buffer[8..12].copy_from_slice(&self.payload_size.to_le_bytes());

        Ok(HEADER_LEN)
    }

    /// Whether this is the first fragment of a frame
    pub fn is_first(&self) -> bool {
        self.fragment_index == 0
    }

    /// Whether this is the last fragment of a frame
    pub fn is_last(&self) -> bool {
        self.total_packets.checked_sub(1) == Some(self.fragment_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn datagram(header: &FragmentHeader, payload: &[u8]) -> heapless::Vec<u8, MAX_DATAGRAM_SIZE> {
        let mut buf = [0u8; HEADER_LEN];
        header.encode(&mut buf).unwrap();
        let mut out = heapless::Vec::new();
        out.extend_from_slice(&buf).unwrap();
        out.extend_from_slice(payload).unwrap();
        out
    }

    #[test]
    fn test_parse_little_endian_fields() {
        let bytes = [
            0x78, 0x56, 0x34, 0x12, // frame id
            0x03, 0x00, // total packets
            0x01, 0x00, // fragment index
            0x02, 0x00, 0x00, 0x00, // payload size
            0xAB, 0xCD,
        ];

        let (header, payload) = FragmentHeader::parse(&bytes).unwrap();
        assert_eq!(header.frame_id, 0x1234_5678);
        assert_eq!(header.total_packets, 3);
        assert_eq!(header.fragment_index, 1);
        assert_eq!(header.payload_size, 2);
        assert_eq!(payload, &[0xAB, 0xCD]);
    }

    #[test]
    fn test_parse_truncated() {
        assert_eq!(FragmentHeader::parse(&[0u8; 11]), Err(HeaderError::Truncated));
    }

    #[test]
    fn test_parse_size_mismatch() {
        let header = FragmentHeader::new(1, 1, 0, 4);
        let bytes = datagram(&header, &[1, 2, 3]);
        assert_eq!(
            FragmentHeader::parse(&bytes),
            Err(HeaderError::SizeMismatch {
                declared: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_parse_zero_packets() {
        let header = FragmentHeader::new(1, 0, 0, 0);
        let bytes = datagram(&header, &[]);
        assert_eq!(FragmentHeader::parse(&bytes), Err(HeaderError::NoPackets));
    }

    #[test]
    fn test_parse_index_out_of_range() {
        let header = FragmentHeader::new(1, 2, 2, 1);
        let bytes = datagram(&header, &[0]);
        assert_eq!(
            FragmentHeader::parse(&bytes),
            Err(HeaderError::IndexOutOfRange)
        );
    }

    #[test]
    fn test_first_and_last() {
        assert!(FragmentHeader::new(0, 1, 0, 0).is_first());
        assert!(FragmentHeader::new(0, 1, 0, 0).is_last());
        assert!(!FragmentHeader::new(0, 3, 1, 0).is_last());
        assert!(FragmentHeader::new(0, 3, 2, 0).is_last());
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let header = FragmentHeader::new(1, 1, 0, 0);
        let mut buf = [0u8; 4];
        assert_eq!(header.encode(&mut buf), Err(HeaderError::BufferTooSmall));
    }

    proptest! {
        #[test]
        fn parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = FragmentHeader::parse(&bytes);
        }

        #[test]
        fn parsed_headers_are_consistent(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            if let Ok((header, payload)) = FragmentHeader::parse(&bytes) {
                prop_assert_eq!(header.payload_size as usize, payload.len());
                prop_assert!(header.total_packets > 0);
                prop_assert!(header.fragment_index < header.total_packets);
            }
        }
    }
}
