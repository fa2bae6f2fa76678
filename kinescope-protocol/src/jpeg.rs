//! JPEG marker checks
//!
//! The receiver never parses JPEG segments. A frame is accepted when it
//! starts with Start-Of-Image and an End-Of-Image marker sits near its end.

/// Start-Of-Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End-Of-Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Smallest buffer considered a plausible JPEG
pub const MIN_JPEG_LEN: usize = 20;

/// How far back from the end the EOI marker is searched for
///
/// Encoders may pad after EOI, so the marker is not required to be the
/// final two bytes.
pub const EOI_SEARCH_WINDOW: usize = 20;

/// Whether `data` begins with the SOI marker
pub fn starts_with_soi(data: &[u8]) -> bool {
    data.len() >= SOI.len() && data[..SOI.len()] == SOI
}

/// Structural check of a fully reassembled image
///
/// Requires at least [`MIN_JPEG_LEN`] bytes, a leading SOI marker, and an
/// EOI marker within the last [`EOI_SEARCH_WINDOW`] bytes.
pub fn validate_structure(buffer: &[u8]) -> bool {
    if buffer.len() < MIN_JPEG_LEN || !starts_with_soi(buffer) {
        return false;
    }

    let tail = &buffer[buffer.len() - EOI_SEARCH_WINDOW..];
    tail.windows(EOI.len()).any(|pair| pair == EOI)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(eoi_at: Option<usize>) -> [u8; 64] {
        let mut buf = [0x11u8; 64];
        buf[0] = 0xFF;
        buf[1] = 0xD8;
        if let Some(pos) = eoi_at {
            buf[pos] = 0xFF;
            buf[pos + 1] = 0xD9;
        }
        buf
    }

    #[test]
    fn test_soi_detection() {
        assert!(starts_with_soi(&[0xFF, 0xD8, 0x00]));
        assert!(!starts_with_soi(&[0xFF]));
        assert!(!starts_with_soi(&[0xD8, 0xFF]));
    }

    #[test]
    fn test_valid_with_trailing_eoi() {
        let buf = image(Some(38));
        assert!(validate_structure(&buf[..40]));
    }

    #[test]
    fn test_valid_with_padding_after_eoi() {
        let buf = image(Some(25));
        assert!(validate_structure(&buf[..40]));
    }

    #[test]
    fn test_eoi_outside_window_rejected() {
        // EOI at 18..20 lies before the last 20 bytes of a 40-byte buffer
        let buf = image(Some(18));
        assert!(!validate_structure(&buf[..40]));
    }

    #[test]
    fn test_too_short_rejected() {
        let buf = image(Some(17));
        assert!(!validate_structure(&buf[..19]));
    }

    #[test]
    fn test_missing_soi_rejected() {
        let mut buf = image(Some(38));
        buf[1] = 0x00;
        assert!(!validate_structure(&buf[..40]));
    }

    #[test]
    fn test_minimum_length_accepted() {
        let buf = image(Some(18));
        assert!(validate_structure(&buf[..20]));
    }
}
