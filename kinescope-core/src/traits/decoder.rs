//! Tile decoder traits
//!
//! A JPEG decoder is modelled as a lazy, finite sequence of decoded
//! rectangles. The render pipeline pulls one tile at a time and decides
//! where its pixels go, so the decoder never touches the pixel buffer or
//! the panel itself.

/// Errors reported by a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Stream is not a decodable JPEG
    Malformed,
    /// Valid JPEG using a feature the decoder lacks
    Unsupported,
    /// Image exceeds the decoder's scratch capacity
    TooLarge,
}

/// One decoded rectangle of RGB565 pixels
///
/// `pixels` holds `width * height` values, row-major, with a row stride
/// of `width`. Coordinates are relative to the image origin and may
/// extend past the panel edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile<'a> {
    /// Left edge
    pub x: u16,
    /// Top edge
    pub y: u16,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Pixel data
    pub pixels: &'a [u16],
}

impl Tile<'_> {
    /// Pixels of row `row` within the tile
    pub fn row(&self, row: u16) -> &[u16] {
        let stride = self.width as usize;
        let start = row as usize * stride;
        &self.pixels[start..start + stride]
    }
}

/// An in-progress decode yielding tiles
///
/// Each tile borrows the session, so it must be consumed before asking
/// for the next one.
pub trait TileSource {
    /// Produce the next tile
    ///
    /// Returns `None` once the image is fully decoded.
    fn next_tile(&mut self) -> Option<Result<Tile<'_>, DecodeError>>;
}

/// A JPEG decoder producing tile sessions
pub trait TileDecoder {
    /// Session type borrowing the decoder and the encoded image
    type Session<'a>: TileSource
    where
        Self: 'a;

    /// Start decoding `jpeg`
    ///
    /// Header-level failures are reported here; failures discovered while
    /// decoding come out of [`TileSource::next_tile`].
    fn decode<'a>(&'a mut self, jpeg: &'a [u8]) -> Result<Self::Session<'a>, DecodeError>;
}
