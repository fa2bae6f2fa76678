//! JPEG tile decoder backed by zune-jpeg
//!
//! The image is decoded to RGB888 into a scratch buffer sized for the
//! largest accepted image, then handed out as full-width bands of
//! [`BAND_ROWS`] rows converted to RGB565. Both buffers are allocated once
//! when the decoder is created.
//!
//! Images larger than the configured maximum are refused as
//! [`DecodeError::TooLarge`] once the headers are read, before any pixel
//! data is decoded.

use alloc::boxed::Box;
use alloc::vec::Vec;

use kinescope_core::traits::{DecodeError, Tile, TileDecoder, TileSource};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::errors::DecodeErrors;
use zune_jpeg::JpegDecoder;

/// Rows per emitted tile
pub const BAND_ROWS: u16 = 16;

/// Bytes per decoded RGB888 pixel
const RGB_BYTES: usize = 3;

/// Pack an RGB888 pixel as RGB565
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

fn map_error(err: DecodeErrors) -> DecodeError {
    match err {
        DecodeErrors::Unsupported(_) => DecodeError::Unsupported,
        DecodeErrors::LargeDimensions(_) => DecodeError::TooLarge,
        _ => DecodeError::Malformed,
    }
}

fn alloc_zeroed<T: Copy + Default>(len: usize) -> Option<Box<[T]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, T::default());
    Some(buf.into_boxed_slice())
}

/// Baseline/progressive JPEG decoder with bounded scratch memory
pub struct ZuneTileDecoder {
    max_width: u16,
    max_height: u16,
    rgb: Box<[u8]>,
    band: Box<[u16]>,
}

impl ZuneTileDecoder {
    /// Allocate scratch space for images up to `max_width` x `max_height`
    ///
    /// Returns `None` if the heap cannot hold the scratch buffers.
    pub fn new(max_width: u16, max_height: u16) -> Option<Self> {
        let pixels = max_width as usize * max_height as usize;
        Some(Self {
            max_width,
            max_height,
            rgb: alloc_zeroed(pixels * RGB_BYTES)?,
            band: alloc_zeroed(max_width as usize * BAND_ROWS as usize)?,
        })
    }

    /// Largest accepted image
    pub fn max_dimensions(&self) -> (u16, u16) {
        (self.max_width, self.max_height)
    }
}

impl TileDecoder for ZuneTileDecoder {
    type Session<'a> = BandSession<'a>;

    fn decode<'a>(&'a mut self, jpeg: &'a [u8]) -> Result<BandSession<'a>, DecodeError> {
        let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGB);

        let mut decoder = JpegDecoder::new_with_options(jpeg, options);
        decoder.decode_headers().map_err(map_error)?;

        let (width, height) = decoder.dimensions().ok_or(DecodeError::Malformed)?;
        let size = decoder.output_buffer_size().ok_or(DecodeError::Malformed)?;
        if width > self.max_width as usize
            || height > self.max_height as usize
            || size != width * height * RGB_BYTES
        {
            return Err(DecodeError::TooLarge);
        }

        decoder.decode_into(&mut self.rgb[..size]).map_err(map_error)?;

        Ok(BandSession::new(&self.rgb[..size], &mut self.band, width as u16, height as u16))
    }
}

/// Tiles of one decoded image
pub struct BandSession<'a> {
    rgb: &'a [u8],
    band: &'a mut [u16],
    width: u16,
    height: u16,
    next_row: u16,
}

impl<'a> BandSession<'a> {
    /// Serve `rgb`, a `width` x `height` RGB888 image, through `band`
    ///
    /// `band` must hold at least `width * BAND_ROWS` pixels.
    pub fn new(rgb: &'a [u8], band: &'a mut [u16], width: u16, height: u16) -> Self {
        Self {
            rgb,
            band,
            width,
            height,
            next_row: 0,
        }
    }
}

impl TileSource for BandSession<'_> {
    fn next_tile(&mut self) -> Option<Result<Tile<'_>, DecodeError>> {
        if self.next_row >= self.height {
            return None;
        }

        let y = self.next_row;
        let rows = BAND_ROWS.min(self.height - y);
        let width = self.width as usize;
        let count = rows as usize * width;

        let start = y as usize * width * RGB_BYTES;
        let Some(src) = self.rgb.get(start..start + count * RGB_BYTES) else {
            return Some(Err(DecodeError::Malformed));
        };
        let Some(dst) = self.band.get_mut(..count) else {
            return Some(Err(DecodeError::TooLarge));
        };

        for (px, rgb) in dst.iter_mut().zip(src.chunks_exact(RGB_BYTES)) {
            *px = rgb565(rgb[0], rgb[1], rgb[2]);
        }
        self.next_row = y + rows;

        Some(Ok(Tile {
            x: 0,
            y,
            width: self.width,
            height: rows,
            pixels: &self.band[..count],
        }))
    }
}
