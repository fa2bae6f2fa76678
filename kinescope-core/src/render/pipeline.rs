//! Decode-and-draw pipeline
//!
//! Owns the render buffer the reassembler copies finished frames into,
//! the optional full-frame pixel buffer, the decoder and the panel.
//!
//! With a pixel buffer, tiles are composed off-screen and the frame is
//! flushed in horizontal strips once decoding succeeds, so a frame that
//! fails halfway never reaches the panel. Without one, every tile is
//! written to the panel as soon as it is decoded.

use alloc::boxed::Box;

use embassy_futures::yield_now;

use super::strip::StripPlan;
use crate::buffer::{alloc_slice, InitError};
use crate::config::{StreamConfig, STRIPS_PER_YIELD, TILES_PER_YIELD};
use crate::traits::{
    DecodeError, DisplayError, MemoryProbe, PixelDisplay, Tile, TileDecoder, TileSource,
};

/// Errors that can occur while rendering a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RenderError {
    /// Decoder rejected the image
    Decode(DecodeError),
    /// Panel write failed
    Display(DisplayError),
    /// Requested length exceeds the render buffer
    FrameTooLarge,
}

impl From<DecodeError> for RenderError {
    fn from(err: DecodeError) -> Self {
        RenderError::Decode(err)
    }
}

impl From<DisplayError> for RenderError {
    fn from(err: DisplayError) -> Self {
        RenderError::Display(err)
    }
}

/// Summary of one rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RenderStats {
    /// Tiles drawn, fully or clipped
    pub tiles_drawn: u32,
    /// Tiles entirely outside the panel
    pub tiles_skipped: u32,
    /// Strips flushed (0 when unbuffered)
    pub strips_flushed: u16,
}

/// Part of a tile that lies on the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Visible {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
}

fn clip_tile(tile: &Tile<'_>, width: u16, height: u16) -> Option<Visible> {
    if tile.x >= width || tile.y >= height || tile.width == 0 || tile.height == 0 {
        return None;
    }
    Some(Visible {
        x: tile.x,
        y: tile.y,
        width: tile.width.min(width - tile.x),
        height: tile.height.min(height - tile.y),
    })
}

/// Copy the visible rows of `tile` into a row-major frame of width `width`
fn blit(pixels: &mut [u16], width: u16, tile: &Tile<'_>, visible: Visible) {
    let stride = width as usize;
    let cols = visible.width as usize;
    for row in 0..visible.height {
        let src = &tile.row(row)[..cols];
        let start = (visible.y + row) as usize * stride + visible.x as usize;
        pixels[start..start + cols].copy_from_slice(src);
    }
}

/// Write the visible rows of `tile` straight to the panel
fn draw_direct<D: PixelDisplay>(
    display: &mut D,
    tile: &Tile<'_>,
    visible: Visible,
) -> Result<(), DisplayError> {
    display.begin_write()?;
    let result = display
        .set_window(visible.x, visible.y, visible.width, visible.height)
        .and_then(|()| {
            let cols = visible.width as usize;
            (0..visible.height).try_for_each(|row| display.push_pixels(&tile.row(row)[..cols]))
        });
    let end = display.end_write();
    result.and(end)
}

/// Push a composed frame to the panel in strips
async fn flush_strips<D: PixelDisplay>(
    display: &mut D,
    pixels: &[u16],
    width: u16,
    height: u16,
    strip_height: u16,
) -> Result<u16, DisplayError> {
    display.begin_write()?;

    let mut flushed = 0u16;
    let mut result = Ok(());
    for strip in StripPlan::new(height, strip_height) {
        result = display
            .set_window(0, strip.y, width, strip.height)
            .and_then(|()| display.push_pixels(&pixels[strip.pixel_range(width)]));
        if result.is_err() {
            break;
        }
        flushed += 1;
        if flushed % STRIPS_PER_YIELD == 0 {
            yield_now().await;
        }
    }

    let end = display.end_write();
    result.and(end).map(|()| flushed)
}

/// Decoder, panel and frame buffers
pub struct RenderPipeline<D, X> {
    display: D,
    decoder: X,
    width: u16,
    height: u16,
    strip_height: u16,
    frame: Box<[u8]>,
    pixels: Option<Box<[u16]>>,
}

impl<D: PixelDisplay, X: TileDecoder> RenderPipeline<D, X> {
    /// Allocate the render buffer and, if the heap allows, the pixel buffer
    ///
    /// The panel must report the configured display size. The render
    /// buffer is required. The pixel buffer is only allocated when the
    /// heap left after the render buffer exceeds its size plus the
    /// configured headroom; otherwise frames are drawn tile by tile.
    pub fn new<P: MemoryProbe>(
        config: &StreamConfig,
        display: D,
        decoder: X,
        heap: &P,
    ) -> Result<Self, InitError> {
        config.validate()?;

        let expected = (config.display_width, config.display_height);
        let actual = display.dimensions();
        if actual != expected {
            return Err(InitError::DisplayMismatch { expected, actual });
        }
        let (width, height) = expected;

        let frame = alloc_slice(config.max_frame_size, 0u8)?;

        let pixel_count = config.pixel_count();
        let pixel_bytes = pixel_count * core::mem::size_of::<u16>();
        let pixels = if heap.free_bytes() > pixel_bytes + config.pixel_buffer_headroom {
            alloc_slice(pixel_count, 0u16).ok()
        } else {
            None
        };

        Ok(Self {
            display,
            decoder,
            width,
            height,
            strip_height: config.flush_strip_height(),
            frame,
            pixels,
        })
    }

    /// Buffer the reassembler copies a finished frame into
    pub fn frame_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.frame
    }

    /// Whether frames are composed off-screen before flushing
    pub fn is_buffered(&self) -> bool {
        self.pixels.is_some()
    }

    /// Rows per flushed strip
    pub fn strip_height(&self) -> u16 {
        self.strip_height
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Decode the first `len` bytes of the render buffer and draw them
    pub async fn render(&mut self, len: usize) -> Result<RenderStats, RenderError> {
        if len > self.frame.len() {
            return Err(RenderError::FrameTooLarge);
        }

        let (width, height) = (self.width, self.height);
        let mut pixels = self.pixels.as_deref_mut();
        if let Some(buf) = pixels.as_deref_mut() {
            buf.fill(0);
        }

        let mut stats = RenderStats::default();
        let mut session = self.decoder.decode(&self.frame[..len])?;
        let mut seen = 0u32;

        while let Some(next) = session.next_tile() {
            let tile = next?;
            if tile.pixels.len() < tile.width as usize * tile.height as usize {
                return Err(RenderError::Decode(DecodeError::Malformed));
            }

            match clip_tile(&tile, width, height) {
                None => stats.tiles_skipped += 1,
                Some(visible) => {
                    match pixels.as_deref_mut() {
                        Some(buf) => blit(buf, width, &tile, visible),
                        None => draw_direct(&mut self.display, &tile, visible)?,
                    }
                    stats.tiles_drawn += 1;
                }
            }

            seen += 1;
            if seen % TILES_PER_YIELD == 0 {
                yield_now().await;
            }
        }

        if let Some(buf) = pixels {
            stats.strips_flushed =
                flush_strips(&mut self.display, buf, width, height, self.strip_height).await?;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tile, FakeDecoder, FakeDisplay, FakeTile, FixedHeap, Op};
    use alloc::vec;
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    fn config() -> StreamConfig {
        StreamConfig {
            display_width: 4,
            display_height: 4,
            max_frame_size: 64,
            pixel_buffer_headroom: 0,
            ..StreamConfig::DEFAULT
        }
    }

    fn pipeline(tiles: Vec<FakeTile>, heap: usize) -> RenderPipeline<FakeDisplay, FakeDecoder> {
        let decoder = FakeDecoder::new(tiles);
        RenderPipeline::new(&config(), FakeDisplay::new(4, 4), decoder, &FixedHeap(heap)).unwrap()
    }

    #[test]
    fn test_panel_must_match_configured_size() {
        let decoder = FakeDecoder::new(vec![]);
        let display = FakeDisplay::new(4, 3);
        let result = RenderPipeline::new(&config(), display, decoder, &FixedHeap(1_000));
        assert_eq!(
            result.err(),
            Some(InitError::DisplayMismatch {
                expected: (4, 4),
                actual: (4, 3),
            })
        );
    }

    #[test]
    fn test_pixel_buffer_needs_headroom() {
        // 4x4 panel needs 32 bytes
        assert!(pipeline(vec![], 33).is_buffered());
        assert!(!pipeline(vec![], 32).is_buffered());
    }

    #[test]
    fn test_buffered_render_flushes_full_frame() {
        let mut pipeline = pipeline(vec![tile(1, 1, 2, 2, &[7, 7, 7, 7])], 1_000);
        let stats = block_on(pipeline.render(10)).unwrap();

        assert_eq!(stats.tiles_drawn, 1);
        assert_eq!(stats.strips_flushed, 1);

        let ops = &pipeline.display().ops;
        assert_eq!(ops[0], Op::Begin);
        assert_eq!(ops[1], Op::Window(0, 0, 4, 4));
        assert_eq!(ops.last(), Some(&Op::End));
        #[rustfmt::skip]
        let expected: [u16; 16] = [
            0, 0, 0, 0,
            0, 7, 7, 0,
            0, 7, 7, 0,
            0, 0, 0, 0,
        ];
        assert_eq!(pipeline.display().pushed(), expected);
    }

    #[test]
    fn test_clipped_tile_uses_source_stride() {
        // 3x2 tile hanging off the right edge: only column 3 is visible
        let mut pipeline = pipeline(vec![tile(3, 0, 3, 2, &[1, 2, 3, 4, 5, 6])], 1_000);
        block_on(pipeline.render(10)).unwrap();

        let frame = pipeline.display().pushed();
        assert_eq!(frame[3], 1);
        assert_eq!(frame[7], 4);
        assert_eq!(frame.iter().filter(|&&p| p != 0).count(), 2);
    }

    #[test]
    fn test_tile_outside_panel_skipped() {
        let mut pipeline = pipeline(vec![tile(4, 0, 2, 2, &[9; 4]), tile(0, 0, 1, 1, &[5])], 1_000);
        let stats = block_on(pipeline.render(10)).unwrap();
        assert_eq!(stats.tiles_skipped, 1);
        assert_eq!(stats.tiles_drawn, 1);
        assert!(!pipeline.display().pushed().contains(&9));
    }

    #[test]
    fn test_unbuffered_draws_each_tile() {
        let mut pipeline = pipeline(vec![tile(2, 3, 3, 2, &[1, 2, 3, 4, 5, 6])], 0);
        let stats = block_on(pipeline.render(10)).unwrap();

        assert_eq!(stats.strips_flushed, 0);
        assert_eq!(
            pipeline.display().ops,
            [
                Op::Begin,
                Op::Window(2, 3, 2, 1),
                Op::Push(vec![1, 2]),
                Op::End,
            ]
        );
    }

    #[test]
    fn test_strips_follow_plan() {
        let cfg = StreamConfig {
            display_width: 2,
            display_height: 25,
            ..config()
        };
        let decoder = FakeDecoder::new(vec![]);
        let mut pipeline =
            RenderPipeline::new(&cfg, FakeDisplay::new(2, 25), decoder, &FixedHeap(1_000)).unwrap();
        assert_eq!(pipeline.strip_height(), 10);

        let stats = block_on(pipeline.render(1)).unwrap();
        assert_eq!(stats.strips_flushed, 3);

        let windows: Vec<&Op> = pipeline
            .display()
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Window(..)))
            .collect();
        assert_eq!(
            windows,
            [&Op::Window(0, 0, 2, 10), &Op::Window(0, 10, 2, 10), &Op::Window(0, 20, 2, 5)]
        );
    }

    #[test]
    fn test_decode_failure_skips_flush() {
        let decoder = FakeDecoder {
            tiles: vec![tile(0, 0, 1, 1, &[3]), tile(1, 0, 1, 1, &[3])],
            fail_at: Some(1),
        };
        let mut pipeline =
            RenderPipeline::new(&config(), FakeDisplay::new(4, 4), decoder, &FixedHeap(1_000))
                .unwrap();

        assert_eq!(
            block_on(pipeline.render(10)),
            Err(RenderError::Decode(DecodeError::Malformed))
        );
        assert!(pipeline.display().ops.is_empty());
    }

    #[test]
    fn test_short_tile_is_malformed() {
        let mut pipeline = pipeline(vec![tile(0, 0, 2, 2, &[1, 2, 3])], 1_000);
        assert_eq!(
            block_on(pipeline.render(10)),
            Err(RenderError::Decode(DecodeError::Malformed))
        );
    }

    #[test]
    fn test_display_error_closes_write() {
        let mut pipeline = pipeline(vec![tile(0, 0, 1, 1, &[1])], 1_000);
        pipeline.display_mut().fail_push = true;

        assert_eq!(
            block_on(pipeline.render(10)),
            Err(RenderError::Display(DisplayError::Bus))
        );
        assert_eq!(pipeline.display().ops.last(), Some(&Op::End));
    }

    #[test]
    fn test_pixel_buffer_cleared_between_frames() {
        let mut pipeline = pipeline(vec![tile(0, 0, 1, 1, &[8])], 1_000);
        block_on(pipeline.render(10)).unwrap();

        pipeline.decoder.tiles.clear();
        pipeline.display_mut().ops.clear();
        block_on(pipeline.render(10)).unwrap();
        assert!(pipeline.display().pushed().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_rejects_oversized_length() {
        let mut pipeline = pipeline(vec![], 1_000);
        assert_eq!(block_on(pipeline.render(65)), Err(RenderError::FrameTooLarge));
    }

    #[test]
    fn test_empty_frame_is_decode_error() {
        let mut pipeline = pipeline(vec![], 1_000);
        assert_eq!(
            block_on(pipeline.render(0)),
            Err(RenderError::Decode(DecodeError::Malformed))
        );
    }

    #[test]
    fn test_many_tiles_yield_and_finish() {
        let tiles = (0..100).map(|i| tile(i % 4, 0, 1, 1, &[1])).collect();
        let mut pipeline = pipeline(tiles, 1_000);
        let stats = block_on(pipeline.render(10)).unwrap();
        assert_eq!(stats.tiles_drawn, 100);
    }
}
