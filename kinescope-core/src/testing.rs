//! Test doubles for the collaborator traits

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::traits::{
    DatagramSource, DecodeError, DisplayError, MemoryProbe, PixelDisplay, Tile, TileDecoder,
    TileSource,
};

/// Recorded panel operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Begin,
    Window(u16, u16, u16, u16),
    Push(Vec<u16>),
    End,
}

/// Panel that records every call
pub struct FakeDisplay {
    pub width: u16,
    pub height: u16,
    pub ops: Vec<Op>,
    pub fail_push: bool,
}

impl FakeDisplay {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
            fail_push: false,
        }
    }

    /// Every pushed pixel in order
    pub fn pushed(&self) -> Vec<u16> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Push(p) => Some(p.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

impl PixelDisplay for FakeDisplay {
    fn begin_write(&mut self) -> Result<(), DisplayError> {
        self.ops.push(Op::Begin);
        Ok(())
    }

    fn set_window(&mut self, x: u16, y: u16, width: u16, height: u16) -> Result<(), DisplayError> {
        self.ops.push(Op::Window(x, y, width, height));
        Ok(())
    }

    fn push_pixels(&mut self, pixels: &[u16]) -> Result<(), DisplayError> {
        if self.fail_push {
            return Err(DisplayError::Bus);
        }
        self.ops.push(Op::Push(pixels.to_vec()));
        Ok(())
    }

    fn end_write(&mut self) -> Result<(), DisplayError> {
        self.ops.push(Op::End);
        Ok(())
    }

    fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }
}

pub struct FakeTile {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<u16>,
}

pub fn tile(x: u16, y: u16, width: u16, height: u16, pixels: &[u16]) -> FakeTile {
    FakeTile {
        x,
        y,
        width,
        height,
        pixels: pixels.to_vec(),
    }
}

/// Replays a fixed tile list, optionally failing at one position
pub struct FakeDecoder {
    pub tiles: Vec<FakeTile>,
    pub fail_at: Option<usize>,
}

impl FakeDecoder {
    pub fn new(tiles: Vec<FakeTile>) -> Self {
        Self { tiles, fail_at: None }
    }
}

pub struct FakeSession<'a> {
    tiles: &'a [FakeTile],
    next: usize,
    fail_at: Option<usize>,
}

impl TileSource for FakeSession<'_> {
    fn next_tile(&mut self) -> Option<Result<Tile<'_>, DecodeError>> {
        if self.fail_at == Some(self.next) {
            self.next += 1;
            return Some(Err(DecodeError::Malformed));
        }
        let t = self.tiles.get(self.next)?;
        self.next += 1;
        Some(Ok(Tile {
            x: t.x,
            y: t.y,
            width: t.width,
            height: t.height,
            pixels: &t.pixels,
        }))
    }
}

impl TileDecoder for FakeDecoder {
    type Session<'a> = FakeSession<'a>;

    fn decode<'a>(&'a mut self, jpeg: &'a [u8]) -> Result<FakeSession<'a>, DecodeError> {
        if jpeg.is_empty() {
            return Err(DecodeError::Malformed);
        }
        Ok(FakeSession {
            tiles: &self.tiles,
            next: 0,
            fail_at: self.fail_at,
        })
    }
}

/// Heap probe with a fixed reading
pub struct FixedHeap(pub usize);

impl MemoryProbe for FixedHeap {
    fn free_bytes(&self) -> usize {
        self.0
    }
}

/// Queue of datagrams waiting to be read
#[derive(Default)]
pub struct FakeSource {
    pub queue: VecDeque<Vec<u8>>,
}

impl DatagramSource for FakeSource {
    fn is_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    fn read_datagram(&mut self, buf: &mut [u8]) -> usize {
        match self.queue.pop_front() {
            Some(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                len
            }
            None => 0,
        }
    }
}
