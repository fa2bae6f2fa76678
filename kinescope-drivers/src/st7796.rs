//! ST7796 TFT panel over SPI
//!
//! The ST7796 is a 320x480 RGB panel controller speaking the MIPI DCS
//! command set. It is driven in 4-wire SPI mode: chip select, a
//! data/command select line, clock and MOSI.
//!
//! # Transfers
//!
//! A command byte is sent with DC low, its parameters with DC high. Pixel
//! data follows a RAMWR command and fills the window set by CASET/RASET
//! row by row. Pixels are 16-bit RGB565, sent most significant byte first.
//!
//! Chip select is held low for a whole bulk write scope so consecutive
//! window and pixel transfers are not interrupted by CS toggling.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use kinescope_core::traits::{DisplayError, PixelDisplay};

/// ST7796 command opcodes
pub mod cmd {
    /// Software reset
    pub const SWRESET: u8 = 0x01;
    /// Leave sleep mode
    pub const SLPOUT: u8 = 0x11;
    /// Display inversion off
    pub const INVOFF: u8 = 0x20;
    /// Display on
    pub const DISPON: u8 = 0x29;
    /// Column address set
    pub const CASET: u8 = 0x2A;
    /// Row address set
    pub const RASET: u8 = 0x2B;
    /// Memory write
    pub const RAMWR: u8 = 0x2C;
    /// Memory access control (rotation and colour order)
    pub const MADCTL: u8 = 0x36;
    /// Interface pixel format
    pub const COLMOD: u8 = 0x3A;
}

/// MADCTL: row/column exchange (landscape)
const MADCTL_MV: u8 = 0x20;
/// MADCTL: BGR colour order
const MADCTL_BGR: u8 = 0x08;
/// COLMOD: 16 bits per pixel on both interfaces
const COLMOD_RGB565: u8 = 0x55;

/// Panel width in landscape orientation
pub const WIDTH: u16 = 480;
/// Panel height in landscape orientation
pub const HEIGHT: u16 = 320;

/// Pixels converted per SPI write
const PIXEL_CHUNK: usize = 64;

/// RGB565 black
pub const BLACK: u16 = 0x0000;

/// Build the 4-byte parameter of a CASET/RASET command
pub fn address_range(start: u16, len: u16) -> [u8; 4] {
    let end = start.saturating_add(len.saturating_sub(1));
    let [s_hi, s_lo] = start.to_be_bytes();
    let [e_hi, e_lo] = end.to_be_bytes();
    [s_hi, s_lo, e_hi, e_lo]
}

/// ST7796 driver
pub struct St7796<SPI, CS, DC> {
    spi: SPI,
    cs: CS,
    dc: DC,
    width: u16,
    height: u16,
    in_write: bool,
}

impl<SPI, CS, DC> St7796<SPI, CS, DC>
where
    SPI: SpiBus,
    CS: OutputPin,
    DC: OutputPin,
{
    /// Create a driver for a landscape-mounted panel
    ///
    /// The panel is not touched until [`init`](Self::init) is called.
    pub fn new(spi: SPI, cs: CS, dc: DC) -> Self {
        Self {
            spi,
            cs,
            dc,
            width: WIDTH,
            height: HEIGHT,
            in_write: false,
        }
    }

    /// Reset the controller and switch the panel on
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), DisplayError> {
        self.cs.set_high().map_err(|_| DisplayError::Pin)?;

        self.command(cmd::SWRESET, &[])?;
        delay.delay_ms(120);
        self.command(cmd::SLPOUT, &[])?;
        delay.delay_ms(120);

        self.command(cmd::COLMOD, &[COLMOD_RGB565])?;
        self.command(cmd::MADCTL, &[MADCTL_MV | MADCTL_BGR])?;
        self.command(cmd::INVOFF, &[])?;

        self.command(cmd::DISPON, &[])?;
        delay.delay_ms(20);
        Ok(())
    }

    /// Paint the whole panel with one RGB565 colour
    pub fn fill(&mut self, color: u16) -> Result<(), DisplayError> {
        self.begin_write()?;
        let result = self.fill_window(color);
        let end = self.end_write();
        result.and(end)
    }

    /// Blank the panel
    ///
    /// Panel RAM holds noise after power-up; anything not drawn over
    /// keeps showing it until cleared.
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.fill(BLACK)
    }

    fn fill_window(&mut self, color: u16) -> Result<(), DisplayError> {
        let (width, height) = (self.width, self.height);
        self.set_window(0, 0, width, height)?;

        let run = [color; PIXEL_CHUNK];
        let mut remaining = width as usize * height as usize;
        while remaining > 0 {
            let n = remaining.min(PIXEL_CHUNK);
            self.push_pixels(&run[..n])?;
            remaining -= n;
        }
        Ok(())
    }

    /// Release the bus and pins
    pub fn release(self) -> (SPI, CS, DC) {
        (self.spi, self.cs, self.dc)
    }

    /// Send a command with parameters, selecting the chip if needed
    fn command(&mut self, opcode: u8, params: &[u8]) -> Result<(), DisplayError> {
        let standalone = !self.in_write;
        if standalone {
            self.select()?;
        }
        let result = self.write_command(opcode, params);
        if standalone {
            let deselect = self.deselect();
            return result.and(deselect);
        }
        result
    }

    fn write_command(&mut self, opcode: u8, params: &[u8]) -> Result<(), DisplayError> {
        self.dc.set_low().map_err(|_| DisplayError::Pin)?;
        self.spi.write(&[opcode]).map_err(|_| DisplayError::Bus)?;
        self.spi.flush().map_err(|_| DisplayError::Bus)?;
        self.dc.set_high().map_err(|_| DisplayError::Pin)?;
        if !params.is_empty() {
            self.spi.write(params).map_err(|_| DisplayError::Bus)?;
        }
        Ok(())
    }

    fn select(&mut self) -> Result<(), DisplayError> {
        self.cs.set_low().map_err(|_| DisplayError::Pin)
    }

    fn deselect(&mut self) -> Result<(), DisplayError> {
        self.spi.flush().map_err(|_| DisplayError::Bus)?;
        self.cs.set_high().map_err(|_| DisplayError::Pin)
    }
}

impl<SPI, CS, DC> PixelDisplay for St7796<SPI, CS, DC>
where
    SPI: SpiBus,
    CS: OutputPin,
    DC: OutputPin,
{
    fn begin_write(&mut self) -> Result<(), DisplayError> {
        if !self.in_write {
            self.select()?;
            self.in_write = true;
        }
        Ok(())
    }

    fn set_window(&mut self, x: u16, y: u16, width: u16, height: u16) -> Result<(), DisplayError> {
        let fits_x = x.checked_add(width).is_some_and(|end| end <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|end| end <= self.height);
        if width == 0 || height == 0 || !fits_x || !fits_y {
            return Err(DisplayError::InvalidWindow);
        }

        self.command(cmd::CASET, &address_range(x, width))?;
        self.command(cmd::RASET, &address_range(y, height))?;
        self.command(cmd::RAMWR, &[])
    }

    fn push_pixels(&mut self, pixels: &[u16]) -> Result<(), DisplayError> {
        let standalone = !self.in_write;
        if standalone {
            self.select()?;
        }

        let mut bytes = [0u8; PIXEL_CHUNK * 2];
        let mut result = Ok(());
        for chunk in pixels.chunks(PIXEL_CHUNK) {
            for (dst, px) in bytes.chunks_exact_mut(2).zip(chunk) {
                dst.copy_from_slice(&px.to_be_bytes());
            }
            result = self
                .spi
                .write(&bytes[..chunk.len() * 2])
                .map_err(|_| DisplayError::Bus);
            if result.is_err() {
                break;
            }
        }

        if standalone {
            let deselect = self.deselect();
            return result.and(deselect);
        }
        result
    }

    fn end_write(&mut self) -> Result<(), DisplayError> {
        if !self.in_write {
            return Ok(());
        }
        self.in_write = false;
        self.deselect()
    }

    fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }
}
