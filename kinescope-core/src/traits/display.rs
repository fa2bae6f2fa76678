//! Pixel display trait

/// Errors that can occur while driving the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// Bus transfer failed
    Bus,
    /// Control pin could not be driven
    Pin,
    /// Window lies outside the panel
    InvalidWindow,
}

/// Trait for an RGB565 panel with an addressable write window
///
/// Writes are grouped in a bulk scope: [`begin_write`](Self::begin_write)
/// claims the bus, any number of window/pixel operations follow, and
/// [`end_write`](Self::end_write) releases it.
pub trait PixelDisplay {
    /// Open a bulk write scope
    fn begin_write(&mut self) -> Result<(), DisplayError>;

    /// Select the rectangle subsequent pixels are written into
    ///
    /// Pixels fill the window row by row, left to right.
    fn set_window(&mut self, x: u16, y: u16, width: u16, height: u16) -> Result<(), DisplayError>;

    /// Stream pixels into the current window
    fn push_pixels(&mut self, pixels: &[u16]) -> Result<(), DisplayError>;

    /// Close the bulk write scope
    fn end_write(&mut self) -> Result<(), DisplayError>;

    /// Panel dimensions as (width, height) in pixels
    fn dimensions(&self) -> (u16, u16);
}
