//! Strip planning for full-frame flushes

/// A horizontal band of full-width rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Strip {
    /// First row
    pub y: u16,
    /// Rows in this strip
    pub height: u16,
}

impl Strip {
    /// Range of pixel indices this strip covers in a row-major buffer
    pub fn pixel_range(&self, width: u16) -> core::ops::Range<usize> {
        let width = width as usize;
        let start = self.y as usize * width;
        start..start + self.height as usize * width
    }
}

/// Splits `height` rows into strips of at most `strip_height` rows
///
/// Every row is covered by exactly one strip; only the last strip may be
/// shorter.
#[derive(Debug, Clone)]
pub struct StripPlan {
    height: u16,
    strip_height: u16,
    next_y: u16,
}

impl StripPlan {
    pub fn new(height: u16, strip_height: u16) -> Self {
        Self {
            height,
            strip_height: strip_height.max(1),
            next_y: 0,
        }
    }
}

impl Iterator for StripPlan {
    type Item = Strip;

    fn next(&mut self) -> Option<Strip> {
        if self.next_y >= self.height {
            return None;
        }
        let y = self.next_y;
        let height = self.strip_height.min(self.height - y);
        self.next_y = y + height;
        Some(Strip { y, height })
    }
}
