//! Startup buffer allocation
//!
//! All large buffers are allocated exactly once, when their owning
//! component is built, and live as long as it does. Allocation is
//! fallible so a board without enough heap reports it instead of aborting.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::ConfigError;

/// Errors that can occur while building a pipeline component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Heap could not satisfy a required buffer
    OutOfMemory,
    /// Configuration is inconsistent
    Config(ConfigError),
    /// Panel size differs from the configured display size
    DisplayMismatch {
        expected: (u16, u16),
        actual: (u16, u16),
    },
}

impl From<ConfigError> for InitError {
    fn from(err: ConfigError) -> Self {
        InitError::Config(err)
    }
}

/// Allocate a boxed slice of `len` copies of `value`
pub fn alloc_slice<T: Clone>(len: usize, value: T) -> Result<Box<[T]>, InitError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| InitError::OutOfMemory)?;
    buf.resize(len, value);
    Ok(buf.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_slice_filled() {
        let buf = alloc_slice(8, 0xAAu8).unwrap();
        assert_eq!(buf.len(), 8);
        assert!(buf.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_alloc_slice_impossible_size() {
        assert_eq!(
            alloc_slice::<u64>(usize::MAX / 4, 0).unwrap_err(),
            InitError::OutOfMemory
        );
    }
}
