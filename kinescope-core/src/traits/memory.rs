//! Memory pressure probe

/// Reports how much heap is left
pub trait MemoryProbe {
    /// Bytes currently free on the heap
    fn free_bytes(&self) -> usize;
}
