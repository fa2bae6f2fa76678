//! Global heap
//!
//! Frame buffers, the decoder scratch space and the optional pixel buffer
//! all live here. They are allocated once during startup.

use embedded_alloc::LlffHeap as Heap;
use kinescope_core::traits::MemoryProbe;

#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 180KB
const HEAP_SIZE: usize = 180 * 1024;

/// Initialize the heap allocator
///
/// Must run once, before the first allocation.
pub fn init() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}

/// Reads free space from the global heap
#[derive(Clone, Copy)]
pub struct HeapProbe;

impl MemoryProbe for HeapProbe {
    fn free_bytes(&self) -> usize {
        HEAP.free()
    }
}
