/*
 * Kernel Heap Allocator
 *
 * Backs Rust's global allocator (`Box`, `Vec`, `Arc`, ...) with a plain
 * static byte array rather than a separately-mapped virtual window: the
 * kernel direct map already covers all of physical memory, so there is
 * nothing a dedicated heap mapping would buy here. `linked_list_allocator`
 * carves allocations out of that array under a spin lock.
 */

use linked_list_allocator::LockedHeap;

/// Size of the kernel heap, in bytes.
pub const HEAP_SIZE: usize = 4 * 1024 * 1024; // 4 MiB

static mut HEAP_ARENA: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initializes the kernel heap. Must run exactly once, after the coremap
/// is up (process tables, FD tables, and page-table nodes all allocate
/// through this before any user process exists).
pub fn init() -> Result<(), &'static str> {
    log::info!("initializing kernel heap ({} KiB)", HEAP_SIZE / 1024);
    unsafe {
        #[allow(static_mut_refs)]
        ALLOCATOR.lock().init(HEAP_ARENA.as_mut_ptr(), HEAP_SIZE);
    }
    Ok(())
}

#[alloc_error_handler]
fn alloc_error(layout: core::alloc::Layout) -> ! {
    panic!("kernel heap allocation failed: {:?}", layout);
}
