/*
 * Memory Management
 *
 * Ties together the physical frame allocator (coremap), the kernel
 * direct map, the per-process two-level page table, the TLB-refill
 * fault handler, and the address-space record each process owns one
 * of. The boot-time RAM size query (however firmware reports it on the
 * target board) is an external collaborator: `init` takes the already-
 * resolved free-physical-memory bounds rather than parsing a boot
 * protocol itself.
 */

pub mod address_space;
pub mod coremap;
pub mod directmap;
pub mod heap;
pub mod pagetable;
pub mod tlb;
pub mod types;
pub mod uaccess;

pub use address_space::AddressSpace;
pub use types::{PageFlags, PhysAddr, VirtAddr};

/// Brings up the coremap over `[first_free, last)` and the kernel heap.
/// Must run before any allocation (`alloc_kpages`, `AddressSpace::create`,
/// `vec!`/`Box::new` in `alloc`) is attempted.
pub fn init(first_free: PhysAddr, last: PhysAddr) {
    log::info!(
        "initializing coremap over [{:#x}, {:#x})",
        first_free.as_u32(),
        last.as_u32()
    );
    coremap::init(first_free, last);

    heap::init().expect("failed to initialize kernel heap");

    log::info!(
        "physical memory: {} frames free of {}",
        coremap::free_frame_count(),
        coremap::total_frame_count()
    );
}
