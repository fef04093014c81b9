/*
 * Coremap: Physical Frame Allocator
 *
 * Owns every physical frame the kernel manages post-boot and serves
 * single-page and contiguous multi-page requests for kernel and user use.
 *
 * Bootstrap places the coremap array itself at the start of the free
 * physical range (reached through the kernel's direct-mapped window) and
 * rounds the controlled range past it, mirroring how the OS161 teaching
 * kernel this is modeled on lays its coremap out in `cm_bootstrap`.
 */

use crate::config::PAGE_SIZE;
use crate::memory::types::PhysAddr;
use spin::Mutex;

const MAX_FRAMES: usize = 262_144; // 1 GiB of RAM at 4 KiB/frame

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum FrameState {
    Free,
    /// Kernel-owned; never reclaimed implicitly.
    Fixed,
    /// User-owned, modified since load.
    Dirty,
    /// User-owned, unchanged since load. Reserved for future paging; this
    /// design never transitions a frame into this state itself.
    #[allow(dead_code)]
    Clean,
}

#[derive(Copy, Clone, Debug)]
struct CoremapEntry {
    state: FrameState,
    /// Run length, recorded only on the first frame of an allocation.
    run_length: u32,
}

impl CoremapEntry {
    const fn free() -> Self {
        Self {
            state: FrameState::Free,
            run_length: 0,
        }
    }
}

/// Kind of allocation requested, mirroring the OS161 `KERNEL`/`USER` tags.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AllocKind {
    Kernel,
    User,
}

struct Coremap {
    entries: [CoremapEntry; MAX_FRAMES],
    /// Physical frame index of the first frame this coremap controls.
    start_entry: usize,
    /// Number of frames this coremap controls.
    entry_count: usize,
    free_entries: usize,
}

impl Coremap {
    const fn new() -> Self {
        Self {
            entries: [CoremapEntry::free(); MAX_FRAMES],
            start_entry: 0,
            entry_count: 0,
            free_entries: 0,
        }
    }

    fn to_paddr(&self, index: usize) -> PhysAddr {
        PhysAddr::new(((self.start_entry + index) * PAGE_SIZE) as u32)
    }

    /// Returns `None` if the address does not map into this coremap's range.
    fn to_index(&self, addr: PhysAddr) -> Option<usize> {
        let frame = addr.as_u32() as usize / PAGE_SIZE;
        if frame < self.start_entry {
            return None;
        }
        let index = frame - self.start_entry;
        if index >= self.entry_count {
            return None;
        }
        Some(index)
    }

    /// Caller must hold the lock. Transitions a FREE entry to non-FREE,
    /// zeroing USER frames before they become observable.
    fn allocate_page(&mut self, index: usize, kind: AllocKind) {
        debug_assert!(matches!(self.entries[index].state, FrameState::Free));
        self.entries[index].state = match kind {
            AllocKind::Kernel => FrameState::Fixed,
            AllocKind::User => FrameState::Dirty,
        };
        self.free_entries -= 1;

        if kind == AllocKind::User {
            let paddr = self.to_paddr(index);
            unsafe {
                crate::memory::directmap::zero_frame(paddr);
            }
        }
    }

    /// Caller must hold the lock.
    fn free_page(&mut self, index: usize) {
        debug_assert!(!matches!(self.entries[index].state, FrameState::Free));
        self.entries[index] = CoremapEntry::free();
        self.free_entries += 1;
    }
}

static COREMAP: Mutex<Coremap> = Mutex::new(Coremap::new());

/// Bootstraps the coremap over `[first_free, last)` physical addresses,
/// reserving space for the coremap array's own backing storage at the
/// front of the range (the array lives in `.bss`/static storage here, so
/// no reservation is actually carved out of the controlled range itself —
/// unlike the C original, which places the array in the RAM it describes).
pub fn init(first_free: PhysAddr, last: PhysAddr) {
    let mut cm = COREMAP.lock();
    let start_entry = first_free.as_u32() as usize / PAGE_SIZE;
    let end_entry = last.as_u32() as usize / PAGE_SIZE;
    let entry_count = end_entry.saturating_sub(start_entry).min(MAX_FRAMES);

    cm.start_entry = start_entry;
    cm.entry_count = entry_count;
    cm.free_entries = entry_count;
    for entry in cm.entries[..entry_count].iter_mut() {
        *entry = CoremapEntry::free();
    }

    log::info!(
        "Coremap initialized: {} frames controlled, starting at frame {}",
        entry_count,
        start_entry
    );
}

/// Total bytes currently allocated (non-FREE frames × page size).
pub fn coremap_used_bytes() -> usize {
    let cm = COREMAP.lock();
    (cm.entry_count - cm.free_entries) * PAGE_SIZE
}

pub fn free_frame_count() -> usize {
    COREMAP.lock().free_entries
}

pub fn total_frame_count() -> usize {
    COREMAP.lock().entry_count
}

/// First-fit single-frame allocation. Returns the physical base address of
/// the chosen frame, or a null address on exhaustion.
pub fn single_page_alloc(kind: AllocKind) -> PhysAddr {
    let mut cm = COREMAP.lock();
    if cm.free_entries < 1 {
        return PhysAddr::new(0);
    }
    for index in 0..cm.entry_count {
        if matches!(cm.entries[index].state, FrameState::Free) {
            cm.allocate_page(index, kind);
            cm.entries[index].run_length = 1;
            return cm.to_paddr(index);
        }
    }
    PhysAddr::new(0)
}

/// First-fit contiguous-run allocation of exactly `n` frames. Returns the
/// physical base address of the run's first frame, or a null address if no
/// run of that length exists or `n == 0`.
pub fn multi_page_alloc(kind: AllocKind, n: usize) -> PhysAddr {
    if n == 0 {
        return PhysAddr::new(0);
    }
    if n == 1 {
        return single_page_alloc(kind);
    }

    let mut cm = COREMAP.lock();
    // Early short-circuit: a request for exactly `free_entries` pages still
    // fails, matching the source's strict `>` comparison.
    if cm.free_entries <= n {
        return PhysAddr::new(0);
    }

    let mut chunk_index = None;
    let mut chunk_size = 0usize;
    for index in 0..cm.entry_count {
        if matches!(cm.entries[index].state, FrameState::Free) {
            if chunk_size == 0 {
                chunk_index = Some(index);
            }
            chunk_size += 1;
            if chunk_size == n {
                break;
            }
        } else {
            chunk_index = None;
            chunk_size = 0;
        }
    }

    if chunk_size != n {
        return PhysAddr::new(0);
    }

    let first = chunk_index.expect("chunk_size == n implies chunk_index is set");
    for offset in 0..n {
        cm.allocate_page(first + offset, kind);
    }
    cm.entries[first].run_length = n as u32;
    cm.to_paddr(first)
}

/// Kernel-direct-mapped allocation of `n` physically contiguous FIXED
/// frames. Returns the kernel virtual address of the run, or 0 on
/// exhaustion (including a request for zero pages).
pub fn alloc_kpages(n: usize) -> u32 {
    let paddr = if n == 0 {
        return 0;
    } else if n == 1 {
        single_page_alloc(AllocKind::Kernel)
    } else {
        multi_page_alloc(AllocKind::Kernel, n)
    };

    if paddr.is_null() {
        return 0;
    }
    crate::memory::directmap::phys_to_virt(paddr).as_u32()
}

/// Frees the run previously returned by `alloc_kpages`. It is a fatal
/// error (kernel invariant violation) to free an address whose first-frame
/// run length is 0. An address that does not map into the coremap's range
/// is silently ignored — it was a boot-time transitional allocation.
pub fn free_kpages(vaddr: u32) {
    let paddr = crate::memory::directmap::virt_to_phys(crate::memory::types::VirtAddr::new(vaddr));
    let Some(paddr) = paddr else {
        return;
    };
    free_frames_at(paddr);
}

/// Shared by `free_kpages` and the user-frame release path: frees the run
/// whose first frame is at `paddr`.
pub fn free_frames_at(paddr: PhysAddr) {
    let mut cm = COREMAP.lock();
    let Some(index) = cm.to_index(paddr) else {
        return;
    };
    let run_length = cm.entries[index].run_length;
    assert!(run_length > 0, "free of a non-first-frame or already-free address");

    for offset in 0..run_length as usize {
        cm.free_page(index + offset);
    }
}

/// Re-bootstraps the coremap over a small frame count. Exposed for the
/// in-kernel test suite (`crate::tests`) only — production boot calls
/// `init` exactly once from `memory::init`.
#[doc(hidden)]
pub fn reset_for_test(frames: usize) {
    init(PhysAddr::new(0), PhysAddr::new((frames * PAGE_SIZE) as u32));
}
