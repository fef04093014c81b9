/*
 * TLB-refill Fault Handler
 *
 * Consults the current address space's page table on a TLB miss: lazily
 * allocates a frame if needed, then writes a round-robin TLB entry. The
 * coremap and TLB spinlocks are each held only briefly and never across a
 * sleep — this path must never block.
 */

use crate::config::NUM_TLB;
use crate::error::{KResult, KernelError};
use crate::memory::address_space::AddressSpace;
use crate::memory::types::VirtAddr;
use spin::Mutex;

/// Kind of fault reported by the trap path.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultKind {
    Read,
    /// A write attempted against a page mapped read-only.
    ReadOnly,
    Write,
}

#[derive(Copy, Clone, Debug)]
struct TlbEntry {
    vpage: u32,
    pbase: u32,
    dirty: bool,
}

struct Tlb {
    slots: [Option<TlbEntry>; NUM_TLB],
    next_index: usize,
}

impl Tlb {
    const fn new() -> Self {
        Self {
            slots: [None; NUM_TLB],
            next_index: 0,
        }
    }

    /// Round-robin write: no search for an empty slot first, matching the
    /// source hardware's actual behavior (its empty-slot-seeking loop is
    /// dead code never reached in practice).
    fn write(&mut self, vpage: u32, pbase: u32, dirty: bool) {
        self.slots[self.next_index] = Some(TlbEntry { vpage, pbase, dirty });
        self.next_index = (self.next_index + 1) % NUM_TLB;
    }

    fn invalidate(&mut self, vpage: u32) {
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(entry) if entry.vpage == vpage) {
                *slot = None;
            }
        }
    }

    fn invalidate_all(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}

static TLB: Mutex<Tlb> = Mutex::new(Tlb::new());

/// Invalidates every TLB slot. Invoked at address-space activation; a
/// per-entry shootdown across CPUs is a no-op placeholder in the current
/// design.
pub fn shootdown_all() {
    crate::arch::without_interrupts(|| {
        TLB.lock().invalidate_all();
    });
}

/// Invalidates the TLB entry for `vaddr`'s page, if present. Used by
/// `sbrk` when shrinking the heap releases a page that might still be
/// cached.
pub fn invalidate_entry(vaddr: VirtAddr) {
    crate::arch::without_interrupts(|| {
        TLB.lock().invalidate(vaddr.page_base().as_u32());
    });
}

/// Entry point for the TLB-refill trap. Masks `fault_addr` to its page
/// boundary, walks the validation ladder against `addr_space`, lazily
/// allocates a frame on miss, checks permissions for `kind`, and writes
/// the TLB.
pub fn vm_fault(addr_space: &mut AddressSpace, kind: FaultKind, fault_addr: u32) -> KResult<()> {
    let page = VirtAddr::new(fault_addr).page_base();

    let region = addr_space
        .classify_fault(page.as_u32())
        .ok_or(KernelError::BadFault)?;

    if addr_space.page_directory.find_pte(page).is_none() {
        let npages = 1;
        addr_space.page_directory.alloc_segment_pte(
            page,
            npages,
            region.direction,
            region.read,
            region.write,
            region.execute,
        )?;
    }

    if !addr_space
        .page_directory
        .find_pte(page)
        .expect("just reserved above")
        .is_valid()
    {
        addr_space.page_directory.bind_frame(page)?;
    }

    let pte = addr_space
        .page_directory
        .find_pte(page)
        .expect("bound above");

    match kind {
        FaultKind::Read => {
            if !pte.readable() {
                return Err(KernelError::BadFault);
            }
        }
        FaultKind::ReadOnly => {
            return Err(KernelError::BadFault);
        }
        FaultKind::Write => {
            if !pte.writable() {
                return Err(KernelError::BadFault);
            }
        }
    }

    let dirty = pte.writable();
    let pbase = pte.pbase().as_u32();

    crate::arch::without_interrupts(|| {
        TLB.lock().write(page.as_u32(), pbase, dirty);
    });

    Ok(())
}
