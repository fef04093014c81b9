/*
 * Address Space
 *
 * Owns exactly one page directory, one ordered segment list, and one heap
 * record for a single process. The stack region is implicit: it is never
 * represented as data, only as a range the fault handler's validation
 * ladder recognizes.
 */

use crate::config::{HEAP_GAP, PAGE_SIZE, STACKPAGES, USERSTACK};
use crate::error::{KResult, KernelError};
use crate::memory::pagetable::{Direction, PageDirectory};
use crate::memory::tlb;
use crate::memory::types::VirtAddr;
use alloc::vec::Vec;

/// An ordered region describing a contiguous virtual range loaded from the
/// program image.
#[derive(Copy, Clone, Debug)]
pub struct Segment {
    pub vstart: u32,
    pub vend: u32,
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Segment {
    pub fn npages(&self) -> u32 {
        (self.vend - self.vstart) / PAGE_SIZE as u32
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.vstart && addr < self.vend
    }
}

/// `vstart` is fixed at load time; `vend` grows and shrinks via `sbrk`.
/// Always read+write, never executable.
#[derive(Copy, Clone, Debug)]
pub struct HeapRegion {
    pub vstart: u32,
    pub vend: u32,
}

impl HeapRegion {
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.vstart && addr < self.vend
    }
}

/// Fault classification produced by the validation ladder that decides
/// whether a faulting address belongs to a segment, the heap, or the
/// stack, and what permissions and growth direction apply.
#[derive(Copy, Clone, Debug)]
pub struct FaultRegion {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    pub direction: Direction,
}

pub struct AddressSpace {
    pub page_directory: PageDirectory,
    pub segments: Vec<Segment>,
    pub heap: Option<HeapRegion>,
}

impl AddressSpace {
    /// Allocates an address-space record with an empty page directory, no
    /// segments, and no heap.
    pub fn create() -> Self {
        Self {
            page_directory: PageDirectory::new(),
            segments: Vec::new(),
            heap: None,
        }
    }

    /// Called by the ELF loader for each program header. Aligns `vaddr`
    /// down and `memsize` up to page granularity, appends a new segment,
    /// and establishes (or pushes down) the heap so that
    /// `heap.vstart >= max(segment.vend) + HEAP_GAP` always holds
    /// afterward.
    pub fn define_region(&mut self, vaddr: u32, memsize: u32, read: bool, write: bool, execute: bool) {
        let vstart = vaddr & crate::config::PAGE_FRAME_MASK;
        let span = (vaddr - vstart) + memsize;
        let npages = span.div_ceil(PAGE_SIZE as u32);
        let vend = vstart + npages * PAGE_SIZE as u32;

        self.segments.push(Segment {
            vstart,
            vend,
            read,
            write,
            execute,
        });

        let candidate = vend + HEAP_GAP;
        match &mut self.heap {
            None => {
                self.heap = Some(HeapRegion {
                    vstart: candidate,
                    vend: candidate,
                });
            }
            Some(heap) => {
                if vend >= heap.vstart {
                    heap.vstart = candidate;
                    heap.vend = candidate;
                }
            }
        }
    }

    /// Pre-reserves PTEs for every segment with read+write+execute all
    /// granted, so the loader may write initialized bytes into what will
    /// become a read-only mapping.
    pub fn prepare_load(&mut self) -> KResult<()> {
        for segment in &self.segments {
            self.page_directory.alloc_segment_pte(
                VirtAddr::new(segment.vstart),
                segment.npages(),
                Direction::Up,
                true,
                true,
                true,
            )?;
        }
        Ok(())
    }

    /// Re-stamps each segment's PTEs with its true, permanent permissions.
    pub fn complete_load(&mut self) -> KResult<()> {
        for segment in &self.segments {
            self.page_directory.alloc_segment_pte(
                VirtAddr::new(segment.vstart),
                segment.npages(),
                Direction::Up,
                segment.read,
                segment.write,
                segment.execute,
            )?;
        }
        Ok(())
    }

    /// Returns `USERSTACK`; no PTEs are pre-reserved, the stack grows
    /// lazily through the fault path.
    pub fn define_stack(&self) -> u32 {
        USERSTACK
    }

    /// Classifies a faulting address by walking segments, then the heap,
    /// then the implicit stack range, in that order. Does not allocate or
    /// touch the TLB.
    pub fn classify_fault(&self, addr: u32) -> Option<FaultRegion> {
        for segment in &self.segments {
            if segment.contains(addr) {
                return Some(FaultRegion {
                    read: segment.read,
                    write: segment.write,
                    execute: segment.execute,
                    direction: Direction::Up,
                });
            }
        }
        if let Some(heap) = &self.heap {
            if heap.contains(addr) {
                return Some(FaultRegion {
                    read: true,
                    write: true,
                    execute: true,
                    direction: Direction::Up,
                });
            }
        }
        let stack_start = USERSTACK - STACKPAGES * PAGE_SIZE as u32;
        if addr >= stack_start && addr < USERSTACK {
            return Some(FaultRegion {
                read: true,
                write: true,
                execute: true,
                direction: Direction::Down,
            });
        }
        None
    }

    /// Deep-copies the segment list and heap record, then walks every
    /// existing PTE: valid PTEs get a fresh frame with byte-identical
    /// contents, lazy PTEs get their reservation copied without a frame
    /// allocation.
    pub fn copy(&self) -> KResult<Self> {
        let mut new_as = Self {
            page_directory: PageDirectory::new(),
            segments: self.segments.clone(),
            heap: self.heap,
        };
        self.page_directory.copy_into(&mut new_as.page_directory)?;
        Ok(new_as)
    }

    /// `delta == 0` returns the current heap end without modification.
    /// Shrinking frees every valid page between the new and old `vend`,
    /// invalidating any matching TLB entry.
    pub fn sbrk(&mut self, delta: i32) -> KResult<u32> {
        let heap = self.heap.as_mut().ok_or(KernelError::InvalidArgument)?;

        if delta == 0 {
            return Ok(heap.vend);
        }

        let new_vend = ((heap.vend as i64 + delta as i64) as u32) & crate::config::PAGE_FRAME_MASK;

        if new_vend < heap.vstart {
            return Err(KernelError::InvalidArgument);
        }
        let stack_limit = USERSTACK - STACKPAGES * PAGE_SIZE as u32;
        if new_vend >= stack_limit || new_vend > crate::config::USERSPACETOP {
            return Err(KernelError::OutOfMemory);
        }

        let old_vend = heap.vend;

        if new_vend < old_vend {
            let mut addr = new_vend;
            while addr < old_vend {
                let vaddr = VirtAddr::new(addr);
                if let Some(pte) = self.page_directory.find_pte(vaddr) {
                    if pte.is_valid() {
                        self.page_directory.free_pte(vaddr);
                        tlb::invalidate_entry(vaddr);
                    }
                }
                addr += PAGE_SIZE as u32;
            }
        }

        self.heap.as_mut().expect("heap checked above").vend = new_vend;
        Ok(old_vend)
    }

    /// Called on context switch into this address space: flushes every
    /// stale TLB entry from whatever ran before.
    pub fn activate(&self) {
        tlb::shootdown_all();
    }
}
