/*
 * Two-level Software Page Table
 *
 * Per-address-space virtual-to-physical map. The directory has
 * `PAGE_TABLE_SIZE` slots (1024 on this 32-bit MIPS-class target); each
 * slot either is empty or owns a table of the same fanout, whose slots
 * each either are empty or own one PTE. Both levels are sparsely
 * populated: a null directory slot means no mapping exists under that
 * 4-MiB region.
 *
 * A PTE's `pbase` is a raw physical address, never an owning handle —
 * ownership of the frame lives in the coremap and is transferred to the
 * PTE logically by marking the coremap entry DIRTY.
 */

use crate::config::PAGE_TABLE_SIZE;
use crate::error::{KResult, KernelError};
use crate::memory::coremap::{self, AllocKind};
use crate::memory::types::{PageFlags, PhysAddr, VirtAddr};
use alloc::boxed::Box;

/// Direction a run of PTEs is reserved in: upward (segments, heap) or
/// downward (stack).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct PageTableEntry {
    pbase: u32,
    flags: PageFlags,
}

impl PageTableEntry {
    const fn empty() -> Self {
        Self {
            pbase: 0,
            flags: PageFlags::empty(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.flags.valid()
    }

    pub fn pbase(&self) -> PhysAddr {
        PhysAddr::new(self.pbase)
    }

    pub fn flags(&self) -> PageFlags {
        self.flags
    }

    pub fn readable(&self) -> bool {
        self.flags.readable()
    }

    pub fn writable(&self) -> bool {
        self.flags.writable()
    }

    pub fn executable(&self) -> bool {
        self.flags.executable()
    }
}

struct Table {
    entries: [Option<PageTableEntry>; PAGE_TABLE_SIZE],
}

impl Table {
    fn new() -> Box<Self> {
        Box::new(Self {
            entries: [None; PAGE_TABLE_SIZE],
        })
    }
}

pub struct PageDirectory {
    tables: [Option<Box<Table>>; PAGE_TABLE_SIZE],
}

impl PageDirectory {
    pub fn new() -> Self {
        // `Option<Box<Table>>` is not `Copy`; build via an explicit array
        // of `None` rather than deriving `Default` (which is not
        // implemented for arrays beyond length 32 on stable for non-Copy
        // element types in the general case).
        const NONE_TABLE: Option<Box<Table>> = None;
        Self {
            tables: [NONE_TABLE; PAGE_TABLE_SIZE],
        }
    }

    /// Pure lookup: `None` if either level is absent.
    pub fn find_pte(&self, vaddr: VirtAddr) -> Option<&PageTableEntry> {
        self.tables[vaddr.dir_index()]
            .as_ref()?
            .entries[vaddr.table_index()]
            .as_ref()
    }

    fn find_pte_mut(&mut self, vaddr: VirtAddr) -> Option<&mut PageTableEntry> {
        self.tables[vaddr.dir_index()]
            .as_mut()?
            .entries[vaddr.table_index()]
            .as_mut()
    }

    /// Reserves PTEs for a run of `npages` pages starting at `vaddr`,
    /// stepping by one page per iteration in `direction`. Creates missing
    /// table levels and PTEs as needed. Re-calling this for an existing
    /// PTE updates its permission bits in place without disturbing
    /// `valid`/`pbase` — this is how `complete_load` tightens permissions
    /// after the loader has written into a read-only segment.
    ///
    /// Any failure (table-level allocation exhaustion) returns
    /// out-of-memory; partial progress already made is not rolled back —
    /// callers destroying the address space sweep everything.
    pub fn alloc_segment_pte(
        &mut self,
        vaddr: VirtAddr,
        npages: u32,
        direction: Direction,
        read: bool,
        write: bool,
        execute: bool,
    ) -> KResult<()> {
        let step: i64 = match direction {
            Direction::Up => crate::config::PAGE_SIZE as i64,
            Direction::Down => -(crate::config::PAGE_SIZE as i64),
        };
        let mut current = vaddr.as_u32() as i64;

        for _ in 0..npages {
            let page = VirtAddr::new(current as u32);
            let dir_index = page.dir_index();

            if self.tables[dir_index].is_none() {
                self.tables[dir_index] = Some(Table::new());
            }
            let table = self.tables[dir_index]
                .as_mut()
                .ok_or(KernelError::OutOfMemory)?;

            let table_index = page.table_index();
            let entry = table.entries[table_index].get_or_insert(PageTableEntry::empty());
            entry.flags = PageFlags::rwx(read, write, execute) | (entry.flags & PageFlags::VALID);

            current += step;
        }
        Ok(())
    }

    /// If the PTE is valid, releases its frame back to the coremap and
    /// clears only this one PTE slot — unrelated PTEs in the same table
    /// are untouched.
    pub fn free_pte(&mut self, vaddr: VirtAddr) {
        let dir_index = vaddr.dir_index();
        let table_index = vaddr.table_index();
        let Some(table) = self.tables[dir_index].as_mut() else {
            return;
        };
        if let Some(pte) = table.entries[table_index].take() {
            if pte.is_valid() {
                debug_assert!(!pte.pbase().is_null());
                coremap::free_frames_at(pte.pbase());
            }
        }
    }

    /// Binds a USER frame to an existing, not-yet-valid PTE. Fails with
    /// out-of-memory if no PTE is reserved at `vaddr` or the coremap is
    /// exhausted.
    pub fn bind_frame(&mut self, vaddr: VirtAddr) -> KResult<()> {
        let paddr = coremap::single_page_alloc(AllocKind::User);
        if paddr.is_null() {
            return Err(KernelError::OutOfMemory);
        }
        let entry = self
            .find_pte_mut(vaddr)
            .ok_or(KernelError::OutOfMemory)?;
        entry.pbase = paddr.as_u32();
        entry.flags |= PageFlags::VALID;
        Ok(())
    }

    /// Deep-copies every valid PTE's frame contents into `dst`, and every
    /// lazy (reserved-but-not-valid) PTE's reservation, without allocating
    /// a frame for the latter.
    pub fn copy_into(&self, dst: &mut PageDirectory) -> KResult<()> {
        for dir_index in 0..PAGE_TABLE_SIZE {
            let Some(table) = &self.tables[dir_index] else {
                continue;
            };
            for table_index in 0..PAGE_TABLE_SIZE {
                let Some(pte) = &table.entries[table_index] else {
                    continue;
                };

                if dst.tables[dir_index].is_none() {
                    dst.tables[dir_index] = Some(Table::new());
                }
                let dst_table = dst.tables[dir_index]
                    .as_mut()
                    .expect("just inserted");

                if pte.is_valid() {
                    let new_frame = coremap::single_page_alloc(AllocKind::User);
                    if new_frame.is_null() {
                        return Err(KernelError::OutOfMemory);
                    }
                    unsafe {
                        crate::memory::directmap::copy_frame(new_frame, pte.pbase());
                    }
                    dst_table.entries[table_index] = Some(PageTableEntry {
                        pbase: new_frame.as_u32(),
                        flags: pte.flags,
                    });
                } else {
                    dst_table.entries[table_index] = Some(PageTableEntry {
                        pbase: 0,
                        flags: pte.flags,
                    });
                }
            }
        }
        Ok(())
    }

    /// Walks every table, every PTE, returning valid PTEs' frames to the
    /// coremap and dropping every table node.
    pub fn destroy(&mut self) {
        for dir_index in 0..PAGE_TABLE_SIZE {
            let Some(mut table) = self.tables[dir_index].take() else {
                continue;
            };
            for entry in table.entries.iter_mut() {
                if let Some(pte) = entry.take() {
                    if pte.is_valid() {
                        coremap::free_frames_at(pte.pbase());
                    }
                }
            }
        }
    }
}

impl Drop for PageDirectory {
    fn drop(&mut self) {
        self.destroy();
    }
}
