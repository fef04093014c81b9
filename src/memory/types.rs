/*
 * Memory Types
 *
 * Core address and permission types used throughout the memory subsystem.
 * Unlike the x86_64 lineage this is descended from, there is no hardware
 * crate to re-export addresses from, so PhysAddr/VirtAddr are owned here.
 */

use bitflags::bitflags;

/// A physical address. Opaque `u32`: this is a 32-bit MIPS-class machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default)]
pub struct PhysAddr(pub u32);

impl PhysAddr {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A virtual address.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default)]
pub struct VirtAddr(pub u32);

impl VirtAddr {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Rounds down to the start of the containing page.
    pub const fn page_base(self) -> Self {
        Self(self.0 & crate::config::PAGE_FRAME_MASK)
    }

    /// Intra-page byte offset (bottom 12 bits).
    pub const fn page_offset(self) -> u32 {
        self.0 & (crate::config::PAGE_SIZE as u32 - 1)
    }

    /// Top ten bits: page-directory index.
    pub const fn dir_index(self) -> usize {
        ((self.0 >> 22) & 0x3ff) as usize
    }

    /// Next ten bits: page-table index.
    pub const fn table_index(self) -> usize {
        ((self.0 >> 12) & 0x3ff) as usize
    }

    pub const fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }
}

bitflags! {
    /// Permission bits carried by a PTE. `VALID` distinguishes a lazily
    /// reserved PTE (reservation known, frame not yet allocated) from a
    /// fully bound one.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
    pub struct PageFlags: u8 {
        const READ    = 0b0001;
        const WRITE   = 0b0010;
        const EXECUTE = 0b0100;
        const VALID   = 0b1000;
    }
}

impl PageFlags {
    pub const fn rwx(r: bool, w: bool, x: bool) -> Self {
        let mut bits = 0u8;
        if r {
            bits |= Self::READ.bits();
        }
        if w {
            bits |= Self::WRITE.bits();
        }
        if x {
            bits |= Self::EXECUTE.bits();
        }
        Self::from_bits_truncate(bits)
    }

    pub const fn readable(self) -> bool {
        self.contains(Self::READ)
    }

    pub const fn writable(self) -> bool {
        self.contains(Self::WRITE)
    }

    pub const fn executable(self) -> bool {
        self.contains(Self::EXECUTE)
    }

    pub const fn valid(self) -> bool {
        self.contains(Self::VALID)
    }
}
