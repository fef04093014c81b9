/*
 * Kernel Direct Map
 *
 * On this MIPS-class target, physical memory below 512 MiB is reachable
 * through the fixed, unmapped `kseg0` window: virtual = physical +
 * KSEG0_BASE. The kernel uses this window to touch frames directly
 * (coremap bootstrap, zeroing user frames, copying frame contents during
 * `as_copy`) without needing a page-table walk of its own.
 */

use crate::memory::types::{PhysAddr, VirtAddr};

const KSEG0_BASE: u32 = 0x8000_0000;

pub fn phys_to_virt(phys: PhysAddr) -> VirtAddr {
    VirtAddr::new(phys.as_u32().wrapping_add(KSEG0_BASE))
}

pub fn virt_to_phys(virt: VirtAddr) -> Option<PhysAddr> {
    let v = virt.as_u32();
    if v >= KSEG0_BASE {
        Some(PhysAddr::new(v - KSEG0_BASE))
    } else {
        None
    }
}

/// Zeroes one page-sized frame through the direct map.
///
/// # Safety
/// `phys` must be a page-aligned physical address the caller exclusively
/// owns (e.g. a frame the coremap just transitioned out of FREE).
pub unsafe fn zero_frame(phys: PhysAddr) {
    let vaddr = phys_to_virt(phys).as_u32() as *mut u8;
    unsafe {
        core::ptr::write_bytes(vaddr, 0, crate::config::PAGE_SIZE);
    }
}

/// Copies one page-sized frame's contents from `src` to `dst` through the
/// direct map.
///
/// # Safety
/// Both addresses must be page-aligned physical frames the caller
/// exclusively owns for the duration of the copy.
pub unsafe fn copy_frame(dst: PhysAddr, src: PhysAddr) {
    let dst_ptr = phys_to_virt(dst).as_u32() as *mut u8;
    let src_ptr = phys_to_virt(src).as_u32() as *const u8;
    unsafe {
        core::ptr::copy_nonoverlapping(src_ptr, dst_ptr, crate::config::PAGE_SIZE);
    }
}
