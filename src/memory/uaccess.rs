/*
 * User-Memory Access
 *
 * Copies bytes between a user virtual range and a kernel buffer, one page
 * at a time, reusing the same fault-and-bind path the TLB-refill handler
 * takes on a real hardware miss. There is no trap context to resume here;
 * the syscall dispatcher calls this directly before touching user memory.
 */

use crate::error::{KResult, KernelError};
use crate::memory::address_space::AddressSpace;
use crate::memory::directmap::phys_to_virt;
use crate::memory::tlb::{self, FaultKind};
use crate::memory::types::VirtAddr;
use alloc::string::String;
use alloc::vec::Vec;

fn page_ptr(addr_space: &mut AddressSpace, vaddr: VirtAddr, kind: FaultKind) -> KResult<*mut u8> {
    tlb::vm_fault(addr_space, kind, vaddr.as_u32())?;
    let page = vaddr.page_base();
    let pte = addr_space
        .page_directory
        .find_pte(page)
        .expect("vm_fault binds the page it validates");
    let phys = pte.pbase();
    let base = phys_to_virt(phys).as_u32() as *mut u8;
    Ok(unsafe { base.add(vaddr.page_offset() as usize) })
}

/// Copies `len` bytes starting at `uaddr` in `addr_space` into a freshly
/// allocated kernel `Vec`.
pub fn copyin(addr_space: &mut AddressSpace, uaddr: u32, len: usize) -> KResult<Vec<u8>> {
    let mut out = Vec::with_capacity(len);
    let mut remaining = len;
    let mut cursor = uaddr;
    while remaining > 0 {
        let vaddr = VirtAddr::new(cursor);
        let ptr = page_ptr(addr_space, vaddr, FaultKind::Read)?;
        let in_page = (crate::config::PAGE_SIZE - vaddr.page_offset() as usize).min(remaining);
        let slice = unsafe { core::slice::from_raw_parts(ptr, in_page) };
        out.extend_from_slice(slice);
        cursor += in_page as u32;
        remaining -= in_page;
    }
    Ok(out)
}

/// Copies `data` into user memory starting at `uaddr`.
pub fn copyout(addr_space: &mut AddressSpace, uaddr: u32, data: &[u8]) -> KResult<()> {
    let mut remaining = data.len();
    let mut cursor = uaddr;
    let mut offset = 0usize;
    while remaining > 0 {
        let vaddr = VirtAddr::new(cursor);
        let ptr = page_ptr(addr_space, vaddr, FaultKind::Write)?;
        let in_page = (crate::config::PAGE_SIZE - vaddr.page_offset() as usize).min(remaining);
        let slice = unsafe { core::slice::from_raw_parts_mut(ptr, in_page) };
        slice.copy_from_slice(&data[offset..offset + in_page]);
        cursor += in_page as u32;
        offset += in_page;
        remaining -= in_page;
    }
    Ok(())
}

/// Copies a NUL-terminated string out of user memory, up to `max_len`
/// bytes (not counting the terminator). `BadFault` if no NUL is found
/// within that bound.
pub fn copyin_string(addr_space: &mut AddressSpace, uaddr: u32, max_len: usize) -> KResult<String> {
    let mut bytes = Vec::new();
    let mut cursor = uaddr;
    while bytes.len() < max_len {
        let vaddr = VirtAddr::new(cursor);
        let ptr = page_ptr(addr_space, vaddr, FaultKind::Read)?;
        let in_page = crate::config::PAGE_SIZE - vaddr.page_offset() as usize;
        let slice = unsafe { core::slice::from_raw_parts(ptr, in_page) };
        for &byte in slice {
            if byte == 0 {
                return String::from_utf8(bytes).map_err(|_| KernelError::BadFault);
            }
            bytes.push(byte);
            if bytes.len() >= max_len {
                break;
            }
        }
        cursor += in_page as u32;
    }
    Err(KernelError::BadFault)
}
