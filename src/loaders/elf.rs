/*
 * ELF32 Binary Loader
 *
 * Parses an ELF32/MIPS executable and lays it into a freshly created
 * address space: one `define_region` per `PT_LOAD` program header, then
 * `prepare_load` (grant rwx so file bytes can be written into what will
 * become a read-only text segment), a direct-map byte copy of each
 * segment's file contents (BSS past `p_filesz` is already zero — the
 * coremap zeroes every USER frame it hands out), then `complete_load`
 * to stamp real permissions.
 */

use crate::config::PAGE_SIZE;
use crate::error::{KResult, KernelError};
use crate::memory::directmap;
use crate::memory::types::VirtAddr;
use crate::memory::AddressSpace;
use alloc::vec::Vec;

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;
const ET_EXEC: u16 = 2;
const EM_MIPS: u16 = 8;

const PT_LOAD: u32 = 1;
const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Elf32Header {
    e_ident: [u8; 16],
    e_type: u16,
    e_machine: u16,
    e_version: u32,
    e_entry: u32,
    e_phoff: u32,
    e_shoff: u32,
    e_flags: u32,
    e_ehsize: u16,
    e_phentsize: u16,
    e_phnum: u16,
    e_shentsize: u16,
    e_shnum: u16,
    e_shstrndx: u16,
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Elf32ProgramHeader {
    p_type: u32,
    p_offset: u32,
    p_vaddr: u32,
    p_paddr: u32,
    p_filesz: u32,
    p_memsz: u32,
    p_flags: u32,
    p_align: u32,
}

fn parse_header(data: &[u8]) -> KResult<Elf32Header> {
    if data.len() < core::mem::size_of::<Elf32Header>() {
        return Err(KernelError::InvalidArgument);
    }
    let header: Elf32Header = unsafe { core::ptr::read_unaligned(data.as_ptr() as *const Elf32Header) };

    if header.e_ident[0..4] != ELF_MAGIC {
        log::error!("elf: bad magic {:?}", &header.e_ident[0..4]);
        return Err(KernelError::InvalidArgument);
    }
    if header.e_ident[4] != ELFCLASS32 {
        log::error!("elf: not 32-bit (class = {})", header.e_ident[4]);
        return Err(KernelError::InvalidArgument);
    }
    if header.e_ident[5] != ELFDATA2LSB {
        return Err(KernelError::InvalidArgument);
    }
    if header.e_ident[6] != EV_CURRENT {
        return Err(KernelError::InvalidArgument);
    }
    let e_type = unsafe { core::ptr::addr_of!(header.e_type).read_unaligned() };
    let e_machine = unsafe { core::ptr::addr_of!(header.e_machine).read_unaligned() };
    if e_type != ET_EXEC {
        return Err(KernelError::InvalidArgument);
    }
    if e_machine != EM_MIPS {
        return Err(KernelError::InvalidArgument);
    }
    Ok(header)
}

fn parse_program_headers(data: &[u8], header: &Elf32Header) -> KResult<Vec<Elf32ProgramHeader>> {
    let ph_offset = unsafe { core::ptr::addr_of!(header.e_phoff).read_unaligned() } as usize;
    let ph_size = unsafe { core::ptr::addr_of!(header.e_phentsize).read_unaligned() } as usize;
    let ph_count = unsafe { core::ptr::addr_of!(header.e_phnum).read_unaligned() } as usize;

    if ph_offset + ph_size * ph_count > data.len() {
        return Err(KernelError::InvalidArgument);
    }

    let mut headers = Vec::with_capacity(ph_count);
    for i in 0..ph_count {
        let offset = ph_offset + i * ph_size;
        let slice = &data[offset..offset + ph_size];
        let ph: Elf32ProgramHeader = unsafe { core::ptr::read_unaligned(slice.as_ptr() as *const Elf32ProgramHeader) };
        headers.push(ph);
    }
    Ok(headers)
}

fn elf_flags_to_perms(flags: u32) -> (bool, bool, bool) {
    (flags & PF_R != 0, flags & PF_W != 0, flags & PF_X != 0)
}

/// Copies `file_data[file_offset..file_offset+file_size)` into the
/// pages spanning `[vstart, vend)`, binding a frame for any page not
/// already valid. Bytes past `file_size` within the segment are BSS
/// and stay zero (every USER frame is zeroed by the coremap on alloc).
fn copy_segment_bytes(
    address_space: &mut AddressSpace,
    vstart: u32,
    vend: u32,
    data: &[u8],
    file_offset: u32,
    p_vaddr: u32,
    file_size: u32,
) -> KResult<()> {
    let file_start = p_vaddr;
    let file_end = p_vaddr + file_size;

    let mut page = vstart;
    while page < vend {
        let page_vaddr = VirtAddr::new(page);
        let already_valid = address_space
            .page_directory
            .find_pte(page_vaddr)
            .map(|pte| pte.is_valid())
            .unwrap_or(false);
        if !already_valid {
            address_space.page_directory.bind_frame(page_vaddr)?;
        }
        let pte = address_space
            .page_directory
            .find_pte(page_vaddr)
            .expect("just bound above");

        let page_end = page + PAGE_SIZE as u32;
        let overlap_start = core::cmp::max(page, file_start);
        let overlap_end = core::cmp::min(page_end, file_end);
        if overlap_start < overlap_end {
            let len = (overlap_end - overlap_start) as usize;
            let src_offset = (file_offset + (overlap_start - p_vaddr)) as usize;
            if src_offset + len > data.len() {
                return Err(KernelError::InvalidArgument);
            }
            let dst_base = directmap::phys_to_virt(pte.pbase()).as_u32() as *mut u8;
            let dst = unsafe { dst_base.add((overlap_start - page) as usize) };
            unsafe {
                core::ptr::copy_nonoverlapping(data[src_offset..src_offset + len].as_ptr(), dst, len);
            }
        }

        page += PAGE_SIZE as u32;
    }
    Ok(())
}

/// Loads `data` into `address_space` (fresh, with an empty page
/// directory and no segments) and returns the entry point. Defines
/// every `PT_LOAD` region first so the heap is pushed past the highest
/// one, then copies bytes, then locks down real permissions.
pub fn load_into(data: &[u8], address_space: &mut AddressSpace) -> KResult<u32> {
    let header = parse_header(data)?;
    let entry = unsafe { core::ptr::addr_of!(header.e_entry).read_unaligned() };
    let program_headers = parse_program_headers(data, &header)?;

    let loadable: Vec<&Elf32ProgramHeader> = program_headers
        .iter()
        .filter(|ph| unsafe { core::ptr::addr_of!(ph.p_type).read_unaligned() } == PT_LOAD)
        .collect();
    if loadable.is_empty() {
        return Err(KernelError::InvalidArgument);
    }

    for ph in &loadable {
        let p_vaddr = unsafe { core::ptr::addr_of!(ph.p_vaddr).read_unaligned() };
        let p_memsz = unsafe { core::ptr::addr_of!(ph.p_memsz).read_unaligned() };
        let p_flags = unsafe { core::ptr::addr_of!(ph.p_flags).read_unaligned() };
        let (read, write, execute) = elf_flags_to_perms(p_flags);
        address_space.define_region(p_vaddr, p_memsz, read, write, execute);
    }

    address_space.prepare_load()?;

    for (segment, ph) in address_space.segments.clone().iter().zip(loadable.iter()) {
        let p_vaddr = unsafe { core::ptr::addr_of!(ph.p_vaddr).read_unaligned() };
        let p_offset = unsafe { core::ptr::addr_of!(ph.p_offset).read_unaligned() };
        let p_filesz = unsafe { core::ptr::addr_of!(ph.p_filesz).read_unaligned() };
        if p_offset as usize + p_filesz as usize > data.len() {
            return Err(KernelError::InvalidArgument);
        }
        copy_segment_bytes(address_space, segment.vstart, segment.vend, data, p_offset, p_vaddr, p_filesz)?;
    }

    address_space.complete_load()?;

    log::info!("elf: loaded {} segment(s), entry = {:#x}", loadable.len(), entry);
    Ok(entry)
}
