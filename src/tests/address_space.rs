/*
 * Address Space / Fault Path Tests
 *
 * Drives `vm_fault` directly against a fresh address space the way a
 * real TLB miss would, then checks the resulting PTE state and the
 * coremap accounting around copy-on-fork and `sbrk`.
 */

use super::{check, TestResult};
use crate::memory::address_space::AddressSpace;
use crate::memory::coremap;
use crate::memory::tlb::{self, FaultKind};
use crate::memory::types::VirtAddr;
use crate::config::{PAGE_SIZE, USERSTACK};

const TEST_FRAMES: usize = 256;

pub fn run() -> TestResult {
    let mut result = TestResult::new("address_space");
    coremap::reset_for_test(TEST_FRAMES);

    let mut space = AddressSpace::create();
    space.define_region(0x0040_0000, PAGE_SIZE as u32, true, true, true);

    let stack_addr = USERSTACK - 8;
    let before = coremap::free_frame_count();
    let fault = tlb::vm_fault(&mut space, FaultKind::Read, stack_addr);
    check(&mut result, "fault on a fresh stack address succeeds", fault.is_ok());
    check(&mut result, "faulting the stack consumes exactly one frame", coremap::free_frame_count() == before - 1);

    let page = VirtAddr::new(stack_addr).page_base();
    let pte = space.page_directory.find_pte(page);
    check(&mut result, "the faulted page has a valid PTE", pte.is_some_and(|p| p.is_valid()));
    check(&mut result, "the faulted PTE's frame is non-null", pte.is_some_and(|p| !p.pbase().is_null()));

    let bad_fault = tlb::vm_fault(&mut space, FaultKind::Read, 0x1234_5678);
    check(&mut result, "a fault outside every segment/heap/stack range is rejected", bad_fault.is_err());

    let region_addr = 0x0040_0010u32;
    tlb::vm_fault(&mut space, FaultKind::Write, region_addr).expect("region is writable");
    let region_page = VirtAddr::new(region_addr).page_base();
    let before_write = {
        let phys = space.page_directory.find_pte(region_page).expect("just bound").pbase();
        crate::memory::directmap::phys_to_virt(phys).as_u32() as *mut u8
    };
    unsafe {
        *before_write = 0x42;
    }

    let copy_before_free = coremap::free_frame_count();
    let copied = space.copy().expect("copy succeeds while frames remain");
    check(&mut result, "copying an address space doubles the frame count it holds", coremap::free_frame_count() == copy_before_free - 2);

    let copied_pte = copied.page_directory.find_pte(region_page).expect("copied PTE exists");
    let copied_phys = copied_pte.pbase();
    let copied_ptr = crate::memory::directmap::phys_to_virt(copied_phys).as_u32() as *const u8;
    let byte = unsafe { *copied_ptr };
    check(&mut result, "the copy's frame is byte-identical to the parent's", byte == 0x42);
    check(&mut result, "the copy's frame is a distinct physical address", copied_phys != space.page_directory.find_pte(region_page).expect("still there").pbase());

    drop(copied);
    check(&mut result, "dropping the copy releases its frames", coremap::free_frame_count() == copy_before_free);

    space.define_region(0x0060_0000, PAGE_SIZE as u32, true, true, false);
    let heap_start = space.sbrk(0).expect("heap exists after define_region");
    space.sbrk(8192).expect("growing the heap succeeds");
    let grown = space.sbrk(0).expect("heap end still queryable");
    check(&mut result, "sbrk(n) advances the heap end by n, page-rounded", grown == heap_start + 8192);

    tlb::vm_fault(&mut space, FaultKind::Write, heap_start).expect("heap page faults in");
    let before_shrink = coremap::free_frame_count();
    space.sbrk(-8192).expect("shrinking the heap succeeds");
    check(&mut result, "shrinking the heap frees the page it had faulted in", coremap::free_frame_count() == before_shrink + 1);
    let back = space.sbrk(0).expect("heap end still queryable");
    check(&mut result, "sbrk(n); sbrk(-n) restores the original heap end", back == heap_start);

    coremap::reset_for_test(TEST_FRAMES);
    result
}
