/*
 * Process Lifecycle Tests
 *
 * `process::exit` never returns — it hands off to `sched_stub::thread_exit`,
 * which spins in place of a real context switch. Without a second thread to
 * run it on, driving a child through a full exit+waitpid rendezvous would
 * hang the boot-time suite itself, so these tests stop at fork: independent
 * address spaces, shared FD tables, and wait_pid's rejection paths.
 */

use super::{check, TestResult};
use crate::io::fd::OpenFileDescription;
use crate::memory::tlb::FaultKind;
use crate::process::{self, decode_exit_status, encode_exit_status};
use alloc::sync::Arc;

pub fn run() -> TestResult {
    let mut result = TestResult::new("process");

    check(&mut result, "exit status encodes in the high byte, decodes back", decode_exit_status(encode_exit_status(42)) == 42);

    let root_pid = crate::process::sched_stub::current_pid().expect("root process is current at boot");

    let write_addr = 0x0050_0000u32;
    process::with_process(root_pid, |p| {
        p.address_space.define_region(write_addr, crate::config::PAGE_SIZE as u32, true, true, false);
        crate::memory::tlb::vm_fault(&mut p.address_space, FaultKind::Write, write_addr).expect("region is writable");
    })
    .expect("root process exists");

    let scratch_device = crate::vfs::open(vfs_scratch_path(), true).expect("create scratch file");
    let scratch_fd = process::with_process(root_pid, |p| p.fd_table.install(Arc::new(OpenFileDescription::new(scratch_device, 0))))
        .expect("root process exists")
        .expect("room in the fd table");

    let child_pid = process::fork(root_pid).expect("fork succeeds with room in the process table");
    check(&mut result, "fork returns a pid distinct from the parent", child_pid != root_pid);

    let child_has_parent = process::with_process(child_pid, |p| p.parent_pid == root_pid as i64).expect("child exists");
    check(&mut result, "the child's parent_pid names the forking process", child_has_parent);

    let (parent_byte, child_byte) = (
        process::with_process(root_pid, |p| read_byte(p, write_addr)).expect("parent exists"),
        process::with_process(child_pid, |p| read_byte(p, write_addr)).expect("child exists"),
    );
    check(&mut result, "a forked child's writable page starts with the parent's contents", parent_byte == child_byte);

    process::with_process(child_pid, |p| write_byte(p, write_addr, parent_byte.wrapping_add(1))).expect("child exists");
    let parent_byte_after = process::with_process(root_pid, |p| read_byte(p, write_addr)).expect("parent exists");
    check(&mut result, "a child's write to its copy does not reach the parent's frame", parent_byte_after == parent_byte);

    let child_shares_fd = process::with_process(child_pid, |p| p.fd_table.get(scratch_fd).is_ok()).expect("child exists");
    check(&mut result, "a forked child's fd table has the parent's open slots", child_shares_fd);

    let not_a_child = process::wait_pid(child_pid, root_pid, 0);
    check(&mut result, "waitpid on a process that is not your child fails", not_a_child.is_err());

    let no_such = process::wait_pid(root_pid, 9999, 0);
    check(&mut result, "waitpid on a nonexistent pid fails", no_such.is_err());

    result
}

fn vfs_scratch_path() -> &'static str {
    "test:process_scratch"
}

fn read_byte(p: &mut process::Process, vaddr: u32) -> u8 {
    crate::memory::tlb::vm_fault(&mut p.address_space, FaultKind::Read, vaddr).expect("page already bound");
    let page = crate::memory::types::VirtAddr::new(vaddr).page_base();
    let phys = p.address_space.page_directory.find_pte(page).expect("bound above").pbase();
    let ptr = crate::memory::directmap::phys_to_virt(phys).as_u32() as *const u8;
    unsafe { *ptr }
}

fn write_byte(p: &mut process::Process, vaddr: u32, value: u8) {
    crate::memory::tlb::vm_fault(&mut p.address_space, FaultKind::Write, vaddr).expect("page already bound");
    let page = crate::memory::types::VirtAddr::new(vaddr).page_base();
    let phys = p.address_space.page_directory.find_pte(page).expect("bound above").pbase();
    let ptr = crate::memory::directmap::phys_to_virt(phys).as_u32() as *mut u8;
    unsafe {
        *ptr = value;
    }
}
