/*
 * File Descriptor Table Tests
 *
 * Exercises the fixed-capacity slot table against the `Device` trait's
 * console and in-memory-file implementations: install/close slot
 * reuse, dup2 sharing, fork refcounting, and destroy_all.
 */

use super::{check, TestResult};
use crate::io::fd::{FdTable, OpenFileDescription};
use crate::vfs;
use alloc::sync::Arc;

pub fn run() -> TestResult {
    let mut result = TestResult::new("fd");

    let console = vfs::open(vfs::CONSOLE_PATH, false).expect("console always resolves");
    let mut table = FdTable::with_console(console);

    check(&mut result, "slots 0/1/2 are pre-populated", table.get(0).is_ok() && table.get(1).is_ok() && table.get(2).is_ok());

    vfs::install_file("test:fd_scratch", alloc::vec::Vec::new());
    let device = vfs::open("test:fd_scratch", false).expect("just installed");
    let ofd = Arc::new(OpenFileDescription::new(device, 0));
    let fd = table.install(ofd.clone()).expect("room for a new slot");
    check(&mut result, "install scans from slot 3", fd >= 3);

    let fetched = table.get(fd).expect("just installed");
    check(&mut result, "get returns the installed description", Arc::ptr_eq(&fetched, &ofd));

    table.close(fd).expect("fd is open");
    check(&mut result, "a closed fd is no longer gettable", table.get(fd).is_err());

    let fd_a = table.install(ofd.clone()).expect("room for a new slot");
    let fd_b = fd_a + 1;
    table.dup2(fd_a, fd_b).expect("dup2 succeeds");
    let a = table.get(fd_a).expect("still open");
    let b = table.get(fd_b).expect("dup2 installed it");
    check(&mut result, "dup2 makes both fds share one description", Arc::ptr_eq(&a, &b));
    check(&mut result, "a shared description advances one cursor for both fds", {
        a.advance(10);
        b.offset() == 10
    });

    let strong_before = Arc::strong_count(&ofd);
    let forked = table.fork();
    check(&mut result, "fork shares descriptions rather than duplicating them", Arc::strong_count(&ofd) == strong_before + 1);
    drop(forked);
    check(&mut result, "dropping a forked table releases its references", Arc::strong_count(&ofd) == strong_before);

    table.destroy_all();
    check(&mut result, "destroy_all empties every slot", table.get(0).is_err() && table.get(fd_a).is_err());

    result
}
