/*
 * Kernel Entry Point
 *
 * `_start` is the first Rust code to run, reached after the board's own
 * bootstrap (reset vector, cache init, stack setup) hands off — that
 * earlier stage is external to this crate. From here: bring up logging,
 * then physical memory, spawn the root process, install its program
 * image, run the boot-time test suite, and idle.
 */

#![no_std]
#![no_main]
#![feature(alloc_error_handler)]
#![allow(dead_code)]

extern crate alloc;

use core::panic::PanicInfo;

mod arch;
mod config;
mod error;
mod io;
mod loaders;
mod memory;
mod process;
mod syscall;
mod tests;
mod utils;
mod vfs;

/// Physical memory bounds handed off by the bootstrap stage. A real
/// board would read these from firmware-provided RAM size information;
/// this target's bootstrap is external to the crate, so the bounds are
/// fixed constants standing in for that query.
const PHYS_MEM_START: u32 = 0x0000_1000;
const PHYS_MEM_END: u32 = 0x0080_0000;

#[unsafe(no_mangle)]
pub extern "C" fn _start() -> ! {
    utils::logger::init(true);
    log::info!("kernel starting");

    memory::init(
        memory::PhysAddr::new(PHYS_MEM_START),
        memory::PhysAddr::new(PHYS_MEM_END),
    );

    let console: alloc::sync::Arc<dyn io::Device> = vfs::open(vfs::CONSOLE_PATH, false)
        .expect("console device always resolves");

    let address_space = memory::AddressSpace::create();
    let root_pid = process::spawn_root("init", address_space, console)
        .expect("process table has room for the first process");
    process::sched_stub::set_current(Some(root_pid));
    log::info!("root process spawned, pid = {}", root_pid);

    tests::run_all();

    log::info!("kernel idle");
    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    if let Some(location) = info.location() {
        log::error!("PANIC at {}:{}: {}", location.file(), location.line(), info.message());
    } else {
        log::error!("PANIC: {}", info.message());
    }

    loop {
        core::hint::spin_loop();
    }
}
