/*
 * Scheduler Stand-in
 *
 * The real thread scheduler (preemption, run queues, context switching)
 * is an external collaborator this core hands off to, not something it
 * implements. This module is the minimal seam the process table needs
 * from it: which PID is "current", a counting semaphore for the
 * wait/exit rendezvous, and a thread-exit entry point.
 */

use spin::Mutex;

static CURRENT_PID: Mutex<Option<u32>> = Mutex::new(None);

/// Records which process is about to run on this CPU. Called by the
/// scheduler (or, in single-threaded test contexts, directly) before
/// entering a process's code.
pub fn set_current(pid: Option<u32>) {
    *CURRENT_PID.lock() = pid;
}

/// The PID of the process currently executing, if any.
pub fn current_pid() -> Option<u32> {
    *CURRENT_PID.lock()
}

/// A counting semaphore: `n` callers can pass `p()` without blocking
/// before a `v()` is required. Used as each process's exit rendezvous —
/// initialized to zero, `v()`'d once by the exiting process, `p()`'d
/// once by each `waitpid` that consumes it.
pub struct Semaphore {
    count: Mutex<u32>,
}

impl Semaphore {
    pub const fn new(initial: u32) -> Self {
        Self {
            count: Mutex::new(initial),
        }
    }

    /// Busy-waits until the count is positive, then decrements it. There
    /// is no real scheduler here to park the caller on, so this spins;
    /// a full kernel would block the calling thread instead.
    pub fn p(&self) {
        loop {
            {
                let mut count = self.count.lock();
                if *count > 0 {
                    *count -= 1;
                    return;
                }
            }
            core::hint::spin_loop();
        }
    }

    pub fn v(&self) {
        *self.count.lock() += 1;
    }
}

/// Terminates the calling thread. Never returns. A real scheduler would
/// remove the thread from its run queue and switch away; this stand-in
/// is only reached from the boot-time test suite, where it is a no-op
/// marker rather than an actual context switch.
pub fn thread_exit() -> ! {
    log::info!("thread_exit: no scheduler attached, spinning");
    loop {
        core::hint::spin_loop();
    }
}
