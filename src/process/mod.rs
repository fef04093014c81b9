/*
 * Process Table and Lifecycle
 *
 * A process owns exactly one address space, one FD table, and a
 * reference to its current working directory; the process table is a
 * fixed, PID-indexed array guarded by one lock, matching the flat
 * process array the teaching kernel this design is modeled on uses in
 * place of a dynamically sized map.
 */

pub mod sched_stub;

use crate::config::{PID_MAX, PID_MIN, PID_ORPHAN, PROC_TABLE_SIZE};
use crate::error::{KResult, KernelError};
use crate::io::FdTable;
use crate::memory::AddressSpace;
use alloc::string::String;
use alloc::sync::Arc;
use spin::Mutex;

/// Encodes a normal-exit status the way `wait`'s POSIX status word does:
/// exit code in the high byte, zero in the low byte (no signal).
pub fn encode_exit_status(code: i32) -> i32 {
    (code & 0xff) << 8
}

pub fn decode_exit_status(status: i32) -> i32 {
    (status >> 8) & 0xff
}

pub struct Process {
    pub pid: u32,
    pub parent_pid: i64,
    pub name: String,
    pub address_space: AddressSpace,
    pub cwd: Arc<Mutex<String>>,
    pub fd_table: FdTable,
    pub exited: bool,
    pub exit_status: i32,
    pub sem_exit: Arc<sched_stub::Semaphore>,
}

impl Process {
    fn new(pid: u32, parent_pid: i64, name: String, address_space: AddressSpace, cwd: Arc<Mutex<String>>, fd_table: FdTable) -> Self {
        Self {
            pid,
            parent_pid,
            name,
            address_space,
            cwd,
            fd_table,
            exited: false,
            exit_status: 0,
            sem_exit: Arc::new(sched_stub::Semaphore::new(0)),
        }
    }
}

struct ProcessTable {
    slots: [Option<Process>; PROC_TABLE_SIZE],
}

impl ProcessTable {
    const fn new() -> Self {
        const NONE_PROCESS: Option<Process> = None;
        Self {
            slots: [NONE_PROCESS; PROC_TABLE_SIZE],
        }
    }

    fn index(pid: u32) -> Option<usize> {
        if pid < PID_MIN || pid > PID_MAX {
            return None;
        }
        Some((pid - PID_MIN) as usize)
    }

    /// Linear scan from `PID_MIN` to `PID_MAX` inclusive for an empty
    /// slot; first one wins.
    fn allocate_pid(&self) -> Option<u32> {
        for pid in PID_MIN..=PID_MAX {
            let index = Self::index(pid).expect("pid in range by construction");
            if self.slots[index].is_none() {
                return Some(pid);
            }
        }
        None
    }
}

static PROCESS_TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());

/// Creates the first process (no parent, fresh cwd, console-backed FD
/// table), installing it at its allocated PID. Called once at boot.
pub fn spawn_root(name: &str, address_space: AddressSpace, console: Arc<dyn crate::io::Device>) -> KResult<u32> {
    let mut table = PROCESS_TABLE.lock();
    let pid = table.allocate_pid().ok_or(KernelError::NoMoreProcesses)?;
    let index = ProcessTable::index(pid).expect("just allocated");
    let cwd = Arc::new(Mutex::new(String::from("/")));
    let fd_table = FdTable::with_console(console);
    table.slots[index] = Some(Process::new(pid, PID_ORPHAN, String::from(name), address_space, cwd, fd_table));
    Ok(pid)
}

/// Runs `f` against the process at `pid`, or `NoSuchProcess` if the
/// slot is empty.
pub fn with_process<F, R>(pid: u32, f: F) -> KResult<R>
where
    F: FnOnce(&mut Process) -> R,
{
    let mut table = PROCESS_TABLE.lock();
    let index = ProcessTable::index(pid).ok_or(KernelError::NoSuchProcess)?;
    let process = table.slots[index].as_mut().ok_or(KernelError::NoSuchProcess)?;
    Ok(f(process))
}

/// Copies the parent's name, cwd reference, FD table, and address space
/// into a freshly allocated child PID, recording `parent_pid` as its
/// parent. Any step's failure leaves the process table untouched (the
/// new slot is never installed until every copy has already succeeded).
pub fn fork(parent_pid: u32) -> KResult<u32> {
    let mut table = PROCESS_TABLE.lock();
    let parent_index = ProcessTable::index(parent_pid).ok_or(KernelError::NoSuchProcess)?;
    let pid = table.allocate_pid().ok_or(KernelError::NoMoreProcesses)?;

    let child = {
        let parent = table.slots[parent_index]
            .as_mut()
            .ok_or(KernelError::NoSuchProcess)?;
        let address_space = parent.address_space.copy()?;
        let fd_table = parent.fd_table.fork();
        let cwd = parent.cwd.clone();
        Process::new(pid, parent_pid as i64, parent.name.clone(), address_space, cwd, fd_table)
    };

    let child_index = ProcessTable::index(pid).expect("just allocated");
    table.slots[child_index] = Some(child);
    Ok(pid)
}

/// Installs a freshly loaded address space and new program name into
/// `pid`, destroying whatever address space it had before. Called only
/// after `loaders::elf::load_into` has fully succeeded against the new
/// address space, so a failed load never reaches here and the caller's
/// original address space stays intact.
pub fn commit_exec(pid: u32, name: String, address_space: AddressSpace) -> KResult<()> {
    with_process(pid, |process| {
        process.name = name;
        process.address_space = address_space;
    })
}

/// Rejects `pid < PID_MIN` (no-such-process) and non-zero `options`
/// unless `pid` equals `waiter`'s own pid (invalid-argument). Fails
/// with no-child unless `pid`'s parent is `waiter`. Blocks on the
/// child's exit semaphore, then reclaims its slot and returns the
/// encoded status it exited with.
pub fn wait_pid(waiter: u32, pid: u32, options: i32) -> KResult<(u32, i32)> {
    if pid < PID_MIN {
        return Err(KernelError::NoSuchProcess);
    }
    if options != 0 && pid != waiter {
        return Err(KernelError::InvalidArgument);
    }

    let sem = {
        let table = PROCESS_TABLE.lock();
        let index = ProcessTable::index(pid).ok_or(KernelError::NoSuchProcess)?;
        let child = table.slots[index].as_ref().ok_or(KernelError::NoSuchProcess)?;
        if child.parent_pid != waiter as i64 {
            return Err(KernelError::NoChild);
        }
        child.sem_exit.clone()
    };

    sem.p();

    let mut table = PROCESS_TABLE.lock();
    let index = ProcessTable::index(pid).expect("validated above");
    let status = table.slots[index]
        .as_ref()
        .expect("still present until we reclaim it")
        .exit_status;
    table.slots[index] = None;
    Ok((pid, status))
}

/// Reparents every live child of `pid` to `PID_ORPHAN`, reclaiming any
/// that had already exited. Marks `pid` exited with the encoded
/// `code`, signals its exit semaphore, destroys its resources, and
/// reclaims its own slot immediately if it was itself an orphan.
/// Calls `sched_stub::thread_exit` last; never returns.
pub fn exit(pid: u32, code: i32) -> ! {
    let status = encode_exit_status(code);
    let mut table = PROCESS_TABLE.lock();

    let mut reclaim_now = alloc::vec::Vec::new();
    for slot in table.slots.iter_mut() {
        if let Some(process) = slot {
            if process.parent_pid == pid as i64 {
                process.parent_pid = PID_ORPHAN;
                if process.exited {
                    reclaim_now.push(process.pid);
                }
            }
        }
    }
    for orphan_pid in reclaim_now {
        if let Some(index) = ProcessTable::index(orphan_pid) {
            table.slots[index] = None;
        }
    }

    let index = ProcessTable::index(pid).expect("exit called with a valid pid");
    let was_orphan;
    let sem;
    {
        let process = table.slots[index].as_mut().expect("exiting process still present");
        process.exited = true;
        process.exit_status = status;
        was_orphan = process.parent_pid == PID_ORPHAN;
        sem = process.sem_exit.clone();
        process.fd_table.destroy_all();
    }
    sem.v();

    if was_orphan {
        table.slots[index] = None;
    }

    drop(table);
    sched_stub::thread_exit();
}
