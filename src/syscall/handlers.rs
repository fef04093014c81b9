/*
 * System Call Handlers
 *
 * Each handler operates on the calling process, found via
 * `process::sched_stub::current_pid`. Arguments that name user memory
 * (paths, buffers, argv) are copied through `memory::uaccess` before
 * use; nothing here dereferences a user pointer directly.
 */

use super::numbers::{O_ACCMODE, O_CREAT, O_WRONLY, PATH_MAX};
use crate::config::{ARG_MAX, NARG_MAX};
use crate::error::KernelError;
use crate::io::device::Errno;
use crate::loaders;
use crate::memory::{uaccess, AddressSpace};
use crate::process::{self, sched_stub};
use crate::vfs;
use alloc::string::String;
use alloc::vec::Vec;

fn kerror_to_isize(err: KernelError) -> isize {
    err.as_errno()
}

fn errno_to_isize(err: Errno) -> isize {
    -(err as i32 as isize)
}

fn current() -> u32 {
    sched_stub::current_pid().expect("syscall entered with no current process")
}

pub fn sys_getpid() -> isize {
    current() as isize
}

pub fn sys_fork() -> isize {
    match process::fork(current()) {
        Ok(child_pid) => child_pid as isize,
        Err(e) => kerror_to_isize(e),
    }
}

/// Loads `path` with `argv` into a fresh address space and, on success,
/// installs it in place of the caller's. Returns the new entry point
/// (non-negative) on success, or a negative errno. Arranging for the
/// trap-return path to actually jump to that entry point with the new
/// stack pointer is the arch layer's responsibility, not this handler's.
pub fn sys_execv(path_addr: u32, argv_addr: u32) -> isize {
    let pid = current();

    let path = match process::with_process(pid, |p| uaccess::copyin_string(&mut p.address_space, path_addr, PATH_MAX)) {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => return kerror_to_isize(e),
        Err(e) => return kerror_to_isize(e),
    };
    if path.len() < 2 {
        return kerror_to_isize(KernelError::InvalidArgument);
    }

    let argv = match process::with_process(pid, |p| copyin_argv(&mut p.address_space, argv_addr)) {
        Ok(Ok(argv)) => argv,
        Ok(Err(e)) => return kerror_to_isize(e),
        Err(e) => return kerror_to_isize(e),
    };

    let data = match vfs::read_whole(&path) {
        Ok(data) => data,
        Err(e) => return errno_to_isize(e),
    };

    let mut new_space = AddressSpace::create();
    let entry = match loaders::elf::load_into(&data, &mut new_space) {
        Ok(entry) => entry,
        Err(e) => return kerror_to_isize(e),
    };

    if let Err(e) = layout_argv(&mut new_space, &argv) {
        return kerror_to_isize(e);
    }

    let name = argv.first().cloned().unwrap_or_else(|| path.clone());
    match process::commit_exec(pid, name, new_space) {
        Ok(()) => entry as isize,
        Err(e) => kerror_to_isize(e),
    }
}

/// Reads a null-terminated array of user string pointers, bounded by
/// `NARG_MAX` elements and `ARG_MAX` total payload bytes.
fn copyin_argv(addr_space: &mut AddressSpace, argv_addr: u32) -> Result<Vec<String>, KernelError> {
    let mut argv = Vec::new();
    let mut total = 0usize;
    let mut cursor = argv_addr;
    loop {
        if argv.len() >= NARG_MAX {
            return Err(KernelError::InvalidArgument);
        }
        let word_bytes = uaccess::copyin(addr_space, cursor, 4)?;
        let ptr = u32::from_le_bytes([word_bytes[0], word_bytes[1], word_bytes[2], word_bytes[3]]);
        if ptr == 0 {
            break;
        }
        let remaining = ARG_MAX.saturating_sub(total);
        let s = uaccess::copyin_string(addr_space, ptr, remaining)?;
        total += s.len() + 1;
        argv.push(s);
        cursor += 4;
    }
    Ok(argv)
}

/// Writes `argv` onto the freshly loaded address space's stack: the
/// packed strings at the top, a null-terminated pointer array just
/// below them.
fn layout_argv(addr_space: &mut AddressSpace, argv: &[String]) -> Result<(), KernelError> {
    let stack_top = addr_space.define_stack();

    let word_aligned_len = |s: &str| (s.len() + 1 + 3) & !3;
    let strings_size: usize = argv.iter().map(|s| word_aligned_len(s)).sum();
    let pointers_size = (argv.len() + 1) * 4;
    let total = strings_size + pointers_size;

    let base = (stack_top - total as u32) & !3;
    let strings_base = base + pointers_size as u32;

    let mut string_addrs = Vec::with_capacity(argv.len());
    let mut cursor = strings_base;
    for s in argv {
        uaccess::copyout(addr_space, cursor, s.as_bytes())?;
        uaccess::copyout(addr_space, cursor + s.len() as u32, &[0u8])?;
        string_addrs.push(cursor);
        cursor += word_aligned_len(s) as u32;
    }

    let mut ptr_cursor = base;
    for addr in &string_addrs {
        uaccess::copyout(addr_space, ptr_cursor, &addr.to_le_bytes())?;
        ptr_cursor += 4;
    }
    uaccess::copyout(addr_space, ptr_cursor, &0u32.to_le_bytes())?;

    Ok(())
}

pub fn sys_waitpid(pid: i32, status_addr: u32, options: i32) -> isize {
    let waiter = current();
    match process::wait_pid(waiter, pid as u32, options) {
        Ok((reaped_pid, status)) => {
            if status_addr != 0 {
                let result = process::with_process(waiter, |p| uaccess::copyout(&mut p.address_space, status_addr, &status.to_le_bytes()));
                if let Ok(Err(e)) = result {
                    return kerror_to_isize(e);
                }
            }
            reaped_pid as isize
        }
        Err(e) => kerror_to_isize(e),
    }
}

pub fn sys_exit(status: i32) -> ! {
    process::exit(current(), status)
}

pub fn sys_sbrk(delta: i32) -> isize {
    let pid = current();
    match process::with_process(pid, |p| p.address_space.sbrk(delta)) {
        Ok(Ok(old_end)) => old_end as isize,
        Ok(Err(e)) | Err(e) => kerror_to_isize(e),
    }
}

pub fn sys_open(path_addr: u32, flags: i32) -> isize {
    let pid = current();
    let path = match process::with_process(pid, |p| uaccess::copyin_string(&mut p.address_space, path_addr, PATH_MAX)) {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => return kerror_to_isize(e),
        Err(e) => return kerror_to_isize(e),
    };

    let device = match vfs::open(&path, flags & O_CREAT != 0) {
        Ok(device) => device,
        Err(e) => return errno_to_isize(e),
    };

    let ofd = alloc::sync::Arc::new(crate::io::OpenFileDescription::new(device, flags));
    match process::with_process(pid, |p| p.fd_table.install(ofd)) {
        Ok(Ok(fd)) => fd as isize,
        Ok(Err(e)) => errno_to_isize(e),
        Err(e) => kerror_to_isize(e),
    }
}

pub fn sys_close(fd: i32) -> isize {
    let pid = current();
    match process::with_process(pid, |p| p.fd_table.close(fd)) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => errno_to_isize(e),
        Err(e) => kerror_to_isize(e),
    }
}

pub fn sys_read(fd: i32, buf_addr: u32, count: usize) -> isize {
    let pid = current();
    let ofd = match process::with_process(pid, |p| p.fd_table.get(fd)) {
        Ok(Ok(ofd)) => ofd,
        Ok(Err(e)) => return errno_to_isize(e),
        Err(e) => return kerror_to_isize(e),
    };
    if ofd.flags & O_ACCMODE == O_WRONLY {
        return kerror_to_isize(KernelError::BadAccessMode);
    }

    let mut kbuf = alloc::vec![0u8; count];
    let n = match ofd.device.read(ofd.offset(), &mut kbuf) {
        Ok(n) => n,
        Err(e) => return errno_to_isize(e),
    };
    ofd.advance(n as u64);

    match process::with_process(pid, |p| uaccess::copyout(&mut p.address_space, buf_addr, &kbuf[..n])) {
        Ok(Ok(())) => n as isize,
        Ok(Err(e)) | Err(e) => kerror_to_isize(e),
    }
}

pub fn sys_write(fd: i32, buf_addr: u32, count: usize) -> isize {
    let pid = current();
    let ofd = match process::with_process(pid, |p| p.fd_table.get(fd)) {
        Ok(Ok(ofd)) => ofd,
        Ok(Err(e)) => return errno_to_isize(e),
        Err(e) => return kerror_to_isize(e),
    };
    if ofd.flags & O_ACCMODE == crate::syscall::numbers::O_RDONLY {
        return kerror_to_isize(KernelError::BadAccessMode);
    }

    let kbuf = match process::with_process(pid, |p| uaccess::copyin(&mut p.address_space, buf_addr, count)) {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => return kerror_to_isize(e),
        Err(e) => return kerror_to_isize(e),
    };

    match ofd.device.write(ofd.offset(), &kbuf) {
        Ok(n) => {
            ofd.advance(n as u64);
            n as isize
        }
        Err(e) => errno_to_isize(e),
    }
}

pub fn sys_dup2(oldfd: i32, newfd: i32) -> isize {
    let pid = current();
    match process::with_process(pid, |p| p.fd_table.dup2(oldfd, newfd)) {
        Ok(Ok(fd)) => fd as isize,
        Ok(Err(e)) => errno_to_isize(e),
        Err(e) => kerror_to_isize(e),
    }
}

pub fn sys_lseek(fd: i32, offset: i64, whence: i32) -> isize {
    use crate::io::device::{SEEK_CUR, SEEK_SET};

    let pid = current();
    let ofd = match process::with_process(pid, |p| p.fd_table.get(fd)) {
        Ok(Ok(ofd)) => ofd,
        Ok(Err(e)) => return errno_to_isize(e),
        Err(e) => return kerror_to_isize(e),
    };

    // `Device::seek` only sees the bytes it owns, not the fd's tracked
    // cursor, so SEEK_CUR is resolved against `ofd`'s current offset here
    // and handed down as an absolute SEEK_SET.
    let (offset, whence) = if whence == SEEK_CUR {
        (ofd.offset() as i64 + offset, SEEK_SET)
    } else {
        (offset, whence)
    };

    match ofd.device.seek(offset, whence) {
        Ok(new_offset) => {
            if new_offset < 0 {
                return kerror_to_isize(KernelError::InvalidArgument);
            }
            ofd.set_offset(new_offset as u64);
            new_offset as isize
        }
        Err(e) => errno_to_isize(e),
    }
}

pub fn sys_chdir(path_addr: u32) -> isize {
    let pid = current();
    let path = match process::with_process(pid, |p| uaccess::copyin_string(&mut p.address_space, path_addr, PATH_MAX)) {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => return kerror_to_isize(e),
        Err(e) => return kerror_to_isize(e),
    };
    if let Err(e) = vfs::open(&path, false) {
        return errno_to_isize(e);
    }
    match process::with_process(pid, |p| *p.cwd.lock() = path) {
        Ok(()) => 0,
        Err(e) => kerror_to_isize(e),
    }
}

pub fn sys_getcwd(buf_addr: u32, size: usize) -> isize {
    let pid = current();
    let cwd = match process::with_process(pid, |p| p.cwd.lock().clone()) {
        Ok(cwd) => cwd,
        Err(e) => return kerror_to_isize(e),
    };
    if cwd.len() + 1 > size {
        return kerror_to_isize(KernelError::InvalidArgument);
    }
    let mut bytes = cwd.into_bytes();
    bytes.push(0);
    match process::with_process(pid, |p| uaccess::copyout(&mut p.address_space, buf_addr, &bytes)) {
        Ok(Ok(())) => bytes.len() as isize,
        Ok(Err(e)) | Err(e) => kerror_to_isize(e),
    }
}
