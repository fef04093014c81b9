/*
 * System Call Dispatch
 *
 * Trap entry/exit (saving user registers, switching to a kernel stack,
 * resuming at the returned program counter) belongs to the trap
 * dispatcher this module is called from — an external collaborator on
 * this MIPS-class target, whose own exception vector decodes the
 * syscall trap and has already placed arguments in the dispatcher's
 * argument registers before calling here. This module only maps a
 * syscall number to a handler.
 */

pub mod handlers;
pub mod numbers;

use handlers::*;
use numbers::*;

/// Dispatches one syscall. `args` holds up to four word-sized
/// arguments in the order the calling convention passes them; unused
/// trailing slots are ignored by handlers that take fewer.
///
/// Returns the value to place in the return-value register: negative
/// for a POSIX-style errno, non-negative for success.
pub fn dispatch(syscall_num: usize, args: [u32; 4]) -> isize {
    match syscall_num {
        SYS_GETPID => sys_getpid(),
        SYS_FORK => sys_fork(),
        SYS_EXECV => sys_execv(args[0], args[1]),
        SYS_WAITPID => sys_waitpid(args[0] as i32, args[1], args[2] as i32),
        SYS_EXIT => sys_exit(args[0] as i32),
        SYS_SBRK => sys_sbrk(args[0] as i32),
        SYS_OPEN => sys_open(args[0], args[1] as i32),
        SYS_CLOSE => sys_close(args[0] as i32),
        SYS_READ => sys_read(args[0] as i32, args[1], args[2] as usize),
        SYS_WRITE => sys_write(args[0] as i32, args[1], args[2] as usize),
        SYS_DUP2 => sys_dup2(args[0] as i32, args[1] as i32),
        SYS_LSEEK => sys_lseek(args[0] as i32, args[1] as i32 as i64, args[2] as i32),
        SYS_CHDIR => sys_chdir(args[0]),
        SYS_GETCWD => sys_getcwd(args[0], args[1] as usize),
        _ => crate::error::KernelError::InvalidArgument.as_errno(),
    }
}
