/*
 * Kernel Error Taxonomy
 *
 * A small, `Copy`, heap-allocation-free enum carrying the POSIX-flavored
 * error taxonomy the syscall edge surfaces to userspace. Internal layers
 * that signal failure by sentinel value (the coremap's
 * `alloc_kpages` returning 0 on exhaustion) keep doing so deliberately —
 * that is the documented contract, not a bug to route through this type.
 */

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KernelError {
    /// Bad/invalid user pointer or faulting address with no valid mapping.
    BadFault,
    /// Bad or out-of-range file descriptor.
    BadFd,
    /// Operation not permitted given the file's open mode (e.g. write to O_RDONLY).
    BadAccessMode,
    /// Invalid argument.
    InvalidArgument,
    /// No such process.
    NoSuchProcess,
    /// Caller is not the parent of the named process.
    NoChild,
    /// Process file-descriptor table is full.
    TooManyOpenFiles,
    /// Physical or virtual memory exhausted.
    OutOfMemory,
    /// Process table is full.
    NoMoreProcesses,
    /// Seek on a non-seekable file (e.g. the console).
    NotSeekable,
}

impl KernelError {
    /// Maps this error to the negative-errno convention syscalls return.
    pub fn as_errno(self) -> isize {
        -(match self {
            KernelError::BadFault => 14,         // EFAULT
            KernelError::BadFd => 9,             // EBADF
            KernelError::BadAccessMode => 9,      // EBADF
            KernelError::InvalidArgument => 22,    // EINVAL
            KernelError::NoSuchProcess => 3,       // ESRCH
            KernelError::NoChild => 10,            // ECHILD
            KernelError::TooManyOpenFiles => 24,   // EMFILE
            KernelError::OutOfMemory => 12,        // ENOMEM
            KernelError::NoMoreProcesses => 6,     // ENPROC (BSD-style)
            KernelError::NotSeekable => 29,        // ESPIPE
        } as isize)
    }
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            KernelError::BadFault => "bad fault address",
            KernelError::BadFd => "bad file descriptor",
            KernelError::BadAccessMode => "bad access mode for file descriptor",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::NoSuchProcess => "no such process",
            KernelError::NoChild => "not a child of the calling process",
            KernelError::TooManyOpenFiles => "too many open files",
            KernelError::OutOfMemory => "out of memory",
            KernelError::NoMoreProcesses => "no more processes",
            KernelError::NotSeekable => "illegal seek",
        };
        f.write_str(s)
    }
}

pub type KResult<T> = Result<T, KernelError>;
