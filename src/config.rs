/*
 * Kernel-wide Configuration Constants
 *
 * Build-time constants for the virtual-memory and process-lifecycle core,
 * gathered in one place rather than scattered as magic numbers at each
 * call site. Values follow the 32-bit MIPS/OS161 teaching-kernel convention
 * this design is modeled on.
 */

/// Size of one physical/virtual page, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Mask that clears the low-order page-offset bits of an address.
pub const PAGE_FRAME_MASK: u32 = !(PAGE_SIZE as u32 - 1);

/// Number of slots in a single page-table level (1024 for 32-bit MIPS:
/// a 4-KiB page of 4-byte entries, or equivalently 10 bits of index).
pub const PAGE_TABLE_SIZE: usize = 1024;

/// Number of hardware TLB slots.
pub const NUM_TLB: usize = 64;

/// Maximum number of simultaneously open file descriptors per process.
pub const OPEN_MAX: usize = 64;

/// Lowest PID ever handed out. PID 0 is reserved (no process).
pub const PID_MIN: u32 = 1;

/// Highest PID ever handed out. Process table has `PID_MAX - PID_MIN + 1` slots.
pub const PID_MAX: u32 = 256;

/// Total capacity of the process table.
pub const PROC_TABLE_SIZE: usize = (PID_MAX - PID_MIN + 1) as usize;

/// PID used to mark an orphaned process (parent already exited).
pub const PID_ORPHAN: i64 = -1;

/// Maximum total bytes of packed argv strings copied during `execv`.
pub const ARG_MAX: usize = 64 * 1024;

/// Maximum number of argv elements accepted by `execv`.
pub const NARG_MAX: usize = 64;

/// Top of the user stack; the stack grows downward from here.
pub const USERSTACK: u32 = 0x8000_0000;

/// Number of pages reserved for the user stack.
pub const STACKPAGES: u32 = 12;

/// First address past the user-space region; kernel addresses live above this.
pub const USERSPACETOP: u32 = 0x8000_0000;

/// Number of bytes separating the highest segment's end from the heap start.
pub const HEAP_GAP: u32 = PAGE_SIZE as u32;
