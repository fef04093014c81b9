/*
 * Input/Output System
 *
 * Device abstraction layer and per-process file descriptor table.
 */

pub mod device;
pub mod fd;

pub use device::{Device, Errno, Stat};
pub use fd::{FdTable, OpenFileDescription};
