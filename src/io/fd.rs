/*
 * File Descriptor Table
 *
 * Per-process, fixed-capacity table of `OPEN_MAX` slots. Each occupied
 * slot shares an `OpenFileDescription` with every fd that was `dup`'d
 * from it (dup2, fork); the description itself is refcounted via `Arc`
 * and carries its own offset, so two fds from the same `open()` call
 * are independent but two fds that share a description advance the
 * same cursor.
 *
 * Slots 0, 1, 2 are pre-populated with console descriptions at process
 * creation; fd allocation for `open()` always starts its scan at 3.
 */

use super::device::{Device, Errno};
use crate::config::OPEN_MAX;
use crate::syscall::numbers::{O_RDONLY, O_WRONLY};
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// One open-file instance: a device backend, the mode it was opened
/// with, and a shared seek offset.
pub struct OpenFileDescription {
    pub device: Arc<dyn Device>,
    pub flags: i32,
    offset: Mutex<u64>,
}

impl OpenFileDescription {
    pub fn new(device: Arc<dyn Device>, flags: i32) -> Self {
        Self {
            device,
            flags,
            offset: Mutex::new(0),
        }
    }

    pub fn offset(&self) -> u64 {
        *self.offset.lock()
    }

    pub fn set_offset(&self, value: u64) {
        *self.offset.lock() = value;
    }

    pub fn advance(&self, by: u64) {
        *self.offset.lock() += by;
    }
}

/// Per-process file descriptor table: `OPEN_MAX` fixed slots, each
/// either empty or holding a shared, refcounted open-file description.
pub struct FdTable {
    slots: Vec<Option<Arc<OpenFileDescription>>>,
}

impl FdTable {
    /// An empty table with no slots populated, not even the console.
    pub fn empty() -> Self {
        Self {
            slots: (0..OPEN_MAX).map(|_| None).collect(),
        }
    }

    /// A table with slots 0/1/2 bound to `console`, matching the shell
    /// POSIX convention of stdin (read), stdout and stderr (write).
    pub fn with_console(console: Arc<dyn Device>) -> Self {
        let mut table = Self::empty();
        table.slots[0] = Some(Arc::new(OpenFileDescription::new(console.clone(), O_RDONLY)));
        table.slots[1] = Some(Arc::new(OpenFileDescription::new(console.clone(), O_WRONLY)));
        table.slots[2] = Some(Arc::new(OpenFileDescription::new(console, O_WRONLY)));
        table
    }

    fn validate(fd: i32) -> Result<usize, Errno> {
        if fd < 0 || fd as usize >= OPEN_MAX {
            return Err(Errno::EBADF);
        }
        Ok(fd as usize)
    }

    /// Returns the open-file description at `fd`, or `EBADF` if the
    /// slot is out of range or empty.
    pub fn get(&self, fd: i32) -> Result<Arc<OpenFileDescription>, Errno> {
        let index = Self::validate(fd)?;
        self.slots[index].clone().ok_or(Errno::EBADF)
    }

    /// Scans from slot 3 upward for an empty slot, installs `ofd`
    /// there, and returns the fd. `EMFILE` if the table is full.
    pub fn install(&mut self, ofd: Arc<OpenFileDescription>) -> Result<i32, Errno> {
        for (index, slot) in self.slots.iter_mut().enumerate().skip(3) {
            if slot.is_none() {
                *slot = Some(ofd);
                return Ok(index as i32);
            }
        }
        Err(Errno::EMFILE)
    }

    /// Drops the slot's reference to its description, releasing it if
    /// this was the last reference.
    pub fn close(&mut self, fd: i32) -> Result<(), Errno> {
        let index = Self::validate(fd)?;
        self.slots[index].take().ok_or(Errno::EBADF)?;
        Ok(())
    }

    /// `dup2` semantics: `newfd` ends up sharing `oldfd`'s description.
    /// An already-open `newfd` is closed first. A no-op if both name
    /// the same valid fd.
    pub fn dup2(&mut self, oldfd: i32, newfd: i32) -> Result<i32, Errno> {
        let old_index = Self::validate(oldfd)?;
        let new_index = Self::validate(newfd)?;
        let ofd = self.slots[old_index].clone().ok_or(Errno::EBADF)?;
        if old_index == new_index {
            return Ok(newfd);
        }
        self.slots[new_index] = Some(ofd);
        Ok(newfd)
    }

    /// Deep-clones the table for `fork`: every occupied slot in the
    /// child shares the same description as the parent (an extra
    /// `Arc` reference, not a new open-file instance).
    pub fn fork(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }

    /// Drops every occupied slot, releasing each description's
    /// reference. Called once at process exit so no fd outlives its
    /// owning process.
    pub fn destroy_all(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}
