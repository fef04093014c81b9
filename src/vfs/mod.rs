/*
 * Virtual File System Stand-in
 *
 * The real filesystem (buffer cache, on-disk format, a userspace VFS
 * server) is an external collaborator this core hands syscalls off to.
 * This module provides just enough of that seam to make `open`/`read`/
 * `write`/`close`/`lseek` and the executable-load path exercisable: a
 * console node and an in-memory file table, both implementing the same
 * `Device` trait every open-file description already carries.
 */

use crate::io::device::{Device, Errno, Stat, S_IFCHR, S_IFREG};
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// The console device every process's fd 0/1/2 point at. Reads and
/// writes go through the kernel logger/UART writer rather than a real
/// keyboard, since this core has no input driver of its own.
pub struct ConsoleDevice;

impl Device for ConsoleDevice {
    fn read(&self, _offset: u64, _buf: &mut [u8]) -> Result<usize, Errno> {
        Ok(0)
    }

    fn write(&self, _offset: u64, buf: &[u8]) -> Result<usize, Errno> {
        use core::fmt::Write;
        let mut writer = crate::utils::writer::Writer::new();
        let text = core::str::from_utf8(buf).unwrap_or("");
        let _ = writer.write_str(text);
        Ok(buf.len())
    }

    fn ioctl(&self, _request: u32, _arg: usize) -> Result<i32, Errno> {
        Err(Errno::ENOTTY)
    }

    fn is_tty(&self) -> bool {
        true
    }

    fn stat(&self) -> Stat {
        Stat {
            st_mode: S_IFCHR,
            ..Stat::default()
        }
    }
}

/// A plain in-memory file: a growable byte buffer behind a lock, shared
/// by every open-file description created from the same VFS entry.
pub struct InMemoryFile {
    bytes: Mutex<Vec<u8>>,
}

impl InMemoryFile {
    fn new() -> Self {
        Self {
            bytes: Mutex::new(Vec::new()),
        }
    }
}

impl Device for InMemoryFile {
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Errno> {
        let data = self.bytes.lock();
        let offset = offset as usize;
        if offset >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - offset);
        buf[..n].copy_from_slice(&data[offset..offset + n]);
        Ok(n)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize, Errno> {
        let mut data = self.bytes.lock();
        let offset = offset as usize;
        if offset + buf.len() > data.len() {
            data.resize(offset + buf.len(), 0);
        }
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn ioctl(&self, _request: u32, _arg: usize) -> Result<i32, Errno> {
        Err(Errno::ENOTTY)
    }

    fn stat(&self) -> Stat {
        Stat {
            st_mode: S_IFREG,
            st_size: self.bytes.lock().len() as u64,
            ..Stat::default()
        }
    }

    fn seek(&self, offset: i64, whence: i32) -> Result<i64, Errno> {
        use crate::io::device::{SEEK_CUR, SEEK_END, SEEK_SET};
        let len = self.bytes.lock().len() as i64;
        let result = match whence {
            SEEK_SET => offset,
            SEEK_CUR => offset,
            SEEK_END => len + offset,
            _ => return Err(Errno::EINVAL),
        };
        if result < 0 {
            return Err(Errno::EINVAL);
        }
        Ok(result)
    }
}

/// Reads the full contents of an in-memory file at `path` at once, for
/// the executable-load path, which needs random access into the bytes
/// rather than the sequential `Device::read` interface.
pub fn read_whole(path: &str) -> Result<Vec<u8>, Errno> {
    let table = FILES.lock();
    let file = table.get(path).ok_or(Errno::ENOENT)?;
    Ok(file.bytes.lock().clone())
}

/// Installs `data` as the contents of `path`, overwriting any existing
/// entry. Used to seed executables and test fixtures without a real
/// filesystem image to load from.
pub fn install_file(path: &str, data: Vec<u8>) {
    let mut table = FILES.lock();
    let file = Arc::new(InMemoryFile::new());
    *file.bytes.lock() = data;
    table.insert(String::from(path), file);
}

static FILES: Mutex<BTreeMap<String, Arc<InMemoryFile>>> = Mutex::new(BTreeMap::new());

pub const CONSOLE_PATH: &str = "con:";

/// Opens `path` as a `Device`. `"con:"` always resolves to the console;
/// anything else is looked up in the in-memory file table, created on
/// first open if `create` is set, otherwise `ENOENT`.
pub fn open(path: &str, create: bool) -> Result<Arc<dyn Device>, Errno> {
    if path == CONSOLE_PATH {
        return Ok(Arc::new(ConsoleDevice));
    }

    let mut table = FILES.lock();
    if let Some(file) = table.get(path) {
        return Ok(file.clone() as Arc<dyn Device>);
    }
    if create {
        let file = Arc::new(InMemoryFile::new());
        table.insert(String::from(path), file.clone());
        return Ok(file as Arc<dyn Device>);
    }
    Err(Errno::ENOENT)
}
