/*
 * UART Writer
 *
 * Minimal polled MMIO UART driver, styled after a 16550-class serial
 * port but addressed at a fixed location in the MIPS-class board's I/O
 * window rather than x86 port I/O. The exact register offsets are
 * illustrative of the target board, not a verified chip datasheet.
 */

use core::fmt;

const UART_BASE: usize = 0xBF00_0000;
const UART_DATA: usize = UART_BASE;
const UART_STATUS: usize = UART_BASE + 0x4;
const STATUS_TX_READY: u8 = 0x20;

fn status() -> u8 {
    unsafe { core::ptr::read_volatile(UART_STATUS as *const u8) }
}

fn put_byte(byte: u8) {
    unsafe {
        while status() & STATUS_TX_READY == 0 {
            core::hint::spin_loop();
        }
        core::ptr::write_volatile(UART_DATA as *mut u8, byte);
    }
}

/// A zero-sized handle whose `fmt::Write` impl drives the UART directly.
pub struct Writer;

impl Writer {
    pub fn new() -> Self {
        Writer
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            put_byte(byte);
        }
        Ok(())
    }
}
