//! Minimal hardware surface for a serial-attached tag reader.
//!
//! The reader streams frames over a UART and exposes one reset line.
//! Everything above this trait is hardware-agnostic, so a serial port,
//! a USB bridge, or a test double all plug in the same way.

use std::io;

/// Logic level on the reader's reset line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineLevel {
    Low,
    High,
}

/// Byte-level access to the reader.
pub trait ByteLink {
    /// Read one byte if immediately available; never blocks.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Bytes buffered and ready to read without waiting.
    fn bytes_pending(&self) -> usize;

    /// Drive the reset line to the given level.
    fn set_reset_line(&mut self, level: LineLevel) -> io::Result<()>;
}

impl<L: ByteLink + ?Sized> ByteLink for &mut L {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn bytes_pending(&self) -> usize {
        (**self).bytes_pending()
    }

    fn set_reset_line(&mut self, level: LineLevel) -> io::Result<()> {
        (**self).set_reset_line(level)
    }
}

impl<L: ByteLink + ?Sized> ByteLink for Box<L> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn bytes_pending(&self) -> usize {
        (**self).bytes_pending()
    }

    fn set_reset_line(&mut self, level: LineLevel) -> io::Result<()> {
        (**self).set_reset_line(level)
    }
}
