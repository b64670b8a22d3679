use std::io::prelude::*;
use std::{error, io};

use crate::hex;

/// The byte-level channel between the monitor and the connected GDB.
///
/// On real hardware this wraps a UART (or similar) driver whose reads and
/// writes busy-wait on the link; for tests and simulators it is implemented
/// automatically for anything that is `Read + Write` (eg. `TcpStream`).
pub trait Comm {
    /// Error type returned when reading or writing fails.
    type Error: Into<Box<dyn error::Error + Send + Sync>>;

    /// Reads a byte from the connected debugger, blocking until one arrives.
    fn read(&mut self) -> Result<u8, Self::Error>;

    /// Sends a byte to the connected debugger, blocking until the link
    /// accepts it.
    fn write(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Reports whether a byte is already waiting to be read.
    ///
    /// The packet engine uses this to drain pipelined packets and answer only
    /// the most recent one. A transport that cannot peek may keep the default
    /// and every packet will be answered in turn.
    fn data_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }

    /// Blocks until previously written bytes have physically left the device.
    ///
    /// Called before actions that would destroy buffered output, such as a
    /// device reset requested over `qRcmd`.
    fn flush_transmit(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Writes all bytes from a slice to the stream.
    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        for b in data {
            self.write(*b)?;
        }

        Ok(())
    }

    /// Writes a byte as two lowercase hex digits.
    fn write_hex(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.write(hex::NIBBLE_TO_HEX[hex::hi_nibble(byte) as usize])?;
        self.write(hex::NIBBLE_TO_HEX[hex::lo_nibble(byte) as usize])?;
        Ok(())
    }
}

impl<T> Comm for T
where
    T: Read + Write,
{
    type Error = io::Error;

    fn read(&mut self) -> io::Result<u8> {
        let mut buf = [0u8];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn write(&mut self, byte: u8) -> io::Result<()> {
        io::Write::write_all(self, &[byte])
    }
}
