//! Human-readable output to the debugger user, delivered as `O` packets.
//!
//! Text sent while GDB is attached is hex-wrapped into `O` packets so the
//! host prints it on its console. Before GDB has attached on a UART shared
//! with the application, text goes out raw instead so it lands on whatever
//! terminal is watching the port.

use crate::buffer::PacketBuffer;
use crate::comm::Comm;
use crate::context::RegValue;
use crate::error::Error;
use crate::hex;
use crate::packet::{self, Packet};

/// Sink for monitor and platform status text aimed at the debugger user.
///
/// Infallible by design: a fault dump must never abort because the console
/// write failed. Transport errors are remembered and surfaced by the caller
/// once the dump is finished.
pub trait ConsoleOutput {
    fn write_string(&mut self, text: &str);

    /// Writes `value` as `0x<hex>`.
    fn write_hex_value(&mut self, value: RegValue);
}

pub(crate) struct GdbConsole<'a, C: Comm> {
    comm: &'a mut C,
    buffer: &'a mut PacketBuffer,
    packet: &'a mut Packet,
    write_raw: bool,
    pub(crate) ctrl_c_seen: bool,
    pub(crate) error: Option<Error>,
}

impl<'a, C: Comm> GdbConsole<'a, C> {
    pub(crate) fn new(
        comm: &'a mut C,
        buffer: &'a mut PacketBuffer,
        packet: &'a mut Packet,
        write_raw: bool,
    ) -> GdbConsole<'a, C> {
        GdbConsole {
            comm,
            buffer,
            packet,
            write_raw,
            ctrl_c_seen: false,
            error: None,
        }
    }

    fn record<T>(&mut self, result: Result<T, Error>) {
        if let Err(e) = result {
            if self.error.is_none() {
                self.error = Some(e);
            }
        }
    }

    fn send_o_packet(&mut self, text: &str) {
        self.buffer.init();
        let mut write = || -> Result<(), crate::error::Exception> {
            self.buffer.write_char(b'O')?;
            for &byte in text.as_bytes() {
                self.buffer.write_byte_as_hex(byte)?;
            }
            Ok(())
        };
        if write().is_err() {
            // Too long for the packet buffer; drop it rather than send E04.
            return;
        }

        self.buffer.set_end();
        match packet::send(self.packet, self.comm, self.buffer) {
            Ok(ctrl_c) => self.ctrl_c_seen |= ctrl_c,
            Err(e) => self.record::<()>(Err(e)),
        }
    }
}

impl<'a, C: Comm> ConsoleOutput for GdbConsole<'a, C> {
    fn write_string(&mut self, text: &str) {
        if self.write_raw {
            for &byte in text.as_bytes() {
                let result = self.comm.write(byte).map_err(Error::comm);
                self.record(result);
            }
        } else {
            self.send_o_packet(text);
        }
    }

    fn write_hex_value(&mut self, value: RegValue) {
        let mut text = [0u8; 2 + 2 * std::mem::size_of::<RegValue>()];
        text[0] = b'0';
        text[1] = b'x';
        let mut length = 2;

        let significant_nibbles = match value {
            0 => 1,
            v => std::mem::size_of::<RegValue>() * 2 - v.leading_zeros() as usize / 4,
        };
        for index in (0..significant_nibbles).rev() {
            text[length] = hex::NIBBLE_TO_HEX[((value >> (index * 4)) & 0xf) as usize];
            length += 1;
        }

        match std::str::from_utf8(&text[..length]) {
            Ok(text) => self.write_string(text),
            Err(_) => {}
        }
    }
}
