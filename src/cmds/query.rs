//! `q` queries: feature negotiation, qXfer blob transfer, monitor commands
//! and RTOS thread enumeration.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::context::RegValue;
use crate::error::{Error, ERROR_INVALID_ARGUMENT};
use crate::platform::Platform;
use crate::{Monitor, MonitorFlags};

const MAX_MONITOR_COMMAND_LENGTH: usize = 32;

impl<C: Comm, P: Platform> Monitor<C, P> {
    pub(crate) fn handle_query(&mut self) -> Result<HandlerFlags, Error> {
        if self.buf.matches_string(b"Supported") {
            self.handle_query_supported()
        } else if self.buf.matches_string(b"Xfer") {
            self.handle_query_transfer()
        } else if self.buf.matches_string(b"Rcmd") {
            self.handle_monitor_command()
        } else if self.buf.matches_string(b"fThreadInfo") {
            self.handle_first_thread_info()
        } else if self.buf.matches_string(b"sThreadInfo") {
            self.handle_subsequent_thread_info()
        } else if self.buf.matches_string(b"ThreadExtraInfo") {
            self.handle_thread_extra_info()
        } else {
            debug!("unsupported q command");
            self.prepare_string_response("");
            Ok(HandlerFlags::empty())
        }
    }

    /// `qSupported`: advertise the qXfer objects we serve and how large a
    /// packet the shared buffer can take.
    fn handle_query_supported(&mut self) -> Result<HandlerFlags, Error> {
        let packet_size = self.buf.capacity();
        self.buf.init();
        let _ = self
            .buf
            .write_string("qXfer:memory-map:read+;qXfer:features:read+;PacketSize=");
        let _ = self.buf.write_uint_as_hex(packet_size);
        Ok(HandlerFlags::empty())
    }

    /// `qXfer:<object>:read:<annex>:<offset>,<length>`: serve a chunk of an
    /// opaque XML blob supplied by the platform.
    fn handle_query_transfer(&mut self) -> Result<HandlerFlags, Error> {
        if self.expect_char(b':').is_err() {
            self.prepare_string_response(ERROR_INVALID_ARGUMENT);
            return Ok(HandlerFlags::empty());
        }

        if self.buf.matches_string(b"memory-map") {
            self.handle_query_transfer_memory_map()
        } else if self.buf.matches_string(b"features") {
            self.handle_query_transfer_features()
        } else {
            self.prepare_string_response("");
            Ok(HandlerFlags::empty())
        }
    }

    fn handle_query_transfer_memory_map(&mut self) -> Result<HandlerFlags, Error> {
        let arguments_ok = self.expect_char(b':').is_ok()
            && self.buf.matches_string(b"read")
            && self.expect_char(b':').is_ok()
            && self.expect_char(b':').is_ok();
        if !arguments_ok {
            self.prepare_string_response(ERROR_INVALID_ARGUMENT);
            return Ok(HandlerFlags::empty());
        }
        match self.read_address_and_length() {
            Ok(arguments) => {
                self.write_xml_chunk(false, arguments.address, arguments.length);
            }
            Err(_) => self.prepare_string_response(ERROR_INVALID_ARGUMENT),
        }
        Ok(HandlerFlags::empty())
    }

    fn handle_query_transfer_features(&mut self) -> Result<HandlerFlags, Error> {
        let arguments_ok = self.expect_char(b':').is_ok()
            && self.buf.matches_string(b"read")
            && self.expect_char(b':').is_ok()
            && self.buf.matches_string(b"target.xml")
            && self.expect_char(b':').is_ok();
        if !arguments_ok {
            self.prepare_string_response(ERROR_INVALID_ARGUMENT);
            return Ok(HandlerFlags::empty());
        }
        match self.read_address_and_length() {
            Ok(arguments) => {
                self.write_xml_chunk(true, arguments.address, arguments.length);
            }
            Err(_) => self.prepare_string_response(ERROR_INVALID_ARGUMENT),
        }
        Ok(HandlerFlags::empty())
    }

    /// Chunked xfer reply: `m<data>` when more follows, `l<data>` when this
    /// chunk reaches the end of the blob.
    fn write_xml_chunk(&mut self, use_target_xml: bool, offset: RegValue, length: RegValue) {
        self.buf.init();

        let xml = if use_target_xml {
            self.platform.target_xml()
        } else {
            self.platform.memory_map_xml()
        };
        let total = xml.len();
        let mut length = length;
        let mut prefix = b'm';

        let valid_bytes;
        if offset >= total {
            prefix = b'l';
            length = 0;
            valid_bytes = 0;
        } else {
            valid_bytes = total - offset;
        }

        // Keep a byte for the prefix character.
        let output_space = self.buf.bytes_left().saturating_sub(1);
        if length > output_space {
            length = output_space;
        }
        if length > valid_bytes {
            prefix = b'l';
            length = valid_bytes;
        }

        let _ = self.buf.write_char(prefix);
        if length > 0 {
            let start = offset;
            let chunk = &xml[start..start + length];
            let _ = self.buf.write_bytes(chunk);
        }
    }

    /// `qRcmd,<hex-of-ascii>`: commands the user typed as `monitor <cmd>`.
    fn handle_monitor_command(&mut self) -> Result<HandlerFlags, Error> {
        if self.expect_char(b',').is_err() {
            self.prepare_string_response(ERROR_INVALID_ARGUMENT);
            return Ok(HandlerFlags::empty());
        }

        let mut command = [0u8; MAX_MONITOR_COMMAND_LENGTH];
        let mut length = 0;
        let mut overlong = false;
        while self.buf.bytes_left() > 0 {
            let byte = match self.buf.read_byte_as_hex() {
                Ok(byte) => byte,
                Err(_) => {
                    self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                    return Ok(HandlerFlags::empty());
                }
            };
            if length < command.len() {
                command[length] = byte;
                length += 1;
            } else {
                overlong = true;
            }
        }

        match &command[..length] {
            b"reset" if !overlong => {
                self.write_to_gdb_console("Will reset on next continue.\r\n")?;
                self.flags.insert(MonitorFlags::RESET_ON_RESUME);
            }
            b"showfault" if !overlong => {
                self.display_fault_cause_to_gdb_console()?;
            }
            b"help" if !overlong => {
                self.write_monitor_help()?;
            }
            _ => {
                self.write_to_gdb_console("Unrecognized monitor command!\r\n")?;
                self.write_monitor_help()?;
            }
        }
        self.prepare_string_response("OK");
        Ok(HandlerFlags::empty())
    }

    fn write_monitor_help(&mut self) -> Result<(), Error> {
        self.write_to_gdb_console("Supported monitor commands:\r\n")?;
        self.write_to_gdb_console("reset\r\n")?;
        self.write_to_gdb_console("showfault\r\n")
    }

    /// `qfThreadInfo`: begin enumerating RTOS threads as `m<id>[,<id>]…`.
    fn handle_first_thread_info(&mut self) -> Result<HandlerFlags, Error> {
        self.deferred_thread_id = None;
        let first = self.platform.rtos_first_thread_id();
        self.write_thread_id_list(first);
        Ok(HandlerFlags::empty())
    }

    /// `qsThreadInfo`: continue the walk; `l` once every id has been sent.
    fn handle_subsequent_thread_info(&mut self) -> Result<HandlerFlags, Error> {
        let start = match self.deferred_thread_id.take() {
            Some(thread_id) => Some(thread_id),
            None => self.platform.rtos_next_thread_id(),
        };
        if !self.write_thread_id_list(start) {
            self.prepare_string_response("l");
        }
        Ok(HandlerFlags::empty())
    }

    /// Appends ids while their hex (plus separator) still fits; the first id
    /// that does not fit is parked for the next `qsThreadInfo` round.
    fn write_thread_id_list(&mut self, first: Option<RegValue>) -> bool {
        self.buf.init();
        let mut current = first;
        let mut wrote_any = false;

        while let Some(thread_id) = current {
            if thread_id == 0 {
                current = self.platform.rtos_next_thread_id();
                continue;
            }
            let needed = 1 + hex_digit_count(thread_id);
            if self.buf.bytes_left() < needed {
                self.deferred_thread_id = Some(thread_id);
                break;
            }
            let separator = if wrote_any { b',' } else { b'm' };
            let _ = self.buf.write_char(separator);
            let _ = self.buf.write_uint_as_hex(thread_id);
            wrote_any = true;
            current = self.platform.rtos_next_thread_id();
        }
        wrote_any
    }

    /// `qThreadExtraInfo,<tid>`: one pretty printed line about a thread.
    fn handle_thread_extra_info(&mut self) -> Result<HandlerFlags, Error> {
        if self.expect_char(b',').is_err() {
            self.prepare_string_response(ERROR_INVALID_ARGUMENT);
            return Ok(HandlerFlags::empty());
        }
        let thread_id = match self.buf.read_uint_as_hex() {
            Ok(thread_id) => thread_id,
            Err(_) => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        };

        self.buf.init();
        if let Some(info) = self.platform.rtos_extra_thread_info(thread_id) {
            for &byte in info.as_bytes() {
                let _ = self.buf.write_byte_as_hex(byte);
            }
        }
        Ok(HandlerFlags::empty())
    }
}

fn hex_digit_count(value: RegValue) -> usize {
    let significant_bytes = match value {
        0 => 1,
        v => std::mem::size_of::<RegValue>() - v.leading_zeros() as usize / 8,
    };
    2 * significant_bytes
}
