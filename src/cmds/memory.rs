//! `m`, `M` and `X`: read and write target memory.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::error::{Error, Exception, ERROR_INVALID_ARGUMENT, ERROR_MEMORY_ACCESS_FAILURE};
use crate::memory;
use crate::platform::Platform;
use crate::Monitor;

impl<C: Comm, P: Platform> Monitor<C, P> {
    /// `m<addr>,<len>`: reply with `len` bytes of memory as hex. A fault
    /// partway through returns the bytes read so far; a fault on the very
    /// first unit returns `E03`.
    pub(crate) fn handle_memory_read(&mut self) -> Result<HandlerFlags, Error> {
        let arguments = match self.read_address_and_length() {
            Ok(arguments) => arguments,
            Err(_) => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        };

        self.buf.init();
        match memory::read_memory_into_hex_buffer(
            &mut self.platform,
            &mut self.buf,
            arguments.address,
            arguments.length,
        ) {
            Ok(0) if arguments.length > 0 => {
                self.prepare_string_response(ERROR_MEMORY_ACCESS_FAILURE)
            }
            // Partial reads answer with whatever hex was produced; a reply
            // that outgrew the buffer becomes E04 at send time.
            Ok(_) | Err(_) => {}
        }
        Ok(HandlerFlags::empty())
    }

    /// `M<addr>,<len>:<hex>`: write hex encoded bytes to memory.
    pub(crate) fn handle_memory_write(&mut self) -> Result<HandlerFlags, Error> {
        let arguments = match self.read_address_and_length_with_colon() {
            Ok(arguments) => arguments,
            Err(_) => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        };

        match memory::write_hex_buffer_to_memory(
            &mut self.platform,
            &mut self.buf,
            arguments.address,
            arguments.length,
        ) {
            Ok(()) => self.prepare_string_response("OK"),
            Err(e) => self.prepare_write_failure_response(e),
        }
        Ok(HandlerFlags::empty())
    }

    /// `X<addr>,<len>:<binary>`: write escaped binary data to memory, then
    /// let the platform push it from data to instruction cache in case code
    /// was downloaded.
    pub(crate) fn handle_binary_memory_write(&mut self) -> Result<HandlerFlags, Error> {
        let arguments = match self.read_address_and_length_with_colon() {
            Ok(arguments) => arguments,
            Err(_) => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        };

        match memory::write_binary_buffer_to_memory(
            &mut self.platform,
            &mut self.buf,
            arguments.address,
            arguments.length,
        ) {
            Ok(()) => {
                self.platform
                    .sync_icache_to_dcache(arguments.address, arguments.length);
                self.prepare_string_response("OK");
            }
            Err(e) => self.prepare_write_failure_response(e),
        }
        Ok(HandlerFlags::empty())
    }

    fn prepare_write_failure_response(&mut self, cause: Exception) {
        let response = match cause {
            Exception::BufferOverrun => Exception::BufferOverrun.error_response(),
            _ => ERROR_MEMORY_ACCESS_FAILURE,
        };
        self.prepare_string_response(response);
    }
}
