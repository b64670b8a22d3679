//! One handler per RSP command letter.
//!
//! Handlers parse their arguments straight out of the shared packet buffer,
//! rewind it with `PacketBuffer::init` when they want to reply, and hand a
//! [`HandlerFlags`] mask back to the dispatcher.

pub(crate) mod break_watch;
pub(crate) mod file_io;
pub(crate) mod memory;
pub(crate) mod query;
pub(crate) mod registers;
pub(crate) mod resume;
pub(crate) mod step;
pub(crate) mod thread;
pub(crate) mod vcont;

use crate::comm::Comm;
use crate::context::RegValue;
use crate::error::Exception;
use crate::platform::Platform;
use crate::Monitor;

bitflags::bitflags! {
    /// What the dispatcher should do once a handler returns.
    pub struct HandlerFlags: u32 {
        /// Finish the debug session and return to the halted program.
        const RESUME_PROGRAM = 1 << 0;
        /// The handler already sent its own packet; skip the automatic send.
        const RETURN_IMMEDIATELY = 1 << 1;
        /// The program counter was advanced past a hardcoded breakpoint.
        const SKIPPED_OVER_BREAK = 1 << 2;
    }
}

/// `<address>,<length>` argument pair shared by the memory and qXfer
/// commands.
pub(crate) struct AddressLength {
    pub address: RegValue,
    pub length: RegValue,
}

impl<C: Comm, P: Platform> Monitor<C, P> {
    pub(crate) fn read_address_and_length(&mut self) -> Result<AddressLength, Exception> {
        let address = self.buf.read_uint_as_hex()?;
        self.expect_char(b',')?;
        let length = self.buf.read_uint_as_hex()?;
        Ok(AddressLength { address, length })
    }

    pub(crate) fn read_address_and_length_with_colon(&mut self) -> Result<AddressLength, Exception> {
        let arguments = self.read_address_and_length()?;
        self.expect_char(b':')?;
        Ok(arguments)
    }

    /// Consumes `wanted` or fails the ongoing parse with `InvalidArgument`.
    pub(crate) fn expect_char(&mut self, wanted: u8) -> Result<(), Exception> {
        match self.buf.is_next_char_equal_to(wanted) {
            Ok(true) => Ok(()),
            _ => Err(Exception::InvalidArgument),
        }
    }
}
