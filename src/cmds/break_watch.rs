//! `Z`/`z`: set and clear hardware breakpoints and watchpoints.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::context::RegValue;
use crate::error::{Error, Exception, ERROR_INVALID_ARGUMENT, ERROR_NO_FREE_BREAKPOINT};
use crate::platform::{Platform, WatchpointType};
use crate::Monitor;

struct BreakWatchArguments {
    /// `1` hardware breakpoint, `2`/`3`/`4` write/read/access watchpoint.
    type_char: u8,
    address: RegValue,
    /// Instruction size hint for breakpoints, watched byte count for
    /// watchpoints.
    kind: RegValue,
}

impl<C: Comm, P: Platform> Monitor<C, P> {
    fn parse_break_watch_arguments(&mut self) -> Result<BreakWatchArguments, Exception> {
        let type_char = self.buf.read_char()?;
        self.expect_char(b',')?;
        let address = self.buf.read_uint_as_hex()?;
        self.expect_char(b',')?;
        let kind = self.buf.read_uint_as_hex()?;
        Ok(BreakWatchArguments {
            type_char,
            address,
            kind,
        })
    }

    /// `Z<kind>,<addr>,<extra>`: arm a hardware breakpoint or watchpoint.
    /// Kind 0 (software breakpoints) and unknown kinds get an empty reply so
    /// GDB falls back to implementing them itself.
    pub(crate) fn handle_break_watch_set(&mut self) -> Result<HandlerFlags, Error> {
        self.handle_break_watch(true)
    }

    /// `z<kind>,<addr>,<extra>`: disarm again.
    pub(crate) fn handle_break_watch_remove(&mut self) -> Result<HandlerFlags, Error> {
        self.handle_break_watch(false)
    }

    fn handle_break_watch(&mut self, set: bool) -> Result<HandlerFlags, Error> {
        let arguments = match self.parse_break_watch_arguments() {
            Ok(arguments) => arguments,
            Err(_) => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        };

        let watchpoint = match arguments.type_char {
            b'2' => Some(WatchpointType::Write),
            b'3' => Some(WatchpointType::Read),
            b'4' => Some(WatchpointType::ReadWrite),
            _ => None,
        };
        let result = match (arguments.type_char, watchpoint) {
            (b'1', _) if set => Some(
                self.platform
                    .set_hardware_breakpoint_of_gdb_kind(arguments.address, arguments.kind),
            ),
            (b'1', _) => Some(
                self.platform
                    .clear_hardware_breakpoint_of_gdb_kind(arguments.address, arguments.kind),
            ),
            (_, Some(watchpoint)) if set => Some(self.platform.set_hardware_watchpoint(
                arguments.address,
                arguments.kind,
                watchpoint,
            )),
            (_, Some(watchpoint)) => Some(self.platform.clear_hardware_watchpoint(
                arguments.address,
                arguments.kind,
                watchpoint,
            )),
            _ => None,
        };

        match result {
            Some(Ok(())) => self.prepare_string_response("OK"),
            Some(Err(Exception::InvalidArgument)) => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT)
            }
            Some(Err(_)) => self.prepare_string_response(ERROR_NO_FREE_BREAKPOINT),
            None => self.prepare_string_response(""),
        }
        Ok(HandlerFlags::empty())
    }
}
