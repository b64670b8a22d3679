//! `H` and `T`: thread selection and liveness, backed by the RTOS hooks.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::error::{Error, ERROR_INVALID_ARGUMENT};
use crate::platform::Platform;
use crate::Monitor;

impl<C: Comm, P: Platform> Monitor<C, P> {
    /// `H<op><tid>`: select the thread whose context subsequent `g`/`G`
    /// commands operate on (`op` = `g`), or acknowledge the continue/step
    /// scope selection (`op` = `c`).
    pub(crate) fn handle_thread_select(&mut self) -> Result<HandlerFlags, Error> {
        let operation = match self.buf.read_char() {
            Ok(op @ b'c') | Ok(op @ b'g') => op,
            _ => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        };

        let all_threads = self.buf.is_next_char_equal_to(b'-').unwrap_or(false);
        let thread_id = match self.buf.read_uint_as_hex() {
            Ok(id) => id,
            Err(_) => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        };

        if operation == b'g' {
            if all_threads || thread_id == 0 {
                self.ctx_thread = None;
            } else if self.platform.rtos_get_thread_context(thread_id).is_some() {
                self.ctx_thread = Some(thread_id);
            } else {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        }
        self.prepare_string_response("OK");
        Ok(HandlerFlags::empty())
    }

    /// `T<tid>`: `OK` iff the RTOS reports the thread alive.
    pub(crate) fn handle_is_thread_active(&mut self) -> Result<HandlerFlags, Error> {
        match self.buf.read_uint_as_hex() {
            Ok(thread_id) if self.buf.bytes_left() == 0 => {
                if self.platform.rtos_is_thread_active(thread_id) {
                    self.prepare_string_response("OK");
                } else {
                    self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                }
            }
            _ => self.prepare_string_response(ERROR_INVALID_ARGUMENT),
        }
        Ok(HandlerFlags::empty())
    }
}
