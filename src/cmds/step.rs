//! `s` and `S`: execute one instruction, then trap again.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::error::{Error, ERROR_INVALID_ARGUMENT};
use crate::platform::Platform;
use crate::Monitor;

impl<C: Comm, P: Platform> Monitor<C, P> {
    /// `s[addr]`: single step is continue with the CPU told to stop after
    /// one instruction. When the step would only skip a hardcoded
    /// breakpoint, the PC advance already *was* the step, so a synthesized
    /// stop reply is sent instead of resuming.
    pub(crate) fn handle_single_step(&mut self) -> Result<HandlerFlags, Error> {
        let flags = self.skip_hardcoded_breakpoint_if_needed();
        self.set_new_pc_if_supplied();
        self.finish_single_step(flags)
    }

    /// `S<sig>[;addr]`: as `s`, with a signal value.
    pub(crate) fn handle_single_step_with_signal(&mut self) -> Result<HandlerFlags, Error> {
        if self.parse_signal_and_optional_address().is_err() {
            self.prepare_string_response(ERROR_INVALID_ARGUMENT);
            return Ok(HandlerFlags::empty());
        }
        let flags = self.skip_hardcoded_breakpoint_if_needed();
        self.finish_single_step(flags)
    }

    pub(crate) fn finish_single_step(&mut self, flags: HandlerFlags) -> Result<HandlerFlags, Error> {
        if flags.contains(HandlerFlags::SKIPPED_OVER_BREAK) {
            return self.send_t_stop_response().map(|f| f | flags);
        }
        self.platform.enable_single_step();
        self.resume_program(true)?;
        Ok(flags | HandlerFlags::RESUME_PROGRAM | HandlerFlags::RETURN_IMMEDIATELY)
    }
}
