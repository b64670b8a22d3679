//! `c`, `C` and `D`: resume the halted program.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::error::{Error, Exception, ERROR_INVALID_ARGUMENT};
use crate::platform::{InstructionType, Platform, ThreadState, ALL_THREADS};
use crate::{Monitor, MonitorFlags};

impl<C: Comm, P: Platform> Monitor<C, P> {
    pub(crate) fn should_skip_hardcoded_breakpoint(&mut self) -> bool {
        !self.platform.was_program_counter_modified_by_user()
            && self.platform.type_of_current_instruction() == InstructionType::HardcodedBreakpoint
    }

    /// A continue issued while sitting on a breakpoint assembled into the
    /// program image would trap again without making progress, so the PC is
    /// moved past it first.
    pub(crate) fn skip_hardcoded_breakpoint_if_needed(&mut self) -> HandlerFlags {
        if self.should_skip_hardcoded_breakpoint() {
            self.platform.advance_program_counter_to_next_instruction();
            HandlerFlags::SKIPPED_OVER_BREAK
        } else {
            HandlerFlags::empty()
        }
    }

    pub(crate) fn set_new_pc_if_supplied(&mut self) {
        if let Ok(pc) = self.buf.read_uint_as_hex() {
            self.platform.set_program_counter(pc);
        }
    }

    /// Side effects every real resume carries: a pending `monitor reset`,
    /// and thawing RTOS threads (the halted one single-stepping when the
    /// resume is a step).
    pub(crate) fn resume_program(&mut self, single_stepping: bool) -> Result<(), Error> {
        if !single_stepping && self.flags.contains(MonitorFlags::RESET_ON_RESUME) {
            self.flags.remove(MonitorFlags::RESET_ON_RESUME);
            self.comm.flush_transmit().map_err(Error::comm)?;
            self.platform.reset_device();
        }

        if self.platform.rtos_is_set_thread_state_supported() {
            self.platform.rtos_set_thread_state(ALL_THREADS, ThreadState::Thawed);
            if single_stepping {
                let halted_thread = self.platform.rtos_halted_thread_id();
                self.platform
                    .rtos_set_thread_state(halted_thread, ThreadState::SingleStepping);
            }
            self.flags.insert(MonitorFlags::RESTORE_RTOS_STATE);
        }
        Ok(())
    }

    /// `c[addr]`: continue, optionally from a new PC. No reply is sent; the
    /// next stop produces a `T` packet instead.
    pub(crate) fn handle_continue(&mut self) -> Result<HandlerFlags, Error> {
        let flags = self.skip_hardcoded_breakpoint_if_needed();
        self.set_new_pc_if_supplied();
        self.resume_program(false)?;
        Ok(flags | HandlerFlags::RESUME_PROGRAM | HandlerFlags::RETURN_IMMEDIATELY)
    }

    /// `C<sig>[;addr]`: like `c` with the signal the host wants delivered.
    pub(crate) fn handle_continue_with_signal(&mut self) -> Result<HandlerFlags, Error> {
        if self.parse_signal_and_optional_address().is_err() {
            self.prepare_string_response(ERROR_INVALID_ARGUMENT);
            return Ok(HandlerFlags::empty());
        }
        let flags = self.skip_hardcoded_breakpoint_if_needed();
        self.resume_program(false)?;
        Ok(flags | HandlerFlags::RESUME_PROGRAM | HandlerFlags::RETURN_IMMEDIATELY)
    }

    pub(crate) fn parse_signal_and_optional_address(&mut self) -> Result<(), Exception> {
        let signal = self.buf.read_uint_as_hex()?;
        self.signal = signal as u8;
        if self.buf.is_next_char_equal_to(b';').unwrap_or(false) {
            let pc = self.buf.read_uint_as_hex()?;
            self.platform.set_program_counter(pc);
        }
        Ok(())
    }

    /// `D`: detach. Acknowledge with `OK`, then resume like `c`.
    pub(crate) fn handle_detach(&mut self) -> Result<HandlerFlags, Error> {
        info!("debugger detached, resuming program");
        let flags = self.skip_hardcoded_breakpoint_if_needed();
        self.prepare_string_response("OK");
        self.send_packet()?;
        self.resume_program(false)?;
        Ok(flags | HandlerFlags::RESUME_PROGRAM | HandlerFlags::RETURN_IMMEDIATELY)
    }
}
