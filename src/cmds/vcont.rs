//! `vCont` and friends: resume with per-action detail, including the ranged
//! single step GDB uses to implement source-level stepping.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::context::RegValue;
use crate::error::{Error, Exception, ERROR_INVALID_ARGUMENT};
use crate::platform::Platform;
use crate::Monitor;

#[derive(Debug, Clone, Copy)]
enum Action {
    Continue,
    Step,
    RangedStep(RegValue, RegValue),
}

impl<C: Comm, P: Platform> Monitor<C, P> {
    pub(crate) fn handle_v_commands(&mut self) -> Result<HandlerFlags, Error> {
        if self.buf.matches_string(b"Cont?") {
            self.prepare_string_response("vCont;c;C;s;S;r");
            return Ok(HandlerFlags::empty());
        }
        if self.buf.remaining().starts_with(b"Cont") {
            self.buf.consume(4);
            return self.handle_vcont();
        }

        debug!("unsupported v command");
        self.prepare_string_response("");
        Ok(HandlerFlags::empty())
    }

    fn handle_vcont(&mut self) -> Result<HandlerFlags, Error> {
        let action = match self.parse_vcont_actions() {
            Ok(action) => action,
            Err(_) => {
                self.prepare_string_response(ERROR_INVALID_ARGUMENT);
                return Ok(HandlerFlags::empty());
            }
        };

        match action {
            Action::Continue => {
                let flags = self.skip_hardcoded_breakpoint_if_needed();
                self.resume_program(false)?;
                Ok(flags | HandlerFlags::RESUME_PROGRAM | HandlerFlags::RETURN_IMMEDIATELY)
            }
            Action::Step => {
                let flags = self.skip_hardcoded_breakpoint_if_needed();
                self.finish_single_step(flags)
            }
            Action::RangedStep(start, end) => self.ranged_single_step(start, end),
        }
    }

    /// Parses `;action[:tid]` until the packet ends and picks the first
    /// action. A specific numeric tid is rejected: the monitor only knows
    /// how to apply an action to all threads (`-1`) or the halted one.
    fn parse_vcont_actions(&mut self) -> Result<Action, Exception> {
        let mut chosen: Option<Action> = None;

        while self.buf.bytes_left() > 0 {
            if !self.buf.is_next_char_equal_to(b';')? {
                return Err(Exception::InvalidArgument);
            }
            let action = match self.buf.read_char()? {
                b'c' => Action::Continue,
                b'C' => {
                    self.read_signal_value()?;
                    Action::Continue
                }
                b's' => Action::Step,
                b'S' => {
                    self.read_signal_value()?;
                    Action::Step
                }
                b'r' => {
                    let start = self.buf.read_uint_as_hex()?;
                    self.expect_char(b',')?;
                    let end = self.buf.read_uint_as_hex()?;
                    Action::RangedStep(start, end)
                }
                _ => return Err(Exception::InvalidArgument),
            };
            if self.buf.is_next_char_equal_to(b':').unwrap_or(false) {
                let thread_id = self.buf.read_int_as_hex()?;
                if thread_id != -1 {
                    return Err(Exception::InvalidArgument);
                }
            }
            if chosen.is_none() {
                chosen = Some(action);
            }
        }

        chosen.ok_or(Exception::InvalidArgument)
    }

    fn read_signal_value(&mut self) -> Result<(), Exception> {
        let signal = self.buf.read_uint_as_hex()?;
        self.signal = signal as u8;
        Ok(())
    }

    /// `r<start>,<end>`: single step, but stay silent as long as the PC
    /// remains inside `[start,end)`. Hardcoded breakpoints inside the range
    /// are walked over immediately; if doing so already carried the PC out
    /// of the range there is nothing left to step and a stop reply is
    /// synthesized.
    fn ranged_single_step(&mut self, start: RegValue, end: RegValue) -> Result<HandlerFlags, Error> {
        let mut flags = HandlerFlags::empty();

        if self.should_skip_hardcoded_breakpoint() {
            self.platform.advance_program_counter_to_next_instruction();
            flags |= HandlerFlags::SKIPPED_OVER_BREAK;
            loop {
                let pc = self.platform.program_counter();
                if pc < start || pc >= end || !self.should_skip_hardcoded_breakpoint() {
                    break;
                }
                self.platform.advance_program_counter_to_next_instruction();
            }
            let pc = self.platform.program_counter();
            if pc < start || pc >= end {
                return self.send_t_stop_response().map(|f| f | flags);
            }
        }

        self.step_range = Some((start, end));
        self.platform.enable_single_step();
        self.resume_program(true)?;
        Ok(flags | HandlerFlags::RESUME_PROGRAM | HandlerFlags::RETURN_IMMEDIATELY)
    }
}
