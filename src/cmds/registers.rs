//! Register related commands: the `T` stop reply, `g` and `G`.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::context::Context;
use crate::error::{Error, Exception};
use crate::platform::{Platform, TrapType};
use crate::Monitor;

impl<C: Comm, P: Platform> Monitor<C, P> {
    /// Sends `T<sig>[thread:<tid>;][watch|rwatch|awatch:<addr>;]<regs>` to
    /// tell the host the target stopped, why, and the registers it wants in
    /// every stop report.
    pub(crate) fn send_t_stop_response(&mut self) -> Result<HandlerFlags, Error> {
        self.buf.init();
        // An overrun here is turned into an E04 reply by send_packet.
        let _ = self.write_t_stop_body();
        self.send_packet()?;
        Ok(HandlerFlags::RETURN_IMMEDIATELY)
    }

    fn write_t_stop_body(&mut self) -> Result<(), Exception> {
        let signal = self.signal;
        self.buf.write_char(b'T')?;
        self.buf.write_byte_as_hex(signal)?;

        let halted_thread = self.platform.rtos_halted_thread_id();
        if halted_thread != 0 {
            self.buf.write_string("thread:")?;
            self.buf.write_uint_as_hex(halted_thread)?;
            self.buf.write_char(b';')?;
        }

        let reason = self.platform.trap_reason();
        let stop_key = match reason.kind {
            TrapType::Watch => Some("watch"),
            TrapType::ReadWatch => Some("rwatch"),
            TrapType::AccessWatch => Some("awatch"),
            _ => None,
        };
        if let Some(stop_key) = stop_key {
            self.buf.write_string(stop_key)?;
            self.buf.write_char(b':')?;
            self.buf.write_uint_as_hex(reason.address)?;
            self.buf.write_char(b';')?;
        }

        self.platform.write_t_response_registers(&mut self.buf)
    }

    /// `g`: reply with the whole register context as hex.
    pub(crate) fn handle_register_read(
        &mut self,
        ctx: &mut Context<'_>,
    ) -> Result<HandlerFlags, Error> {
        self.buf.init();
        let result = match self.ctx_thread {
            Some(thread_id) => match self.platform.rtos_get_thread_context(thread_id) {
                Some(thread_ctx) => thread_ctx.copy_to_buffer(&mut self.buf),
                None => ctx.copy_to_buffer(&mut self.buf),
            },
            None => ctx.copy_to_buffer(&mut self.buf),
        };
        // A context larger than the packet buffer shows up as E04 at send.
        let _ = result;
        Ok(HandlerFlags::empty())
    }

    /// `G<hex-regs>`: overwrite the register context.
    pub(crate) fn handle_register_write(
        &mut self,
        ctx: &mut Context<'_>,
    ) -> Result<HandlerFlags, Error> {
        let result = match self.ctx_thread {
            Some(thread_id) => match self.platform.rtos_get_thread_context(thread_id) {
                Some(mut thread_ctx) => thread_ctx.copy_from_buffer(&mut self.buf),
                None => ctx.copy_from_buffer(&mut self.buf),
            },
            None => ctx.copy_from_buffer(&mut self.buf),
        };
        match result {
            Ok(()) => self.prepare_string_response("OK"),
            Err(e) => self.prepare_string_response(e.error_response()),
        }
        Ok(HandlerFlags::empty())
    }
}
