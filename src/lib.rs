//! An on-target debug monitor speaking the GDB remote serial protocol (RSP).
//!
//! Unlike a gdbserver process, this monitor runs *inside* the device being
//! debugged: a debug/fault trap hands control to
//! [`Monitor::debug_exception`], which takes over the serial link, answers
//! the host debugger's packets (register and memory access, breakpoints,
//! stepping, semihost file I/O, …) and returns once the host resumes the
//! program.
//!
//! Everything hardware specific sits behind two traits: [`Comm`] carries
//! bytes to and from GDB, [`Platform`] wraps the CPU, memory and debug
//! hardware of the target port. The register file is handed in per trap as a
//! [`Context`], a scatter/gather view over wherever the trap handler left
//! the register values.

#[macro_use]
extern crate log;

mod buffer;
mod cmds;
mod comm;
mod console;
mod context;
mod error;
mod hex;
mod memory;
mod packet;
mod platform;
mod semihost;
mod token;

pub use crate::buffer::PacketBuffer;
pub use crate::cmds::HandlerFlags;
pub use crate::comm::Comm;
pub use crate::console::ConsoleOutput;
pub use crate::context::{Context, RegValue, MAX_CONTEXT_SECTIONS};
pub use crate::error::{
    Error, Exception, ERROR_BUFFER_OVERRUN, ERROR_INVALID_ARGUMENT, ERROR_MEMORY_ACCESS_FAILURE,
    ERROR_NO_FREE_BREAKPOINT,
};
pub use crate::platform::{
    InstructionType, NewlibOp, Platform, SemihostParameters, ThreadState, TrapReason, TrapType,
    WatchpointType, ALL_FROZEN_THREADS, ALL_THREADS, SIGBUS, SIGEMT, SIGFPE, SIGILL, SIGINT,
    SIGSEGV, SIGSTOP, SIGTRAP,
};
pub use crate::token::Token;

use crate::console::GdbConsole;
use crate::error::ERROR_BUFFER_OVERRUN as BUFFER_OVERRUN_RESPONSE;
use crate::packet::Packet;
use crate::platform::TrapType as Trap;

bitflags::bitflags! {
    pub(crate) struct MonitorFlags: u32 {
        const SUCCESSFUL_INIT = 1 << 0;
        const FIRST_EXCEPTION = 1 << 1;
        const SEMIHOST_CTRL_C = 1 << 2;
        const RESTORE_RTOS_STATE = 1 << 3;
        const RESET_ON_RESUME = 1 << 4;
    }
}

/// Hook a debugged application can install to get notified when the monitor
/// takes over or gives back the CPU, e.g. to pause external hardware while
/// sitting at a breakpoint.
pub type DebuggerHook<P> = fn(&mut P);

/// Callback run when a temporary breakpoint is hit. Returning `true` keeps
/// the stop invisible to the host and resumes the program immediately.
pub type TempBreakpointHandler<P> = fn(&mut P) -> bool;

struct TempBreakpoint<P> {
    address: RegValue,
    handler: Option<TempBreakpointHandler<P>>,
}

impl<P> Clone for TempBreakpoint<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for TempBreakpoint<P> {}

/// The debug monitor: singleton state machine entered on every debug trap.
pub struct Monitor<C: Comm, P: Platform> {
    pub(crate) comm: C,
    pub(crate) platform: P,
    pub(crate) buf: PacketBuffer,
    pub(crate) packet: Packet,
    pub(crate) flags: MonitorFlags,
    pub(crate) signal: u8,
    pub(crate) semihost_return_code: i32,
    pub(crate) semihost_errno: i32,
    /// Thread selected by `Hg` whose context `g`/`G` operate on.
    pub(crate) ctx_thread: Option<RegValue>,
    /// Active `vCont;r` single-step range.
    pub(crate) step_range: Option<(RegValue, RegValue)>,
    /// Thread id that did not fit into the last `qfThreadInfo` reply.
    pub(crate) deferred_thread_id: Option<RegValue>,
    temp_breakpoint: Option<TempBreakpoint<P>>,
    entering_hook: Option<DebuggerHook<P>>,
    leaving_hook: Option<DebuggerHook<P>>,
}

impl<C: Comm, P: Platform> Monitor<C, P> {
    /// Creates a monitor. It stays inert until [`init`](Self::init) ran
    /// successfully.
    pub fn new(comm: C, platform: P) -> Monitor<C, P> {
        Monitor {
            comm,
            platform,
            buf: PacketBuffer::new(0),
            packet: Packet::new(),
            flags: MonitorFlags::empty(),
            signal: 0,
            semihost_return_code: 0,
            semihost_errno: 0,
            ctx_thread: None,
            step_range: None,
            deferred_thread_id: None,
            temp_breakpoint: None,
            entering_hook: None,
            leaving_hook: None,
        }
    }

    /// Tokenizes the board's parameter string (`"MRI_UART_… MRI_…"`), hands
    /// it to the platform and allocates the packet buffer. On failure the
    /// monitor stays inert and every `debug_exception` is a no-op.
    pub fn init(&mut self, parameters: &str) -> Result<(), Error> {
        self.flags = MonitorFlags::empty();

        let mut tokens = Token::new();
        tokens.split_string(parameters).map_err(Error::Init)?;
        self.platform.init(&tokens).map_err(Error::Init)?;

        self.buf = PacketBuffer::new(self.platform.packet_buffer_size());
        self.flags
            .insert(MonitorFlags::SUCCESSFUL_INIT | MonitorFlags::FIRST_EXCEPTION);
        info!(
            "monitor initialized, packet buffer of {} bytes",
            self.buf.capacity()
        );
        Ok(())
    }

    pub fn was_successfully_init(&self) -> bool {
        self.flags.contains(MonitorFlags::SUCCESSFUL_INIT)
    }

    /// True until the end of the first debug trap after init.
    pub fn is_first_exception(&self) -> bool {
        self.flags.contains(MonitorFlags::FIRST_EXCEPTION)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn comm_mut(&mut self) -> &mut C {
        &mut self.comm
    }

    /// Installs the application hooks run on debugger entry and exit.
    pub fn set_debugger_hooks(
        &mut self,
        entering: Option<DebuggerHook<P>>,
        leaving: Option<DebuggerHook<P>>,
    ) {
        self.entering_hook = entering;
        self.leaving_hook = leaving;
    }

    /// Arms a one-shot hardware breakpoint at `address` (thumb bit
    /// stripped). Returns false when one is already armed or the hardware
    /// has no comparator left. When it hits, `handler` decides whether the
    /// stop stays invisible to the host.
    pub fn set_temp_breakpoint(
        &mut self,
        address: RegValue,
        handler: Option<TempBreakpointHandler<P>>,
    ) -> bool {
        if self.temp_breakpoint.is_some() {
            return false;
        }
        let address = address & !1;
        if self.platform.set_hardware_breakpoint(address).is_err() {
            return false;
        }
        self.temp_breakpoint = Some(TempBreakpoint { address, handler });
        true
    }

    /// Entry point wired into the debug/fault trap handler. `ctx` is the
    /// register context the trap handler harvested; the monitor reads and
    /// writes registers through it and the platform restores them on return.
    pub fn debug_exception(&mut self, ctx: &mut Context<'_>) -> Result<(), Error> {
        if !self.was_successfully_init() {
            return Ok(());
        }

        // A shared UART raises the debug trap for every received byte; only
        // enter the debugger when there really is something pending.
        if self.platform.comm_caused_interrupt() {
            if !self.comm.data_ready().map_err(Error::comm)? {
                self.platform.comm_clear_interrupt();
                return Ok(());
            }
        }

        if let Some(hook) = self.entering_hook {
            hook(&mut self.platform);
        }

        let was_waiting_for_connect = self.is_waiting_for_gdb_to_connect();
        let just_single_stepped = self.platform.is_single_stepping();
        if was_waiting_for_connect {
            self.wait_for_gdb_to_connect()?;
        }

        self.platform.entering_debugger();
        self.signal = self.platform.determine_cause_of_exception();

        if self.flags.contains(MonitorFlags::RESTORE_RTOS_STATE) {
            self.flags.remove(MonitorFlags::RESTORE_RTOS_STATE);
            self.platform.rtos_restore_prev_thread_state();
        }

        if self.should_swallow_ranged_step_stop() {
            self.platform.enable_single_step();
            self.prepare_for_debugger_exit();
            return Ok(());
        }
        self.step_range = None;
        self.platform.disable_single_step();

        if self.handle_temp_breakpoint() {
            self.prepare_for_debugger_exit();
            return Ok(());
        }

        if self.signal == SIGTRAP && self.is_debuggee_making_semihost_call() {
            let handled = self.handle_semihost_request(ctx)?;
            if handled && !just_single_stepped {
                self.prepare_for_debugger_exit();
                return Ok(());
            }
        }

        if !was_waiting_for_connect {
            // The very first stop is the startup breakpoint; there is no
            // fault worth narrating yet.
            if !self.is_first_exception() {
                self.display_fault_cause_to_gdb_console()?;
            }
            self.send_t_stop_response()?;
        }

        self.gdb_command_loop(ctx)?;

        self.prepare_for_debugger_exit();
        Ok(())
    }

    fn prepare_for_debugger_exit(&mut self) {
        self.platform.leaving_debugger();
        self.flags.remove(MonitorFlags::FIRST_EXCEPTION);
        if let Some(hook) = self.leaving_hook {
            hook(&mut self.platform);
        }
    }

    fn is_waiting_for_gdb_to_connect(&self) -> bool {
        self.is_first_exception() && self.platform.comm_should_wait_for_gdb_connect()
    }

    fn wait_for_gdb_to_connect(&mut self) -> Result<(), Error> {
        loop {
            while self.platform.comm_is_waiting_for_gdb_to_connect() {}
            if self.comm.read().map_err(Error::comm)? == b'+' {
                info!("host debugger connected");
                return Ok(());
            }
            // Not GDB knocking; let the noise pass and re-arm.
            self.platform.comm_wait_for_receive_data_to_stop();
            self.platform.comm_prepare_to_wait_for_gdb_connection();
        }
    }

    /// During a `vCont;r` range step, a single-step stop whose PC is still
    /// inside the range is not reported: step again instead.
    fn should_swallow_ranged_step_stop(&mut self) -> bool {
        let (start, end) = match self.step_range {
            Some(range) => range,
            None => return false,
        };
        if self.signal != SIGTRAP {
            return false;
        }
        let pc = self.platform.program_counter();
        if pc < start || pc >= end {
            return false;
        }
        matches!(self.platform.trap_reason().kind, Trap::Unknown)
    }

    /// Handles a hit of the one-shot breakpoint armed via
    /// [`set_temp_breakpoint`](Self::set_temp_breakpoint). Returns whether
    /// the monitor should return to the program without a session.
    fn handle_temp_breakpoint(&mut self) -> bool {
        let breakpoint = match self.temp_breakpoint {
            Some(breakpoint) => breakpoint,
            None => return false,
        };
        if self.platform.program_counter() != breakpoint.address {
            return false;
        }

        self.temp_breakpoint = None;
        let _ = self.platform.clear_hardware_breakpoint(breakpoint.address);
        match breakpoint.handler {
            Some(handler) => handler(&mut self.platform),
            None => false,
        }
    }

    /// Repeatedly fetch, dispatch and answer packets until one of the
    /// handlers resumes the program.
    pub(crate) fn gdb_command_loop(&mut self, ctx: &mut Context<'_>) -> Result<(), Error> {
        loop {
            let result = self.handle_gdb_command(ctx)?;
            if result.contains(HandlerFlags::RESUME_PROGRAM) {
                return Ok(());
            }
        }
    }

    fn handle_gdb_command(&mut self, ctx: &mut Context<'_>) -> Result<HandlerFlags, Error> {
        self.receive_packet()?;

        let command = match self.buf.read_char() {
            Ok(command) => command,
            Err(_) => {
                self.prepare_string_response("");
                self.send_packet()?;
                return Ok(HandlerFlags::empty());
            }
        };
        let result = match command {
            b'?' => self.send_t_stop_response()?,
            b'c' => self.handle_continue()?,
            b'C' => self.handle_continue_with_signal()?,
            b'D' => self.handle_detach()?,
            b'F' => self.handle_file_io_reply()?,
            b'g' => self.handle_register_read(ctx)?,
            b'G' => self.handle_register_write(ctx)?,
            b'H' => self.handle_thread_select()?,
            b'm' => self.handle_memory_read()?,
            b'M' => self.handle_memory_write()?,
            b'q' => self.handle_query()?,
            b's' => self.handle_single_step()?,
            b'S' => self.handle_single_step_with_signal()?,
            b'T' => self.handle_is_thread_active()?,
            b'v' => self.handle_v_commands()?,
            b'X' => self.handle_binary_memory_write()?,
            b'z' => self.handle_break_watch_remove()?,
            b'Z' => self.handle_break_watch_set()?,
            unknown => {
                debug!("unsupported command '{}'", unknown as char);
                self.prepare_string_response("");
                HandlerFlags::empty()
            }
        };

        if result.contains(HandlerFlags::RETURN_IMMEDIATELY) {
            return Ok(result);
        }
        self.send_packet()?;
        Ok(result)
    }

    fn receive_packet(&mut self) -> Result<(), Error> {
        self.buf.init();
        packet::receive(&mut self.packet, &mut self.comm, &mut self.buf)
    }

    /// Sends whatever the handler left in the shared buffer; a buffer in the
    /// overrun state is replaced by the `E04` reply.
    pub(crate) fn send_packet(&mut self) -> Result<(), Error> {
        if self.buf.overrun_detected() {
            self.prepare_string_response(BUFFER_OVERRUN_RESPONSE);
        }
        self.buf.set_end();
        let ctrl_c = packet::send(&mut self.packet, &mut self.comm, &mut self.buf)?;
        if ctrl_c {
            self.flags.insert(MonitorFlags::SEMIHOST_CTRL_C);
        }
        Ok(())
    }

    /// Rewinds the shared buffer and fills it with `response`.
    pub(crate) fn prepare_string_response(&mut self, response: &str) {
        self.buf.init();
        let _ = self.buf.write_string(response);
    }

    /// Prints `text` on the host debugger's console (an `O` packet, or raw
    /// on a still-shared UART).
    pub fn write_to_gdb_console(&mut self, text: &str) -> Result<(), Error> {
        let write_raw = self.platform.comm_sharing_with_application()
            && self.flags.contains(MonitorFlags::FIRST_EXCEPTION);
        let mut console = GdbConsole::new(&mut self.comm, &mut self.buf, &mut self.packet, write_raw);
        console.write_string(text);
        let (ctrl_c, error) = (console.ctrl_c_seen, console.error);
        self.finish_console(ctrl_c, error)
    }

    pub(crate) fn display_fault_cause_to_gdb_console(&mut self) -> Result<(), Error> {
        let write_raw = self.platform.comm_sharing_with_application()
            && self.flags.contains(MonitorFlags::FIRST_EXCEPTION);
        let mut console = GdbConsole::new(&mut self.comm, &mut self.buf, &mut self.packet, write_raw);
        self.platform.display_fault_cause(&mut console);
        let (ctrl_c, error) = (console.ctrl_c_seen, console.error);
        self.finish_console(ctrl_c, error)
    }

    fn finish_console(&mut self, ctrl_c: bool, error: Option<Error>) -> Result<(), Error> {
        if ctrl_c {
            self.flags.insert(MonitorFlags::SEMIHOST_CTRL_C);
        }
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
