//! The interface a target port must provide before the monitor can debug it.
//!
//! Everything CPU-, device- and RTOS-specific lives behind [`Platform`]: how
//! registers were saved, how single-stepping and hardware breakpoints are
//! programmed, how a trap cause maps to a POSIX signal, how faulting memory
//! accesses are detected. The monitor core only ever talks to this trait.

use crate::buffer::PacketBuffer;
use crate::console::ConsoleOutput;
use crate::context::{Context, RegValue};
use crate::error::Exception;
use crate::token::Token;

/// Signal numbers reported in stop replies, matching GDB's expectations.
pub const SIGINT: u8 = 2;
pub const SIGILL: u8 = 4;
pub const SIGTRAP: u8 = 5;
pub const SIGEMT: u8 = 7;
pub const SIGFPE: u8 = 8;
pub const SIGBUS: u8 = 10;
pub const SIGSEGV: u8 = 11;
pub const SIGSTOP: u8 = 17;

/// What kind of event caused the current trap, as far as the debug hardware
/// can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapType {
    Unknown,
    HwBreakpoint,
    SwBreakpoint,
    /// Write watchpoint hit.
    Watch,
    /// Read watchpoint hit.
    ReadWatch,
    /// Access (read/write) watchpoint hit.
    AccessWatch,
}

#[derive(Debug, Clone, Copy)]
pub struct TrapReason {
    pub kind: TrapType,
    /// Data address that tripped a watchpoint; unused for other kinds.
    pub address: RegValue,
}

impl TrapReason {
    pub fn unknown() -> TrapReason {
        TrapReason {
            kind: TrapType::Unknown,
            address: 0,
        }
    }
}

/// Watchpoint flavours settable through `Z2`/`Z3`/`Z4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchpointType {
    Write,
    Read,
    ReadWrite,
}

/// Classification of the instruction the program counter points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionType {
    Other,
    MbedSemihostCall,
    NewlibSemihostCall,
    HardcodedBreakpoint,
}

/// The up-to-four machine words a semihost call passes to its handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemihostParameters {
    pub parameter1: RegValue,
    pub parameter2: RegValue,
    pub parameter3: RegValue,
    pub parameter4: RegValue,
}

/// Which newlib syscall stub issued the semihost trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewlibOp {
    Open,
    Rename,
    Read,
    Write,
    Seek,
    Close,
    FStat,
    Stat,
    Unlink,
    Errno,
}

/// Scheduling state a debugged RTOS thread can be placed in before resuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Frozen,
    Thawed,
    SingleStepping,
}

/// Sentinel thread id: apply a state change to every known thread.
pub const ALL_THREADS: RegValue = RegValue::max_value();
/// Sentinel thread id: apply a state change to threads still frozen.
pub const ALL_FROZEN_THREADS: RegValue = RegValue::max_value() - 1;

pub trait Platform {
    /// Consumes the tokenized init parameter string and brings up the
    /// communication channel and debug hardware.
    fn init(&mut self, tokens: &Token) -> Result<(), Exception>;

    /// Size of the packet buffer to allocate. Must fit the largest `G`
    /// payload: `1 + 2 * size of the register context` plus the frame.
    fn packet_buffer_size(&self) -> usize;

    fn entering_debugger(&mut self);
    fn leaving_debugger(&mut self);

    fn mem_read8(&mut self, address: RegValue) -> u8;
    fn mem_read16(&mut self, address: RegValue) -> u16;
    fn mem_read32(&mut self, address: RegValue) -> u32;
    fn mem_read64(&mut self, address: RegValue) -> u64;
    fn mem_write8(&mut self, address: RegValue, value: u8);
    fn mem_write16(&mut self, address: RegValue, value: u16);
    fn mem_write32(&mut self, address: RegValue, value: u32);
    fn mem_write64(&mut self, address: RegValue, value: u64);

    /// Reports (and clears) the sticky flag the platform's fault handler
    /// raises when one of the `mem_*` accesses above bus-faulted.
    fn was_memory_fault_encountered(&mut self) -> bool;

    /// Makes freshly written code bytes visible to instruction fetch.
    fn sync_icache_to_dcache(&mut self, _address: RegValue, _length: RegValue) {}

    /// Maps the cause of the current trap to a POSIX signal number.
    fn determine_cause_of_exception(&mut self) -> u8;

    fn trap_reason(&mut self) -> TrapReason;

    /// Dumps a human-readable description of the fault to the GDB console.
    fn display_fault_cause(&mut self, _console: &mut dyn ConsoleOutput) {}

    fn enable_single_step(&mut self);
    fn disable_single_step(&mut self);
    fn is_single_stepping(&self) -> bool;

    fn program_counter(&mut self) -> RegValue;
    fn set_program_counter(&mut self, pc: RegValue);
    fn advance_program_counter_to_next_instruction(&mut self);
    fn was_program_counter_modified_by_user(&mut self) -> bool;

    /// Appends the `n:r;` register fragments of the `T` stop reply.
    fn write_t_response_registers(&mut self, buffer: &mut PacketBuffer) -> Result<(), Exception>;

    /// Memory map XML served through `qXfer:memory-map:read`.
    fn memory_map_xml(&self) -> &[u8] {
        &[]
    }

    /// Target description XML served through `qXfer:features:read`.
    fn target_xml(&self) -> &[u8] {
        &[]
    }

    fn set_hardware_breakpoint_of_gdb_kind(
        &mut self,
        address: RegValue,
        kind: RegValue,
    ) -> Result<(), Exception>;
    fn set_hardware_breakpoint(&mut self, address: RegValue) -> Result<(), Exception>;
    fn clear_hardware_breakpoint_of_gdb_kind(
        &mut self,
        address: RegValue,
        kind: RegValue,
    ) -> Result<(), Exception>;
    fn clear_hardware_breakpoint(&mut self, address: RegValue) -> Result<(), Exception>;
    fn set_hardware_watchpoint(
        &mut self,
        address: RegValue,
        size: RegValue,
        watchpoint: WatchpointType,
    ) -> Result<(), Exception>;
    fn clear_hardware_watchpoint(
        &mut self,
        address: RegValue,
        size: RegValue,
        watchpoint: WatchpointType,
    ) -> Result<(), Exception>;

    fn type_of_current_instruction(&mut self) -> InstructionType;

    fn semihost_call_parameters(&mut self) -> SemihostParameters {
        SemihostParameters::default()
    }

    /// Decodes which newlib stub trapped; `None` when it is not one the
    /// platform recognizes.
    fn newlib_semihost_operation(&mut self) -> Option<NewlibOp> {
        None
    }

    /// Injects the return and errno values of a completed semihost call into
    /// the halted program.
    fn set_semihost_return_and_errno_values(&mut self, _return_value: i32, _err: i32) {}

    /// Target address of a scratch area large enough for a GDB `struct stat`,
    /// used to complete the mbed file-length semihost call. `None` leaves
    /// that call unhandled.
    fn semihost_stat_scratch(&mut self) -> Option<RegValue> {
        None
    }

    fn reset_device(&mut self) {}

    /// Device unique id, served to mbed semihost uid requests.
    fn uid(&self) -> &[u8] {
        &[]
    }

    /// True when the trap was raised by the comm device itself (shared UART
    /// interrupt) rather than by a debug event.
    fn comm_caused_interrupt(&mut self) -> bool {
        false
    }

    fn comm_clear_interrupt(&mut self) {}

    /// True when the UART is shared with the application, which makes the
    /// console write raw text instead of `O` packets until GDB attaches.
    fn comm_sharing_with_application(&self) -> bool {
        false
    }

    /// True when the first trap should block until GDB connects.
    fn comm_should_wait_for_gdb_connect(&self) -> bool {
        false
    }

    fn comm_is_waiting_for_gdb_to_connect(&mut self) -> bool {
        false
    }

    fn comm_wait_for_receive_data_to_stop(&mut self) {}

    fn comm_prepare_to_wait_for_gdb_connection(&mut self) {}

    /// Id of the RTOS thread that took the trap; 0 when threads are unknown.
    fn rtos_halted_thread_id(&mut self) -> RegValue {
        0
    }

    /// Starts a walk over the known thread ids; `None` when there are none.
    fn rtos_first_thread_id(&mut self) -> Option<RegValue> {
        None
    }

    fn rtos_next_thread_id(&mut self) -> Option<RegValue> {
        None
    }

    fn rtos_extra_thread_info(&mut self, _thread_id: RegValue) -> Option<&str> {
        None
    }

    /// Register context of the given thread, harvested from its TCB.
    fn rtos_get_thread_context(&mut self, _thread_id: RegValue) -> Option<Context<'_>> {
        None
    }

    fn rtos_is_thread_active(&mut self, _thread_id: RegValue) -> bool {
        false
    }

    fn rtos_is_set_thread_state_supported(&self) -> bool {
        false
    }

    fn rtos_set_thread_state(&mut self, _thread_id: RegValue, _state: ThreadState) {}

    fn rtos_restore_prev_thread_state(&mut self) {}

    /// Last-resort handler for a fault taken inside the monitor itself from
    /// a priority level it cannot recover at.
    fn handle_fault_from_high_priority_code(&mut self) {}
}
