//! Scripted comm channel and platform double used by the integration tests.
//!
//! Tests queue up checksummed packet chunks, run one `debug_exception` and
//! then compare the transmitted byte stream and the recorded platform calls.

#![allow(dead_code)]

use std::io;

use byteorder::ByteOrder;
use gdbmon::{
    Comm, ConsoleOutput, Context, Exception, InstructionType, Monitor, NewlibOp, PacketBuffer,
    Platform, RegValue, SemihostParameters, ThreadState, Token, TrapReason, WatchpointType,
    ALL_THREADS, SIGTRAP,
};

pub const INITIAL_PC: RegValue = 0x10000000;
pub const MEMORY_BASE: RegValue = 0x20000000;

const EMPTY_PACKET: &[u8] = b"$#00";

/// Computes and splices in the `$…#cc` checksums of every packet embedded in
/// `data`, leaving other bytes (acks, Ctrl-C, …) alone.
pub fn checksum_data(data: &str) -> String {
    let mut out = String::new();
    let mut sum = 0u8;
    let mut in_packet = false;
    for &byte in data.as_bytes() {
        out.push(byte as char);
        match byte {
            b'$' => {
                in_packet = true;
                sum = 0;
            }
            b'#' if in_packet => {
                in_packet = false;
                out.push_str(&format!("{:02x}", sum));
            }
            _ if in_packet => sum = sum.wrapping_add(byte),
            _ => {}
        }
    }
    out
}

/// Byte channel fed from scripted chunks. `data_ready` reports false at each
/// chunk boundary, which is what lets the monitor treat every chunk as one
/// quiet-wire packet. Once the script is exhausted, endless empty packets
/// are served so in-flight sends can complete.
pub struct MockComm {
    chunks: Vec<Vec<u8>>,
    chunk: usize,
    pos: usize,
    filler: usize,
    pub sent: Vec<u8>,
    pub flush_calls: usize,
}

impl MockComm {
    pub fn new() -> MockComm {
        MockComm {
            chunks: Vec::new(),
            chunk: 0,
            pos: 0,
            filler: 0,
            sent: Vec::new(),
            flush_calls: 0,
        }
    }

    pub fn receive_checksummed(&mut self, chunks: &[&str]) {
        self.chunks = chunks
            .iter()
            .map(|chunk| checksum_data(chunk).into_bytes())
            .collect();
        self.chunk = 0;
        self.pos = 0;
        self.filler = 0;
        self.sent.clear();
    }

    pub fn sent_text(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }
}

impl Comm for MockComm {
    type Error = io::Error;

    fn read(&mut self) -> io::Result<u8> {
        loop {
            match self.chunks.get(self.chunk) {
                Some(chunk) if self.pos < chunk.len() => {
                    let byte = chunk[self.pos];
                    self.pos += 1;
                    return Ok(byte);
                }
                Some(_) => {
                    self.chunk += 1;
                    self.pos = 0;
                }
                None => {
                    assert!(self.filler < 400, "monitor kept reading past the scripted input");
                    let byte = EMPTY_PACKET[self.filler % EMPTY_PACKET.len()];
                    self.filler += 1;
                    return Ok(byte);
                }
            }
        }
    }

    fn write(&mut self, byte: u8) -> io::Result<()> {
        self.sent.push(byte);
        Ok(())
    }

    fn data_ready(&mut self) -> io::Result<bool> {
        match self.chunks.get(self.chunk) {
            Some(chunk) if self.pos < chunk.len() => Ok(true),
            Some(_) => {
                self.chunk += 1;
                self.pos = 0;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn flush_transmit(&mut self) -> io::Result<()> {
        self.flush_calls += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(RegValue, usize),
    Write(RegValue, usize),
}

pub struct MockPlatform {
    pub init_count: usize,
    pub init_tokens: Vec<String>,
    pub init_exception: Option<Exception>,
    pub buffer_size: usize,
    pub entering_count: usize,
    pub leaving_count: usize,

    pub memory: Vec<u8>,
    pub accesses: Vec<Access>,
    fault: bool,

    pub cause: u8,
    pub reason: TrapReason,
    pub display_fault_count: usize,

    pub single_stepping: bool,
    pub pc: RegValue,
    pub advance_count: usize,
    pub pc_modified_by_user: bool,
    pub instruction_type: InstructionType,

    pub memory_map: &'static [u8],
    pub target_description: &'static [u8],

    pub set_bp_kind_calls: Vec<(RegValue, RegValue)>,
    pub set_bp_kind_result: Result<(), Exception>,
    pub clear_bp_kind_calls: Vec<(RegValue, RegValue)>,
    pub clear_bp_kind_result: Result<(), Exception>,
    pub set_bp_calls: Vec<RegValue>,
    pub set_bp_result: Result<(), Exception>,
    pub clear_bp_calls: Vec<RegValue>,
    pub set_wp_calls: Vec<(RegValue, RegValue, WatchpointType)>,
    pub set_wp_result: Result<(), Exception>,
    pub clear_wp_calls: Vec<(RegValue, RegValue, WatchpointType)>,

    pub reset_count: usize,
    pub sync_icache_calls: Vec<(RegValue, RegValue)>,

    pub semihost_params: SemihostParameters,
    pub newlib_op: Option<NewlibOp>,
    pub semihost_returns: Vec<(i32, i32)>,
    pub stat_scratch: Option<RegValue>,
    pub device_uid: Vec<u8>,

    pub comm_interrupt: bool,
    pub clear_interrupt_count: usize,
    pub wait_for_connect: bool,
    pub temp_callback_count: usize,
    pub temp_callback_result: bool,
    pub hook_entering_count: usize,
    pub hook_leaving_count: usize,

    pub threads: Vec<RegValue>,
    thread_iter: usize,
    pub halted_tid: RegValue,
    pub thread_states: Vec<(RegValue, ThreadState)>,
    pub set_state_supported: bool,
    pub restore_state_count: usize,
    pub thread_regs: [RegValue; 4],
    pub valid_thread_id: Option<RegValue>,
    pub active_thread_id: Option<RegValue>,
    pub extra_info: Option<&'static str>,
}

impl MockPlatform {
    pub fn new() -> MockPlatform {
        MockPlatform {
            init_count: 0,
            init_tokens: Vec::new(),
            init_exception: None,
            buffer_size: 512,
            entering_count: 0,
            leaving_count: 0,
            memory: vec![0; 64],
            accesses: Vec::new(),
            fault: false,
            cause: SIGTRAP,
            reason: TrapReason::unknown(),
            display_fault_count: 0,
            single_stepping: false,
            pc: INITIAL_PC,
            advance_count: 0,
            pc_modified_by_user: false,
            instruction_type: InstructionType::Other,
            memory_map: b"TEST",
            target_description: b"test!",
            set_bp_kind_calls: Vec::new(),
            set_bp_kind_result: Ok(()),
            clear_bp_kind_calls: Vec::new(),
            clear_bp_kind_result: Ok(()),
            set_bp_calls: Vec::new(),
            set_bp_result: Ok(()),
            clear_bp_calls: Vec::new(),
            set_wp_calls: Vec::new(),
            set_wp_result: Ok(()),
            clear_wp_calls: Vec::new(),
            reset_count: 0,
            sync_icache_calls: Vec::new(),
            semihost_params: SemihostParameters::default(),
            newlib_op: None,
            semihost_returns: Vec::new(),
            stat_scratch: None,
            device_uid: Vec::new(),
            comm_interrupt: false,
            clear_interrupt_count: 0,
            wait_for_connect: false,
            temp_callback_count: 0,
            temp_callback_result: false,
            hook_entering_count: 0,
            hook_leaving_count: 0,
            threads: Vec::new(),
            thread_iter: 0,
            halted_tid: 0,
            thread_states: Vec::new(),
            set_state_supported: false,
            restore_state_count: 0,
            thread_regs: [0; 4],
            valid_thread_id: None,
            active_thread_id: None,
            extra_info: None,
        }
    }

    fn slot(&mut self, address: RegValue, size: usize) -> Option<usize> {
        let offset = address.wrapping_sub(MEMORY_BASE);
        if offset.checked_add(size).map_or(false, |end| end <= self.memory.len()) {
            Some(offset)
        } else {
            self.fault = true;
            None
        }
    }

    fn record_read(&mut self, address: RegValue, size: usize) -> u64 {
        self.accesses.push(Access::Read(address, size));
        match self.slot(address, size) {
            Some(offset) => {
                byteorder::NativeEndian::read_uint(&self.memory[offset..offset + size], size)
            }
            None => 0,
        }
    }

    fn record_write(&mut self, address: RegValue, size: usize, bytes: &[u8]) {
        self.accesses.push(Access::Write(address, size));
        if let Some(offset) = self.slot(address, size) {
            self.memory[offset..offset + size].copy_from_slice(bytes);
        }
    }
}

impl Platform for MockPlatform {
    fn init(&mut self, tokens: &Token) -> Result<(), Exception> {
        self.init_count += 1;
        self.init_tokens = (0..tokens.token_count())
            .map(|i| tokens.token(i).unwrap().to_string())
            .collect();
        match self.init_exception {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn packet_buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn entering_debugger(&mut self) {
        self.entering_count += 1;
    }

    fn leaving_debugger(&mut self) {
        self.leaving_count += 1;
    }

    fn mem_read8(&mut self, address: RegValue) -> u8 {
        self.record_read(address, 1) as u8
    }

    fn mem_read16(&mut self, address: RegValue) -> u16 {
        self.record_read(address, 2) as u16
    }

    fn mem_read32(&mut self, address: RegValue) -> u32 {
        self.record_read(address, 4) as u32
    }

    fn mem_read64(&mut self, address: RegValue) -> u64 {
        self.record_read(address, 8)
    }

    fn mem_write8(&mut self, address: RegValue, value: u8) {
        self.record_write(address, 1, &value.to_ne_bytes())
    }

    fn mem_write16(&mut self, address: RegValue, value: u16) {
        self.record_write(address, 2, &value.to_ne_bytes())
    }

    fn mem_write32(&mut self, address: RegValue, value: u32) {
        self.record_write(address, 4, &value.to_ne_bytes())
    }

    fn mem_write64(&mut self, address: RegValue, value: u64) {
        self.record_write(address, 8, &value.to_ne_bytes())
    }

    fn was_memory_fault_encountered(&mut self) -> bool {
        std::mem::replace(&mut self.fault, false)
    }

    fn sync_icache_to_dcache(&mut self, address: RegValue, length: RegValue) {
        self.sync_icache_calls.push((address, length));
    }

    fn determine_cause_of_exception(&mut self) -> u8 {
        self.cause
    }

    fn trap_reason(&mut self) -> TrapReason {
        self.reason
    }

    fn display_fault_cause(&mut self, _console: &mut dyn ConsoleOutput) {
        self.display_fault_count += 1;
    }

    fn enable_single_step(&mut self) {
        self.single_stepping = true;
    }

    fn disable_single_step(&mut self) {
        self.single_stepping = false;
    }

    fn is_single_stepping(&self) -> bool {
        self.single_stepping
    }

    fn program_counter(&mut self) -> RegValue {
        self.pc
    }

    fn set_program_counter(&mut self, pc: RegValue) {
        self.pc = pc;
    }

    fn advance_program_counter_to_next_instruction(&mut self) {
        self.advance_count += 1;
        self.pc += 4;
    }

    fn was_program_counter_modified_by_user(&mut self) -> bool {
        self.pc_modified_by_user
    }

    fn write_t_response_registers(&mut self, buffer: &mut PacketBuffer) -> Result<(), Exception> {
        buffer.write_string("responseT")
    }

    fn memory_map_xml(&self) -> &[u8] {
        self.memory_map
    }

    fn target_xml(&self) -> &[u8] {
        self.target_description
    }

    fn set_hardware_breakpoint_of_gdb_kind(
        &mut self,
        address: RegValue,
        kind: RegValue,
    ) -> Result<(), Exception> {
        self.set_bp_kind_calls.push((address, kind));
        self.set_bp_kind_result
    }

    fn set_hardware_breakpoint(&mut self, address: RegValue) -> Result<(), Exception> {
        self.set_bp_calls.push(address);
        self.set_bp_result
    }

    fn clear_hardware_breakpoint_of_gdb_kind(
        &mut self,
        address: RegValue,
        kind: RegValue,
    ) -> Result<(), Exception> {
        self.clear_bp_kind_calls.push((address, kind));
        self.clear_bp_kind_result
    }

    fn clear_hardware_breakpoint(&mut self, address: RegValue) -> Result<(), Exception> {
        self.clear_bp_calls.push(address);
        Ok(())
    }

    fn set_hardware_watchpoint(
        &mut self,
        address: RegValue,
        size: RegValue,
        watchpoint: WatchpointType,
    ) -> Result<(), Exception> {
        self.set_wp_calls.push((address, size, watchpoint));
        self.set_wp_result
    }

    fn clear_hardware_watchpoint(
        &mut self,
        address: RegValue,
        size: RegValue,
        watchpoint: WatchpointType,
    ) -> Result<(), Exception> {
        self.clear_wp_calls.push((address, size, watchpoint));
        Ok(())
    }

    fn type_of_current_instruction(&mut self) -> InstructionType {
        self.instruction_type
    }

    fn semihost_call_parameters(&mut self) -> SemihostParameters {
        self.semihost_params
    }

    fn newlib_semihost_operation(&mut self) -> Option<NewlibOp> {
        self.newlib_op
    }

    fn set_semihost_return_and_errno_values(&mut self, return_value: i32, err: i32) {
        self.semihost_returns.push((return_value, err));
    }

    fn semihost_stat_scratch(&mut self) -> Option<RegValue> {
        self.stat_scratch
    }

    fn reset_device(&mut self) {
        self.reset_count += 1;
    }

    fn uid(&self) -> &[u8] {
        &self.device_uid
    }

    fn comm_caused_interrupt(&mut self) -> bool {
        self.comm_interrupt
    }

    fn comm_clear_interrupt(&mut self) {
        self.clear_interrupt_count += 1;
    }

    fn comm_should_wait_for_gdb_connect(&self) -> bool {
        self.wait_for_connect
    }

    fn rtos_halted_thread_id(&mut self) -> RegValue {
        self.halted_tid
    }

    fn rtos_first_thread_id(&mut self) -> Option<RegValue> {
        self.thread_iter = 0;
        self.threads.get(0).copied()
    }

    fn rtos_next_thread_id(&mut self) -> Option<RegValue> {
        self.thread_iter += 1;
        self.threads.get(self.thread_iter).copied()
    }

    fn rtos_extra_thread_info(&mut self, _thread_id: RegValue) -> Option<&str> {
        self.extra_info
    }

    fn rtos_get_thread_context(&mut self, thread_id: RegValue) -> Option<Context<'_>> {
        if self.valid_thread_id == Some(thread_id) {
            let mut ctx = Context::new();
            ctx.push_section(&mut self.thread_regs).unwrap();
            Some(ctx)
        } else {
            None
        }
    }

    fn rtos_is_thread_active(&mut self, thread_id: RegValue) -> bool {
        self.active_thread_id == Some(thread_id)
    }

    fn rtos_is_set_thread_state_supported(&self) -> bool {
        self.set_state_supported
    }

    fn rtos_set_thread_state(&mut self, thread_id: RegValue, state: ThreadState) {
        for (id, thread_state) in self.thread_states.iter_mut() {
            let frozen_match = thread_id == gdbmon::ALL_FROZEN_THREADS
                && *thread_state == ThreadState::Frozen;
            if thread_id == ALL_THREADS || thread_id == *id || frozen_match {
                *thread_state = state;
            }
        }
    }

    fn rtos_restore_prev_thread_state(&mut self) {
        self.restore_state_count += 1;
    }
}

/// A monitor wired to the mocks, already initialized.
pub fn mock_monitor() -> Monitor<MockComm, MockPlatform> {
    let mut monitor = Monitor::new(MockComm::new(), MockPlatform::new());
    monitor.init("MRI_UART_MBED_USB").unwrap();
    monitor
}

/// Queues `chunks`, takes one debug trap with a four register context and
/// returns the register values GDB may have modified.
pub fn run_session(
    monitor: &mut Monitor<MockComm, MockPlatform>,
    chunks: &[&str],
) -> [RegValue; 4] {
    let mut registers: [RegValue; 4] = [0x11111111, 0x22222222, 0x33333333, 0x44444444];
    run_session_with_registers(monitor, chunks, &mut registers);
    registers
}

pub fn run_session_with_registers(
    monitor: &mut Monitor<MockComm, MockPlatform>,
    chunks: &[&str],
    registers: &mut [RegValue; 4],
) {
    monitor.comm_mut().receive_checksummed(chunks);
    let mut ctx = Context::new();
    ctx.push_section(registers).unwrap();
    monitor.debug_exception(&mut ctx).unwrap();
}

/// Hex of one register value in host byte order, as `g`/`G` carry it.
pub fn register_hex(value: RegValue) -> String {
    let mut text = String::new();
    for byte in value.to_ne_bytes().iter() {
        text.push_str(&format!("{:02x}", byte));
    }
    text
}
