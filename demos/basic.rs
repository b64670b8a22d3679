//! This example shows basic usage of a TCP-based debug monitor session.
//!
//! A tiny simulated target sits in an endless trap loop: every iteration of
//! `main` is one "debug exception", during which the connected GDB can poke
//! at registers and memory, set its fiction of breakpoints, and continue.
//!
//! Try it with:
//!
//! ```text
//! $ cargo run --example basic
//! $ gdb -ex 'target remote 127.0.0.1:9001'
//! ```

extern crate env_logger;
extern crate gdbmon;

use std::net::TcpListener;

use gdbmon::{
    Context, Exception, InstructionType, Monitor, PacketBuffer, Platform, RegValue, Token,
    TrapReason, WatchpointType, SIGTRAP,
};

const MEMORY_BASE: RegValue = 0x2000_0000;
const CODE_BASE: RegValue = 0x1000_0000;

/// This struct implements the monitor's view of our simulated target.
struct SimTarget {
    memory: Vec<u8>,
    pc: RegValue,
    single_stepping: bool,
    fault: bool,
}

impl SimTarget {
    fn new() -> SimTarget {
        SimTarget {
            memory: vec![0x90; 256],
            pc: CODE_BASE,
            single_stepping: false,
            fault: false,
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
}

impl Platform for SimTarget {
    fn init(&mut self, _tokens: &Token) -> Result<(), Exception> {
        Ok(())
    }

    fn packet_buffer_size(&self) -> usize {
        512
    }

    fn entering_debugger(&mut self) {}
    fn leaving_debugger(&mut self) {}

    fn mem_read8(&mut self, address: RegValue) -> u8 {
        self.slot(address, 1).map_or(0, |o| self.memory[o])
    }

    fn mem_read16(&mut self, address: RegValue) -> u16 {
        let mut bytes = [0; 2];
        if let Some(o) = self.slot(address, 2) {
            bytes.copy_from_slice(&self.memory[o..o + 2]);
        }
        u16::from_ne_bytes(bytes)
    }

    fn mem_read32(&mut self, address: RegValue) -> u32 {
        let mut bytes = [0; 4];
        if let Some(o) = self.slot(address, 4) {
            bytes.copy_from_slice(&self.memory[o..o + 4]);
        }
        u32::from_ne_bytes(bytes)
    }

    fn mem_read64(&mut self, address: RegValue) -> u64 {
        let mut bytes = [0; 8];
        if let Some(o) = self.slot(address, 8) {
            bytes.copy_from_slice(&self.memory[o..o + 8]);
        }
        u64::from_ne_bytes(bytes)
    }

    fn mem_write8(&mut self, address: RegValue, value: u8) {
        if let Some(o) = self.slot(address, 1) {
            self.memory[o] = value;
        }
    }

    fn mem_write16(&mut self, address: RegValue, value: u16) {
        if let Some(o) = self.slot(address, 2) {
            self.memory[o..o + 2].copy_from_slice(&value.to_ne_bytes());
        }
    }

    fn mem_write32(&mut self, address: RegValue, value: u32) {
        if let Some(o) = self.slot(address, 4) {
            self.memory[o..o + 4].copy_from_slice(&value.to_ne_bytes());
        }
    }

    fn mem_write64(&mut self, address: RegValue, value: u64) {
        if let Some(o) = self.slot(address, 8) {
            self.memory[o..o + 8].copy_from_slice(&value.to_ne_bytes());
        }
    }

    fn was_memory_fault_encountered(&mut self) -> bool {
        std::mem::replace(&mut self.fault, false)
    }

    fn determine_cause_of_exception(&mut self) -> u8 {
        SIGTRAP
    }

    fn trap_reason(&mut self) -> TrapReason {
        TrapReason::unknown()
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
        self.pc += 4;
    }

    fn was_program_counter_modified_by_user(&mut self) -> bool {
        false
    }

    fn write_t_response_registers(&mut self, buffer: &mut PacketBuffer) -> Result<(), Exception> {
        buffer.write_string("0f:")?;
        for &byte in self.pc.to_ne_bytes().iter() {
            buffer.write_byte_as_hex(byte)?;
        }
        buffer.write_char(b';')
    }

    fn memory_map_xml(&self) -> &[u8] {
        br#"<?xml version="1.0"?><memory-map><memory type="ram" start="0x20000000" length="0x100"/></memory-map>"#
    }

    fn set_hardware_breakpoint_of_gdb_kind(
        &mut self,
        _address: RegValue,
        _kind: RegValue,
    ) -> Result<(), Exception> {
        Ok(())
    }

    fn set_hardware_breakpoint(&mut self, _address: RegValue) -> Result<(), Exception> {
        Ok(())
    }

    fn clear_hardware_breakpoint_of_gdb_kind(
        &mut self,
        _address: RegValue,
        _kind: RegValue,
    ) -> Result<(), Exception> {
        Ok(())
    }

    fn clear_hardware_breakpoint(&mut self, _address: RegValue) -> Result<(), Exception> {
        Ok(())
    }

    fn set_hardware_watchpoint(
        &mut self,
        _address: RegValue,
        _size: RegValue,
        _watchpoint: WatchpointType,
    ) -> Result<(), Exception> {
        Err(Exception::ExceededHardwareResources)
    }

    fn clear_hardware_watchpoint(
        &mut self,
        _address: RegValue,
        _size: RegValue,
        _watchpoint: WatchpointType,
    ) -> Result<(), Exception> {
        Ok(())
    }

    fn type_of_current_instruction(&mut self) -> InstructionType {
        InstructionType::Other
    }
}

fn main() {
    env_logger::init();

    // Wait for GDB connection:
    let (stream, addr) = TcpListener::bind("127.0.0.1:9001").unwrap().accept().unwrap();
    println!("Incoming Connection from {}", addr);

    let mut monitor = Monitor::new(stream, SimTarget::new());
    monitor.init("SIM_TARGET").unwrap();

    // r0-r12, sp, lr, pc, xpsr of a make-believe Cortex-M.
    let mut registers: [RegValue; 17] = [0; 17];
    loop {
        registers[15] = monitor.platform().pc;

        let mut ctx = Context::new();
        ctx.push_section(&mut registers).unwrap();
        if let Err(e) = monitor.debug_exception(&mut ctx) {
            eprintln!("Lost debugger connection: {}", e);
            break;
        }
        drop(ctx);

        // The "program" runs: a few instructions pass, then the next trap.
        monitor.platform_mut().pc = registers[15] + 8;
    }
}
