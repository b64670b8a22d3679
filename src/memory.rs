//! Fault-tolerant target memory access for the `m`/`M`/`X` commands.
//!
//! GDB encodes the intended access width in the length argument: a length of
//! 2, 4 or 8 on a naturally aligned address is performed as one machine
//! transfer of that width, because many MMIO registers only tolerate a
//! specific one. Everything else falls back to byte-at-a-time so the monitor
//! itself never takes an alignment fault. After every unit the platform's
//! sticky fault flag is checked; reads stop and report what they got,
//! writes fail with `MemFault`.

use byteorder::{ByteOrder, NativeEndian};

use crate::buffer::PacketBuffer;
use crate::context::RegValue;
use crate::error::Exception;
use crate::platform::Platform;

pub(crate) fn read_memory_into_hex_buffer<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
    read_byte_count: RegValue,
) -> Result<RegValue, Exception> {
    match read_byte_count {
        2 => read_half_word(platform, buffer, address),
        4 => read_word(platform, buffer, address),
        8 => read_double_word(platform, buffer, address),
        _ => read_bytes(platform, buffer, address, read_byte_count),
    }
}

fn read_bytes<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    mut address: RegValue,
    mut read_byte_count: RegValue,
) -> Result<RegValue, Exception> {
    let mut bytes_read = 0;
    while read_byte_count > 0 {
        let byte = platform.mem_read8(address);
        if platform.was_memory_fault_encountered() {
            break;
        }
        buffer.write_byte_as_hex(byte)?;
        address += 1;
        read_byte_count -= 1;
        bytes_read += 1;
    }
    Ok(bytes_read)
}

fn write_value_as_hex(buffer: &mut PacketBuffer, value: &[u8]) -> Result<(), Exception> {
    for &byte in value {
        buffer.write_byte_as_hex(byte)?;
    }
    Ok(())
}

fn read_half_word<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
) -> Result<RegValue, Exception> {
    if address & 1 != 0 {
        return read_bytes(platform, buffer, address, 2);
    }
    let value = platform.mem_read16(address);
    if platform.was_memory_fault_encountered() {
        return Ok(0);
    }
    let mut bytes = [0u8; 2];
    NativeEndian::write_u16(&mut bytes, value);
    write_value_as_hex(buffer, &bytes)?;
    Ok(2)
}

fn read_word<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
) -> Result<RegValue, Exception> {
    if address & 3 != 0 {
        return read_bytes(platform, buffer, address, 4);
    }
    let value = platform.mem_read32(address);
    if platform.was_memory_fault_encountered() {
        return Ok(0);
    }
    let mut bytes = [0u8; 4];
    NativeEndian::write_u32(&mut bytes, value);
    write_value_as_hex(buffer, &bytes)?;
    Ok(4)
}

fn read_double_word<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
) -> Result<RegValue, Exception> {
    if std::mem::size_of::<RegValue>() < 8 || address & 7 != 0 {
        return read_bytes(platform, buffer, address, 8);
    }
    let value = platform.mem_read64(address);
    if platform.was_memory_fault_encountered() {
        return Ok(0);
    }
    let mut bytes = [0u8; 8];
    NativeEndian::write_u64(&mut bytes, value);
    write_value_as_hex(buffer, &bytes)?;
    Ok(8)
}

pub(crate) fn write_hex_buffer_to_memory<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
    write_byte_count: RegValue,
) -> Result<(), Exception> {
    write_buffer_to_memory(platform, buffer, address, write_byte_count, PacketBuffer::read_byte_as_hex)
}

/// Binary (`X` command) variant: payload bytes are raw, with `}` as the
/// escape prefix and the following byte xor 0x20 giving the literal.
pub(crate) fn write_binary_buffer_to_memory<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
    write_byte_count: RegValue,
) -> Result<(), Exception> {
    write_buffer_to_memory(platform, buffer, address, write_byte_count, read_unescaped_char)
}

fn read_unescaped_char(buffer: &mut PacketBuffer) -> Result<u8, Exception> {
    let character = buffer.read_char()?;
    if character == b'}' {
        Ok(buffer.read_char()? ^ 0x20)
    } else {
        Ok(character)
    }
}

fn write_buffer_to_memory<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
    write_byte_count: RegValue,
    next_byte: fn(&mut PacketBuffer) -> Result<u8, Exception>,
) -> Result<(), Exception> {
    match write_byte_count {
        2 => write_half_word(platform, buffer, address, next_byte),
        4 => write_word(platform, buffer, address, next_byte),
        8 => write_double_word(platform, buffer, address, next_byte),
        _ => write_bytes(platform, buffer, address, write_byte_count, next_byte),
    }
}

fn write_bytes<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    mut address: RegValue,
    mut write_byte_count: RegValue,
    next_byte: fn(&mut PacketBuffer) -> Result<u8, Exception>,
) -> Result<(), Exception> {
    while write_byte_count > 0 {
        let byte = next_byte(buffer)?;
        platform.mem_write8(address, byte);
        if platform.was_memory_fault_encountered() {
            return Err(Exception::MemFault);
        }
        address += 1;
        write_byte_count -= 1;
    }
    Ok(())
}

fn fill_value<const N: usize>(
    buffer: &mut PacketBuffer,
    next_byte: fn(&mut PacketBuffer) -> Result<u8, Exception>,
) -> Result<[u8; N], Exception> {
    let mut bytes = [0u8; N];
    for byte in bytes.iter_mut() {
        *byte = next_byte(buffer)?;
    }
    Ok(bytes)
}

fn write_half_word<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
    next_byte: fn(&mut PacketBuffer) -> Result<u8, Exception>,
) -> Result<(), Exception> {
    if address & 1 != 0 {
        return write_bytes(platform, buffer, address, 2, next_byte);
    }
    let bytes = fill_value::<2>(buffer, next_byte)?;
    platform.mem_write16(address, NativeEndian::read_u16(&bytes));
    if platform.was_memory_fault_encountered() {
        return Err(Exception::MemFault);
    }
    Ok(())
}

fn write_word<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
    next_byte: fn(&mut PacketBuffer) -> Result<u8, Exception>,
) -> Result<(), Exception> {
    if address & 3 != 0 {
        return write_bytes(platform, buffer, address, 4, next_byte);
    }
    let bytes = fill_value::<4>(buffer, next_byte)?;
    platform.mem_write32(address, NativeEndian::read_u32(&bytes));
    if platform.was_memory_fault_encountered() {
        return Err(Exception::MemFault);
    }
    Ok(())
}

fn write_double_word<P: Platform>(
    platform: &mut P,
    buffer: &mut PacketBuffer,
    address: RegValue,
    next_byte: fn(&mut PacketBuffer) -> Result<u8, Exception>,
) -> Result<(), Exception> {
    if std::mem::size_of::<RegValue>() < 8 || address & 7 != 0 {
        return write_bytes(platform, buffer, address, 8, next_byte);
    }
    let bytes = fill_value::<8>(buffer, next_byte)?;
    platform.mem_write64(address, NativeEndian::read_u64(&bytes));
    if platform.was_memory_fault_encountered() {
        return Err(Exception::MemFault);
    }
    Ok(())
}
