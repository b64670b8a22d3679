//! Interception of semihost traps so the host debugger never sees them.
//!
//! When the halted program trapped on a semihost call (a newlib syscall stub
//! or an mbed LocalFileSystem request), the monitor completes the call
//! itself, either locally or by forwarding it as a GDB file-I/O request, and
//! lets the program continue as if nothing happened.

use crate::cmds::file_io::{
    fileio, OpenParameters, RemoveParameters, RenameParameters, SeekParameters, StatParameters,
    TransferParameters,
};
use crate::comm::Comm;
use crate::context::{Context, RegValue};
use crate::error::Error;
use crate::platform::{InstructionType, NewlibOp, Platform, SemihostParameters};
use crate::Monitor;

// mbed LocalFileSystem operation codes.
const MBED_OP_OPEN: RegValue = 1;
const MBED_OP_CLOSE: RegValue = 2;
const MBED_OP_WRITE: RegValue = 5;
const MBED_OP_READ: RegValue = 6;
const MBED_OP_ISTTY: RegValue = 9;
const MBED_OP_SEEK: RegValue = 10;
const MBED_OP_FLEN: RegValue = 12;
const MBED_OP_REMOVE: RegValue = 14;
const MBED_OP_RENAME: RegValue = 15;
const MBED_OP_ERRNO: RegValue = 19;
const MBED_OP_UID: RegValue = 257;

impl<C: Comm, P: Platform> Monitor<C, P> {
    pub(crate) fn is_debuggee_making_semihost_call(&mut self) -> bool {
        matches!(
            self.platform.type_of_current_instruction(),
            InstructionType::MbedSemihostCall | InstructionType::NewlibSemihostCall
        )
    }

    /// Returns whether the trap was fully dealt with; a `false` drops the
    /// host into a regular debug session instead.
    pub(crate) fn handle_semihost_request(
        &mut self,
        ctx: &mut Context<'_>,
    ) -> Result<bool, Error> {
        let parameters = self.platform.semihost_call_parameters();
        match self.platform.type_of_current_instruction() {
            InstructionType::NewlibSemihostCall => self.handle_newlib_request(ctx, &parameters),
            InstructionType::MbedSemihostCall => self.handle_mbed_request(ctx, &parameters),
            _ => Ok(false),
        }
    }

    fn handle_newlib_request(
        &mut self,
        ctx: &mut Context<'_>,
        p: &SemihostParameters,
    ) -> Result<bool, Error> {
        let operation = match self.platform.newlib_semihost_operation() {
            Some(operation) => operation,
            None => return Ok(false),
        };
        trace!("newlib semihost request: {:?}", operation);

        match operation {
            NewlibOp::Write => self.issue_gdb_file_write_request(
                ctx,
                &TransferParameters {
                    file_descriptor: p.parameter1,
                    buffer_address: p.parameter2,
                    buffer_size: p.parameter3,
                },
            ),
            NewlibOp::Read => self.issue_gdb_file_read_request(
                ctx,
                &TransferParameters {
                    file_descriptor: p.parameter1,
                    buffer_address: p.parameter2,
                    buffer_size: p.parameter3,
                },
            ),
            NewlibOp::Open => self.issue_gdb_file_open_request(
                ctx,
                &OpenParameters {
                    filename_address: p.parameter1,
                    filename_length: p.parameter2,
                    flags: p.parameter3,
                    mode: p.parameter4,
                },
            ),
            NewlibOp::Unlink => self.issue_gdb_file_unlink_request(
                ctx,
                &RemoveParameters {
                    filename_address: p.parameter1,
                    filename_length: p.parameter2,
                },
            ),
            NewlibOp::Seek => self.issue_gdb_file_seek_request(
                ctx,
                &SeekParameters {
                    file_descriptor: p.parameter1,
                    offset: p.parameter2,
                    whence: p.parameter3,
                },
            ),
            NewlibOp::Close => self.issue_gdb_file_close_request(ctx, p.parameter1),
            NewlibOp::FStat => self.issue_gdb_file_fstat_request(ctx, p.parameter1, p.parameter2),
            NewlibOp::Stat => self.issue_gdb_file_stat_request(
                ctx,
                &StatParameters {
                    filename_address: p.parameter1,
                    filename_length: p.parameter2,
                    stat_buffer_address: p.parameter3,
                },
            ),
            NewlibOp::Rename => self.issue_gdb_file_rename_request(
                ctx,
                &RenameParameters {
                    orig_filename_address: p.parameter1,
                    orig_filename_length: p.parameter2,
                    new_filename_address: p.parameter3,
                    new_filename_length: p.parameter4,
                },
            ),
            NewlibOp::Errno => {
                // The stub only wants the errno of the previous call.
                self.semihost_return_code = self.semihost_errno;
                self.semihost_errno = 0;
                self.flag_semihost_call_as_handled();
                Ok(true)
            }
        }
    }

    /// mbed semihost calls carry their operation code in the first parameter
    /// and a pointer to an argument block in target memory in the second.
    fn handle_mbed_request(
        &mut self,
        ctx: &mut Context<'_>,
        p: &SemihostParameters,
    ) -> Result<bool, Error> {
        let block = p.parameter2;
        trace!("mbed semihost request: op {}", p.parameter1);

        match p.parameter1 {
            MBED_OP_OPEN => self.handle_mbed_open_request(ctx, block),
            MBED_OP_CLOSE => match self.read_target_word(block) {
                Some(fd) => self.issue_gdb_file_close_request(ctx, fd as RegValue),
                None => Ok(false),
            },
            MBED_OP_WRITE => self.handle_mbed_transfer_request(ctx, block, true),
            MBED_OP_READ => self.handle_mbed_transfer_request(ctx, block, false),
            MBED_OP_ISTTY => {
                // Report non-TTY so the C library buffers these handles.
                self.platform.advance_program_counter_to_next_instruction();
                self.platform.set_semihost_return_and_errno_values(0, 0);
                Ok(true)
            }
            MBED_OP_SEEK => self.handle_mbed_seek_request(ctx, block),
            MBED_OP_FLEN => self.handle_mbed_file_length_request(ctx, block),
            MBED_OP_REMOVE => self.handle_mbed_remove_request(ctx, block),
            MBED_OP_RENAME => self.handle_mbed_rename_request(ctx, block),
            MBED_OP_ERRNO => {
                let err = self.semihost_errno;
                self.platform.advance_program_counter_to_next_instruction();
                self.platform.set_semihost_return_and_errno_values(err, 0);
                Ok(true)
            }
            MBED_OP_UID => self.handle_mbed_uid_request(block),
            _ => Ok(false),
        }
    }

    fn read_target_word(&mut self, address: RegValue) -> Option<u32> {
        let value = self.platform.mem_read32(address);
        if self.platform.was_memory_fault_encountered() {
            None
        } else {
            Some(value)
        }
    }

    fn handle_mbed_open_request(
        &mut self,
        ctx: &mut Context<'_>,
        block: RegValue,
    ) -> Result<bool, Error> {
        let (filename_address, open_mode, filename_length) = match (
            self.read_target_word(block),
            self.read_target_word(block + 4),
            self.read_target_word(block + 8),
        ) {
            (Some(a), Some(m), Some(l)) => (a, m, l),
            _ => return Ok(false),
        };

        self.issue_gdb_file_open_request(
            ctx,
            &OpenParameters {
                filename_address: filename_address as RegValue,
                filename_length: filename_length as RegValue,
                flags: convert_realview_open_mode_to_posix_flags(open_mode) as RegValue,
                mode: (fileio::S_IRUSR
                    | fileio::S_IWUSR
                    | fileio::S_IRGRP
                    | fileio::S_IWGRP
                    | fileio::S_IROTH
                    | fileio::S_IWOTH) as RegValue,
            },
        )
    }

    fn handle_mbed_transfer_request(
        &mut self,
        ctx: &mut Context<'_>,
        block: RegValue,
        write: bool,
    ) -> Result<bool, Error> {
        let (fd, address, size) = match (
            self.read_target_word(block),
            self.read_target_word(block + 4),
            self.read_target_word(block + 8),
        ) {
            (Some(f), Some(a), Some(s)) => (f, a, s),
            _ => return Ok(false),
        };
        let parameters = TransferParameters {
            file_descriptor: fd as RegValue,
            buffer_address: address as RegValue,
            buffer_size: size as RegValue,
        };

        let handled = if write {
            self.issue_gdb_file_write_request(ctx, &parameters)?
        } else {
            self.issue_gdb_file_read_request(ctx, &parameters)?
        };
        if handled {
            // The mbed calls report bytes NOT transferred instead of bytes
            // transferred.
            let transferred = self.semihost_return_code;
            if transferred >= 0 {
                self.platform
                    .set_semihost_return_and_errno_values(size as i32 - transferred, 0);
            }
        }
        Ok(handled)
    }

    fn handle_mbed_seek_request(
        &mut self,
        ctx: &mut Context<'_>,
        block: RegValue,
    ) -> Result<bool, Error> {
        let (fd, offset) = match (self.read_target_word(block), self.read_target_word(block + 4)) {
            (Some(f), Some(o)) => (f, o),
            _ => return Ok(false),
        };
        self.issue_gdb_file_seek_request(
            ctx,
            &SeekParameters {
                file_descriptor: fd as RegValue,
                offset: offset as RegValue,
                whence: fileio::SEEK_SET as RegValue,
            },
        )
    }

    fn handle_mbed_file_length_request(
        &mut self,
        ctx: &mut Context<'_>,
        block: RegValue,
    ) -> Result<bool, Error> {
        let fd = match self.read_target_word(block) {
            Some(fd) => fd,
            None => return Ok(false),
        };
        let scratch = match self.platform.semihost_stat_scratch() {
            Some(scratch) => scratch,
            None => return Ok(false),
        };

        let handled = self.issue_gdb_file_fstat_request(ctx, fd as RegValue, scratch)?;
        if handled && self.semihost_return_code == 0 {
            // GDB deposited a big-endian struct stat; pull st_size out of it.
            let mut size: u32 = 0;
            for index in 0..4 {
                let byte = self
                    .platform
                    .mem_read8(scratch + fileio::STAT_SIZE_LOWER_WORD_OFFSET as RegValue + index);
                if self.platform.was_memory_fault_encountered() {
                    return Ok(handled);
                }
                size = (size << 8) | byte as u32;
            }
            self.platform
                .set_semihost_return_and_errno_values(size as i32, 0);
        }
        Ok(handled)
    }

    fn handle_mbed_remove_request(
        &mut self,
        ctx: &mut Context<'_>,
        block: RegValue,
    ) -> Result<bool, Error> {
        let (address, length) = match (self.read_target_word(block), self.read_target_word(block + 4)) {
            (Some(a), Some(l)) => (a, l),
            _ => return Ok(false),
        };
        self.issue_gdb_file_unlink_request(
            ctx,
            &RemoveParameters {
                filename_address: address as RegValue,
                filename_length: length as RegValue,
            },
        )
    }

    fn handle_mbed_rename_request(
        &mut self,
        ctx: &mut Context<'_>,
        block: RegValue,
    ) -> Result<bool, Error> {
        let fields = (
            self.read_target_word(block),
            self.read_target_word(block + 4),
            self.read_target_word(block + 8),
            self.read_target_word(block + 12),
        );
        let (orig_address, orig_length, new_address, new_length) = match fields {
            (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
            _ => return Ok(false),
        };
        self.issue_gdb_file_rename_request(
            ctx,
            &RenameParameters {
                orig_filename_address: orig_address as RegValue,
                orig_filename_length: orig_length as RegValue,
                new_filename_address: new_address as RegValue,
                new_filename_length: new_length as RegValue,
            },
        )
    }

    fn handle_mbed_uid_request(&mut self, block: RegValue) -> Result<bool, Error> {
        let (buffer_address, buffer_size) =
            match (self.read_target_word(block), self.read_target_word(block + 4)) {
                (Some(a), Some(s)) => (a, s),
                _ => return Ok(false),
            };

        let mut uid = [0u8; 64];
        let device_uid = self.platform.uid();
        let copy_size = device_uid.len().min(buffer_size as usize).min(uid.len());
        uid[..copy_size].copy_from_slice(&device_uid[..copy_size]);

        for (index, &byte) in uid[..copy_size].iter().enumerate() {
            self.platform.mem_write8(buffer_address as RegValue + index, byte);
            if self.platform.was_memory_fault_encountered() {
                return Ok(false);
            }
        }

        self.platform.advance_program_counter_to_next_instruction();
        self.platform.set_semihost_return_and_errno_values(0, 0);
        Ok(true)
    }
}

/// RealView-style open modes ("r", "w+", …, encoded as a small integer) to
/// GDB file-I/O open flags.
fn convert_realview_open_mode_to_posix_flags(open_mode: u32) -> u32 {
    const OPENMODE_PLUS: u32 = 2;
    const OPENMODE_W: u32 = 4;
    const OPENMODE_A: u32 = 8;

    let (mut access, disposition) = if open_mode & OPENMODE_W != 0 {
        (fileio::O_WRONLY, fileio::O_CREAT | fileio::O_TRUNC)
    } else if open_mode & OPENMODE_A != 0 {
        (fileio::O_WRONLY, fileio::O_CREAT | fileio::O_APPEND)
    } else {
        (fileio::O_RDONLY, 0)
    };
    if open_mode & OPENMODE_PLUS != 0 {
        access = fileio::O_RDWR;
    }
    access | disposition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realview_open_modes_map_to_posix_flags() {
        // "r"
        assert_eq!(convert_realview_open_mode_to_posix_flags(0), fileio::O_RDONLY);
        // "r+"
        assert_eq!(convert_realview_open_mode_to_posix_flags(2), fileio::O_RDWR);
        // "w"
        assert_eq!(
            convert_realview_open_mode_to_posix_flags(4),
            fileio::O_WRONLY | fileio::O_CREAT | fileio::O_TRUNC
        );
        // "w+"
        assert_eq!(
            convert_realview_open_mode_to_posix_flags(6),
            fileio::O_RDWR | fileio::O_CREAT | fileio::O_TRUNC
        );
        // "a"
        assert_eq!(
            convert_realview_open_mode_to_posix_flags(8),
            fileio::O_WRONLY | fileio::O_CREAT | fileio::O_APPEND
        );
    }
}
