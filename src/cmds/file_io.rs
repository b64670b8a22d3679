//! GDB file-I/O: issuing `F<call>` requests on behalf of a semihost trap and
//! handling the host's `F<ret>[,<errno>[,C]]` reply.
//!
//! After a request packet goes out, the regular command loop keeps running:
//! the host typically reads or writes target memory (to fetch a filename or
//! deposit read data) before answering, and those are ordinary `m`/`M`/`X`
//! packets. The loop unwinds once the `F` reply arrives.

use crate::cmds::HandlerFlags;
use crate::comm::Comm;
use crate::context::{Context, RegValue};
use crate::error::Error;
use crate::platform::Platform;
use crate::{Monitor, MonitorFlags};

/// `errno` value by which the host reports an interrupted call.
pub(crate) const EINTR: i32 = 4;

/// Open flag and permission constants of GDB's file-I/O protocol. These are
/// protocol constants, not the host's nor the target's libc values.
pub(crate) mod fileio {
    pub const O_RDONLY: u32 = 0x0;
    pub const O_WRONLY: u32 = 0x1;
    pub const O_RDWR: u32 = 0x2;
    pub const O_APPEND: u32 = 0x8;
    pub const O_CREAT: u32 = 0x200;
    pub const O_TRUNC: u32 = 0x400;

    pub const S_IRUSR: u32 = 0o400;
    pub const S_IWUSR: u32 = 0o200;
    pub const S_IRGRP: u32 = 0o40;
    pub const S_IWGRP: u32 = 0o20;
    pub const S_IROTH: u32 = 0o4;
    pub const S_IWOTH: u32 = 0o2;

    pub const SEEK_SET: u32 = 0;

    /// Byte offset of the lower word of `st_size` in GDB's big-endian
    /// `struct stat` wire layout.
    pub const STAT_SIZE_LOWER_WORD_OFFSET: u64 = 32;
}

pub(crate) struct OpenParameters {
    pub filename_address: RegValue,
    pub filename_length: RegValue,
    pub flags: RegValue,
    pub mode: RegValue,
}

pub(crate) struct TransferParameters {
    pub file_descriptor: RegValue,
    pub buffer_address: RegValue,
    pub buffer_size: RegValue,
}

pub(crate) struct SeekParameters {
    pub file_descriptor: RegValue,
    pub offset: RegValue,
    pub whence: RegValue,
}

pub(crate) struct RemoveParameters {
    pub filename_address: RegValue,
    pub filename_length: RegValue,
}

pub(crate) struct StatParameters {
    pub filename_address: RegValue,
    pub filename_length: RegValue,
    pub stat_buffer_address: RegValue,
}

pub(crate) struct RenameParameters {
    pub orig_filename_address: RegValue,
    pub orig_filename_length: RegValue,
    pub new_filename_address: RegValue,
    pub new_filename_length: RegValue,
}

impl<C: Comm, P: Platform> Monitor<C, P> {
    pub(crate) fn issue_gdb_file_open_request(
        &mut self,
        ctx: &mut Context<'_>,
        parameters: &OpenParameters,
    ) -> Result<bool, Error> {
        self.buf.init();
        let _ = self.buf.write_string("Fopen,");
        let _ = self.buf.write_uint_as_hex(parameters.filename_address);
        let _ = self.buf.write_char(b'/');
        // Account for the NUL terminator GDB expects to fetch as well.
        let _ = self.buf.write_uint_as_hex(parameters.filename_length + 1);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(parameters.flags);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(parameters.mode);
        self.send_request_and_wait_for_reply(ctx)
    }

    pub(crate) fn issue_gdb_file_write_request(
        &mut self,
        ctx: &mut Context<'_>,
        parameters: &TransferParameters,
    ) -> Result<bool, Error> {
        self.issue_transfer_request(ctx, "Fwrite,", parameters)
    }

    pub(crate) fn issue_gdb_file_read_request(
        &mut self,
        ctx: &mut Context<'_>,
        parameters: &TransferParameters,
    ) -> Result<bool, Error> {
        self.issue_transfer_request(ctx, "Fread,", parameters)
    }

    fn issue_transfer_request(
        &mut self,
        ctx: &mut Context<'_>,
        request: &str,
        parameters: &TransferParameters,
    ) -> Result<bool, Error> {
        self.buf.init();
        let _ = self.buf.write_string(request);
        let _ = self.buf.write_uint_as_hex(parameters.file_descriptor);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(parameters.buffer_address);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(parameters.buffer_size);
        self.send_request_and_wait_for_reply(ctx)
    }

    pub(crate) fn issue_gdb_file_close_request(
        &mut self,
        ctx: &mut Context<'_>,
        file_descriptor: RegValue,
    ) -> Result<bool, Error> {
        self.buf.init();
        let _ = self.buf.write_string("Fclose,");
        let _ = self.buf.write_uint_as_hex(file_descriptor);
        self.send_request_and_wait_for_reply(ctx)
    }

    pub(crate) fn issue_gdb_file_seek_request(
        &mut self,
        ctx: &mut Context<'_>,
        parameters: &SeekParameters,
    ) -> Result<bool, Error> {
        self.buf.init();
        let _ = self.buf.write_string("Flseek,");
        let _ = self.buf.write_uint_as_hex(parameters.file_descriptor);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(parameters.offset);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(parameters.whence);
        self.send_request_and_wait_for_reply(ctx)
    }

    pub(crate) fn issue_gdb_file_fstat_request(
        &mut self,
        ctx: &mut Context<'_>,
        file_descriptor: RegValue,
        stat_buffer_address: RegValue,
    ) -> Result<bool, Error> {
        self.buf.init();
        let _ = self.buf.write_string("Ffstat,");
        let _ = self.buf.write_uint_as_hex(file_descriptor);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(stat_buffer_address);
        self.send_request_and_wait_for_reply(ctx)
    }

    pub(crate) fn issue_gdb_file_unlink_request(
        &mut self,
        ctx: &mut Context<'_>,
        parameters: &RemoveParameters,
    ) -> Result<bool, Error> {
        self.buf.init();
        let _ = self.buf.write_string("Funlink,");
        let _ = self.buf.write_uint_as_hex(parameters.filename_address);
        let _ = self.buf.write_char(b'/');
        let _ = self.buf.write_uint_as_hex(parameters.filename_length + 1);
        self.send_request_and_wait_for_reply(ctx)
    }

    pub(crate) fn issue_gdb_file_stat_request(
        &mut self,
        ctx: &mut Context<'_>,
        parameters: &StatParameters,
    ) -> Result<bool, Error> {
        self.buf.init();
        let _ = self.buf.write_string("Fstat,");
        let _ = self.buf.write_uint_as_hex(parameters.filename_address);
        let _ = self.buf.write_char(b'/');
        let _ = self.buf.write_uint_as_hex(parameters.filename_length + 1);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(parameters.stat_buffer_address);
        self.send_request_and_wait_for_reply(ctx)
    }

    pub(crate) fn issue_gdb_file_rename_request(
        &mut self,
        ctx: &mut Context<'_>,
        parameters: &RenameParameters,
    ) -> Result<bool, Error> {
        self.buf.init();
        let _ = self.buf.write_string("Frename,");
        let _ = self.buf.write_uint_as_hex(parameters.orig_filename_address);
        let _ = self.buf.write_char(b'/');
        let _ = self.buf.write_uint_as_hex(parameters.orig_filename_length + 1);
        let _ = self.buf.write_char(b',');
        let _ = self.buf.write_uint_as_hex(parameters.new_filename_address);
        let _ = self.buf.write_char(b'/');
        let _ = self.buf.write_uint_as_hex(parameters.new_filename_length + 1);
        self.send_request_and_wait_for_reply(ctx)
    }

    /// Ships the request assembled in the buffer and services host commands
    /// until the `F` reply unwinds the loop. Returns whether the call
    /// completed (false means it was cancelled by Ctrl-C and the trapping
    /// instruction must run again).
    fn send_request_and_wait_for_reply(&mut self, ctx: &mut Context<'_>) -> Result<bool, Error> {
        self.send_packet()?;
        self.gdb_command_loop(ctx)?;

        if self.was_semihost_call_cancelled() {
            debug!("semihost call cancelled by host");
            return Ok(false);
        }
        self.flag_semihost_call_as_handled();
        Ok(true)
    }

    pub(crate) fn was_semihost_call_cancelled(&self) -> bool {
        self.flags.contains(MonitorFlags::SEMIHOST_CTRL_C) && self.semihost_errno == EINTR
    }

    pub(crate) fn flag_semihost_call_as_handled(&mut self) {
        self.platform.advance_program_counter_to_next_instruction();
        self.platform
            .set_semihost_return_and_errno_values(self.semihost_return_code, self.semihost_errno);
    }

    /// `F<ret>[,<errno>[,C]]`: the host's answer to an outstanding file-I/O
    /// request. Recording the values and resuming unwinds back into
    /// [`send_request_and_wait_for_reply`].
    pub(crate) fn handle_file_io_reply(&mut self) -> Result<HandlerFlags, Error> {
        let return_code = self.buf.read_int_as_hex().unwrap_or(-1);
        let mut err = 0;
        let mut ctrl_c = false;
        if self.buf.is_next_char_equal_to(b',').unwrap_or(false) {
            err = self.buf.read_int_as_hex().unwrap_or(0);
            if self.buf.is_next_char_equal_to(b',').unwrap_or(false) {
                ctrl_c = self.buf.is_next_char_equal_to(b'C').unwrap_or(false);
            }
        }

        self.semihost_return_code = return_code;
        self.semihost_errno = err;
        self.flags.set(MonitorFlags::SEMIHOST_CTRL_C, ctrl_c);
        Ok(HandlerFlags::RESUME_PROGRAM | HandlerFlags::RETURN_IMMEDIATELY)
    }
}
