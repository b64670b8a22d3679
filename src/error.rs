use std::error;
use std::fmt;

/// Recoverable failure codes used throughout the monitor.
///
/// The numeric discriminant of each code doubles as its severity. When two
/// failures collide (a recovery path failing while an earlier failure is
/// still being reported) the more severe code survives; see
/// [`Exception::escalate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Exception {
    /// A read or write ran past the end of a bounded buffer.
    BufferOverrun = 1,
    /// A character outside of `[0-9a-fA-F]` where a hex digit was required.
    InvalidHexDigit = 2,
    /// A number was expected but no digits (or an out-of-range one) was found.
    InvalidValue = 3,
    /// Missing separator, unknown sub-command or otherwise bad argument.
    InvalidArgument = 4,
    /// A hardware operation did not complete in time.
    Timeout = 5,
    /// An index was outside the valid range of a lookup table.
    InvalidIndex = 6,
    /// A searched-for item does not exist.
    NotFound = 7,
    /// No free hardware breakpoint/watchpoint comparator is left.
    ExceededHardwareResources = 8,
    /// A character outside of `[0-9]` where a decimal digit was required.
    InvalidDecDigit = 9,
    /// The target signalled a bus/memory fault during a monitor access.
    MemFault = 10,
}

/// `E<nn>` reply sent when a command carried a malformed argument.
pub const ERROR_INVALID_ARGUMENT: &str = "E01";
/// `E<nn>` reply sent when the hardware is out of breakpoint resources.
pub const ERROR_NO_FREE_BREAKPOINT: &str = "E02";
/// `E<nn>` reply sent when a memory access faulted.
pub const ERROR_MEMORY_ACCESS_FAILURE: &str = "E03";
/// `E<nn>` reply sent when a packet overran the shared buffer.
pub const ERROR_BUFFER_OVERRUN: &str = "E04";

impl Exception {
    /// Combines two failures, keeping the more severe one.
    pub fn escalate(self, other: Exception) -> Exception {
        self.max(other)
    }

    /// The `E<nn>` string reported to the debugger for this failure.
    pub(crate) fn error_response(self) -> &'static str {
        match self {
            Exception::BufferOverrun => ERROR_BUFFER_OVERRUN,
            Exception::MemFault => ERROR_MEMORY_ACCESS_FAILURE,
            Exception::Timeout | Exception::ExceededHardwareResources => ERROR_NO_FREE_BREAKPOINT,
            _ => ERROR_INVALID_ARGUMENT,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            Exception::BufferOverrun => "buffer overrun",
            Exception::InvalidHexDigit => "invalid hex digit",
            Exception::InvalidValue => "invalid value",
            Exception::InvalidArgument => "invalid argument",
            Exception::Timeout => "timeout",
            Exception::InvalidIndex => "invalid index",
            Exception::NotFound => "not found",
            Exception::ExceededHardwareResources => "exceeded hardware resources",
            Exception::InvalidDecDigit => "invalid decimal digit",
            Exception::MemFault => "memory fault",
        };
        f.write_str(msg)
    }
}

impl error::Error for Exception {}

/// The possible errors returned by this library.
///
/// Anything the debugger can recover from is answered on the wire with an
/// `E<nn>` packet and never surfaces here; only transport failures and a
/// failed [`init`](crate::Monitor::init) do.
#[derive(Debug)]
pub enum Error {
    /// Error during communication.
    Comm(Box<dyn error::Error + Send + Sync>),

    /// Monitor initialization failed; the monitor stays inert.
    Init(Exception),
}

impl Error {
    pub(crate) fn comm<E>(e: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Error::Comm(e.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Comm(e) => write!(f, "communication error: {}", e),
            Error::Init(e) => write!(f, "monitor initialization failed: {}", e),
        }
    }
}

impl error::Error for Error {}
