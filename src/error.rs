//! Crate-wide error and status types.
//!
//! Three tiers, matching the failure model: memory faults compose into VM
//! faults, VM faults and loader errors are `thiserror` errors propagated with
//! `?`, and HAL results are a plain value enum returned out of every
//! fallible HAL call (never a `Result`, since a HAL must never unwind).

use thiserror::Error;

/// Bounds/region violations raised by the memory model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("address range [{addr:#06x}, {addr:#06x}+{width}) is out of bounds or crosses a region boundary")]
    OutOfBounds { addr: u16, width: u8 },
    #[error("write to code segment at {addr:#06x} is forbidden")]
    CodeSegmentWrite { addr: u16 },
    #[error("string operation at {addr:#06x} exceeds max_capacity {max_capacity}")]
    StringCapacityExceeded { addr: u16, max_capacity: u16 },
}

/// Faults that halt the VM.
///
/// Each variant carries the information needed to render the corresponding
/// `"error"` debug event and the numeric code returned by `get_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VmFault {
    #[error("evaluation stack overflow")]
    StackOverflow,
    #[error("evaluation stack underflow")]
    StackUnderflow,
    #[error("division or modulo by zero")]
    DivByZero,
    #[error("invalid opcode {op:#04x} at pc {pc:#06x}")]
    InvalidOpcode { op: u8, pc: u16 },
    #[error("memory access fault: {0}")]
    OutOfBounds(#[from] MemoryError),
    #[error("call stack overflow")]
    CallOverflow,
    #[error("jump to invalid address {target:#06x}")]
    InvalidJump { target: u16 },
    #[error("watchdog budget exhausted")]
    Watchdog,
}

impl VmFault {
    /// Stable numeric fault code, used by `get_error` and the debug stream.
    pub fn code(&self) -> i32 {
        match self {
            VmFault::StackOverflow => -1,
            VmFault::StackUnderflow => -2,
            VmFault::DivByZero => -3,
            VmFault::InvalidOpcode { .. } => -4,
            VmFault::OutOfBounds(_) => -5,
            VmFault::CallOverflow => -6,
            VmFault::InvalidJump { .. } => -7,
            VmFault::Watchdog => -8,
        }
    }
}

/// Loader rejection reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("bad magic number")]
    BadMagic,
    #[error("incompatible version {major}.{minor}")]
    IncompatibleVersion { major: u16, minor: u16 },
    #[error("code segment of {size} bytes exceeds the code region")]
    CodeTooLarge { size: u32 },
    #[error("artifact truncated before {expected} bytes were read")]
    Truncated { expected: u32 },
    #[error("CRC32 checksum mismatch")]
    ChecksumMismatch,
}

/// Uniform HAL result code. Never thrown or unwound; every HAL trait method
/// returns this by value (or it wraps a useful payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalStatus {
    Ok,
    Error,
    Timeout,
    Busy,
    NotImplemented,
}

impl HalStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, HalStatus::Ok)
    }
}
