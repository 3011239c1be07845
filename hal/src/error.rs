//! # Error Types
//!
//! Errors returned by the hart layer to boot orchestration.
//!
//! Probe traps are not errors; they are consumed where they happen and turn
//! into absent features. What remains are conditions the caller has to
//! decide on: continue bringing up other harts, or abort the boot.

use core::fmt;

/// Result type of the hart layer
pub type Result<T> = core::result::Result<T, SbiError>;

/// Main error type of the hart layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbiError {
    /// Generic failure
    Failed,
    /// Operation not supported on this hart
    NotSupported,
    /// Invalid parameter, or hardware state that does not reflect a request
    InvalidParam,
    /// Access denied
    Denied,
    /// Invalid address
    InvalidAddress,
    /// Already set up
    AlreadyAvailable,
    /// Per-hart storage could not be allocated
    NoMemory,
    /// Operation issued in the wrong lifecycle state
    InvalidState,
}

impl SbiError {
    /// Numeric SBI error code
    pub const fn code(self) -> isize {
        match self {
            Self::Failed | Self::InvalidState => -1,
            Self::NotSupported => -2,
            Self::InvalidParam => -3,
            Self::Denied => -4,
            Self::InvalidAddress => -5,
            Self::AlreadyAvailable => -6,
            Self::NoMemory => -1006,
        }
    }
}

impl fmt::Display for SbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Failed => "operation failed",
            Self::NotSupported => "not supported",
            Self::InvalidParam => "invalid parameter",
            Self::Denied => "access denied",
            Self::InvalidAddress => "invalid address",
            Self::AlreadyAvailable => "already available",
            Self::NoMemory => "out of per-hart memory",
            Self::InvalidState => "invalid state",
        };
        write!(f, "{msg} ({})", self.code())
    }
}

/// PMP slot programming errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmpError {
    /// Slot index past the implemented PMP entries
    SlotOutOfRange {
        /// Requested slot
        slot: usize,
        /// Implemented entries
        count: usize,
    },
    /// NAPOT order not encodable (below 2, above XLEN, or below granularity)
    InvalidOrder {
        /// Requested log2 size
        order: u32,
    },
    /// Address beyond the implemented address bits
    AddressOutOfRange {
        /// Offending address
        base: usize,
    },
    /// NAPOT base not aligned to the region size
    Misaligned {
        /// Requested base
        base: usize,
        /// Requested log2 size
        order: u32,
    },
    /// TOR range ending before it starts
    InvalidRange {
        /// Range start
        start: usize,
        /// Range end
        end: usize,
    },
}

impl fmt::Display for PmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotOutOfRange { slot, count } => {
                write!(f, "pmp slot {slot} out of range ({count} implemented)")
            },
            Self::InvalidOrder { order } => write!(f, "pmp order {order} not encodable"),
            Self::AddressOutOfRange { base } => write!(f, "pmp address {base:#x} out of range"),
            Self::Misaligned { base, order } => {
                write!(f, "pmp base {base:#x} misaligned for order {order}")
            },
            Self::InvalidRange { start, end } => {
                write!(f, "pmp range {start:#x}..{end:#x} is inverted")
            },
        }
    }
}

impl From<PmpError> for SbiError {
    fn from(_: PmpError) -> Self {
        Self::InvalidParam
    }
}
