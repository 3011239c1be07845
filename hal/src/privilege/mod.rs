//! # Privilege Levels
//!
//! Trap delegation to S-mode and the one-way switch out of M-mode.

pub mod delegation;
pub mod switch;

pub use delegation::TrapDelegation;
pub use switch::{hang, switch_mode};

use core::fmt;

/// RISC-V privilege mode, as encoded in mstatus.MPP
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum PrivilegeMode {
    /// User mode
    User = 0,
    /// Supervisor mode
    Supervisor = 1,
    /// Machine mode
    Machine = 3,
}

impl PrivilegeMode {
    /// misa letter the mode depends on, `None` for M-mode
    pub const fn required_extension(self) -> Option<char> {
        match self {
            Self::User => Some('U'),
            Self::Supervisor => Some('S'),
            Self::Machine => None,
        }
    }
}

impl TryFrom<usize> for PrivilegeMode {
    type Error = usize;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::User),
            1 => Ok(Self::Supervisor),
            3 => Ok(Self::Machine),
            other => Err(other),
        }
    }
}

impl fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "U-mode"),
            Self::Supervisor => write!(f, "S-mode"),
            Self::Machine => write!(f, "M-mode"),
        }
    }
}
