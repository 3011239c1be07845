//! # CSR Probing
//!
//! The ISA offers no way to ask whether a CSR exists other than touching it.
//! The guarded accessors of [`CsrAccess`] install a one-shot expected-trap
//! handler around the access; an illegal-instruction or access fault is
//! captured into a [`TrapInfo`] and execution resumes after the faulting
//! instruction.
//!
//! On top of that this module provides the two probing patterns used by
//! feature detection:
//!
//! - [`probe_present`]: read, then write back the same value
//! - [`probe_family`]: count the implemented prefix of a contiguous CSR
//!   family (pmpaddrN, mhpmcounterN) with an exponential then binary search

use super::CsrAccess;

// ============================================================================
// Trap Information
// ============================================================================

/// State captured by the expected-trap handler
///
/// The layout is shared with the assembly handlers in `metal`: five machine
/// words in this exact order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapInfo {
    /// Address of the faulting instruction
    pub epc: usize,
    /// mcause of the trap, never zero once captured
    pub cause: usize,
    /// mtval of the trap
    pub tval: usize,
    /// mtval2 (hypervisor path only)
    pub tval2: usize,
    /// mtinst (hypervisor path only)
    pub tinst: usize,
}

static_assertions::const_assert_eq!(
    core::mem::size_of::<TrapInfo>(),
    5 * core::mem::size_of::<usize>()
);

impl TrapInfo {
    /// Trap record for an illegal-instruction fault at `epc`
    pub const fn illegal_instruction(epc: usize) -> Self {
        Self {
            epc,
            cause: super::exception::ILLEGAL_INSTRUCTION,
            tval: 0,
            tval2: 0,
            tinst: 0,
        }
    }
}

/// Outcome of a guarded CSR access
pub type ProbeResult<T> = Result<T, TrapInfo>;

/// Expected-trap handler flavour
///
/// On harts with the H extension a trap also reports mtval2/mtinst, and the
/// handler has to capture them before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedTrap {
    /// Plain M-mode handler
    #[default]
    Basic,
    /// Handler aware of the hypervisor extension
    Hypervisor,
}

// ============================================================================
// Probing Patterns
// ============================================================================

/// Check that a CSR can be read and written back without trapping
pub fn probe_present<C: CsrAccess + ?Sized>(csr: &mut C, num: u16) -> bool {
    let value = match csr.read_allowed(num) {
        Ok(value) => value,
        Err(_) => return false,
    };
    csr.write_allowed(num, value).is_ok()
}

/// Check a single member of a CSR family
///
/// The register only counts as implemented when `pattern` can be written and
/// the restoring swap hands the same pattern back. The original value is
/// always restored.
pub fn check_csr<C: CsrAccess + ?Sized>(csr: &mut C, num: u16, pattern: usize) -> bool {
    let saved = match csr.read_allowed(num) {
        Ok(value) => value,
        Err(_) => return false,
    };
    if csr.write_allowed(num, pattern).is_err() {
        return false;
    }
    let implemented = csr.swap(num, saved) == pattern;

    #[cfg(feature = "debug")]
    log::trace!("probe csr {:#05x}: implemented={}", num, implemented);

    implemented
}

/// A contiguous family of CSRs, e.g. pmpaddr0..pmpaddr63
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrFamily {
    /// CSR number of member 0
    pub base: u16,
    /// Distance between consecutive members
    pub stride: u16,
    /// Architectural size of the family
    pub size: usize,
}

impl CsrFamily {
    /// Family of `size` consecutive CSRs starting at `base`
    pub const fn new(base: u16, size: usize) -> Self {
        Self { base, stride: 1, size }
    }

    /// CSR number of member `index`
    pub const fn member(&self, index: usize) -> u16 {
        self.base + (index as u16) * self.stride
    }
}

/// Count the implemented members of a CSR family
///
/// Implemented members of these families are contiguous from member 0, so
/// the first missing member is located by probing members 0, 1, 3, 7, 15, ...
/// and then bisecting the last gap. The result is exact and costs
/// O(log size) probes.
pub fn probe_family<C: CsrAccess + ?Sized>(csr: &mut C, family: CsrFamily, pattern: usize) -> usize {
    if family.size == 0 || !check_csr(csr, family.member(0), pattern) {
        return 0;
    }

    // lo: known implemented, hi: known missing (or one past the family)
    let mut lo = 0;
    let mut hi = family.size;
    let mut step = 1;
    loop {
        let index = lo + step;
        if index >= family.size {
            break;
        }
        if check_csr(csr, family.member(index), pattern) {
            lo = index;
            step *= 2;
        } else {
            hi = index;
            break;
        }
    }

    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if check_csr(csr, family.member(mid), pattern) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    lo + 1
}
