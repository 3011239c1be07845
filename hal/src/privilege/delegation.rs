//! # Trap Delegation
//!
//! Decides which interrupts and exceptions S-mode handles directly and
//! programs mideleg/medeleg accordingly.

use crate::config::PlatformConfig;
use crate::csr::{self, exception, interrupt, CsrAccess};
use crate::hart::{HartFeatureFlags, HartFeatures};

/// Exceptions always handled by S-mode
const BASE_EXCEPTIONS: usize = (1 << exception::INSTRUCTION_MISALIGNED)
    | (1 << exception::BREAKPOINT)
    | (1 << exception::ECALL_FROM_U);

/// Page faults, delegated unless the platform emulates them in M-mode
const PAGE_FAULTS: usize = (1 << exception::INSTRUCTION_PAGE_FAULT)
    | (1 << exception::LOAD_PAGE_FAULT)
    | (1 << exception::STORE_PAGE_FAULT);

/// Guest traps, handled by a hypervisor running in HS-mode
const HYPERVISOR_EXCEPTIONS: usize = (1 << exception::ECALL_FROM_VS)
    | (1 << exception::INSTRUCTION_GUEST_PAGE_FAULT)
    | (1 << exception::LOAD_GUEST_PAGE_FAULT)
    | (1 << exception::VIRTUAL_INSTRUCTION)
    | (1 << exception::STORE_GUEST_PAGE_FAULT);

/// Contents of mideleg and medeleg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrapDelegation {
    /// mideleg
    pub interrupts: usize,
    /// medeleg
    pub exceptions: usize,
}

impl TrapDelegation {
    /// Delegation for a hart, all zero without S-mode
    pub fn compute<C: CsrAccess + ?Sized>(
        csr: &mut C,
        features: &HartFeatures,
        platform: &PlatformConfig,
    ) -> Self {
        if !csr.misa_extension('S') {
            return Self::default();
        }

        let mut interrupts = interrupt::S_ALL;
        if features.has(HartFeatureFlags::SSCOFPMF) {
            interrupts |= interrupt::LCOFIP;
        }

        let mut exceptions = BASE_EXCEPTIONS;
        if platform.mfaults_delegation {
            exceptions |= PAGE_FAULTS;
        }
        if csr.misa_extension('H') {
            exceptions |= HYPERVISOR_EXCEPTIONS;
        }

        Self {
            interrupts,
            exceptions,
        }
    }

    /// Overwrite mideleg and medeleg
    pub fn apply<C: CsrAccess + ?Sized>(&self, csr: &mut C) {
        csr.write(csr::MIDELEG, self.interrupts);
        csr.write(csr::MEDELEG, self.exceptions);
    }

    /// Delegation currently programmed, `None` without S-mode
    pub fn current<C: CsrAccess + ?Sized>(csr: &mut C) -> Option<Self> {
        if !csr.misa_extension('S') {
            return None;
        }
        Some(Self {
            interrupts: csr.read(csr::MIDELEG),
            exceptions: csr.read(csr::MEDELEG),
        })
    }
}

/// Compute and program the delegation of the current hart
///
/// Without S-mode there is nothing to delegate to and no CSR is touched.
pub fn delegate_traps<C: CsrAccess + ?Sized>(
    csr: &mut C,
    features: &HartFeatures,
    platform: &PlatformConfig,
) {
    if !csr.misa_extension('S') {
        return;
    }
    TrapDelegation::compute(csr, features, platform).apply(csr);
}

/// Log the programmed delegation CSRs
pub fn delegation_dump<C: CsrAccess + ?Sized>(csr: &mut C, prefix: &str, suffix: &str) {
    if let Some(deleg) = TrapDelegation::current(csr) {
        log::info!("{}MIDELEG{}: {:#018x}", prefix, suffix, deleg.interrupts);
        log::info!("{}MEDELEG{}: {:#018x}", prefix, suffix, deleg.exceptions);
    }
}
