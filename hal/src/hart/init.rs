//! # Mode Initialization
//!
//! Puts the machine-mode status, counter and interrupt CSRs of a hart into a
//! known state before it runs anything else.

use super::features::{HartFeatureFlags, HartFeatures};
use crate::csr::{self, status, CsrAccess};
use crate::error::{Result, SbiError};

/// cycle, time and instret visible to U-mode
const SCOUNTEREN_DEFAULT: usize = 0b111;

/// Inhibit every counter except cycle, time and instret
const MCOUNTINHIBIT_DEFAULT: usize = 0xFFFF_FFF8;

/// Program mstatus, counter enables and the interrupt/paging state
///
/// Every register is overwritten, never merged with what firmware before us
/// left behind.
pub fn mstatus_init<C: CsrAccess + ?Sized>(csr: &mut C, features: &HartFeatures) {
    let mut mstatus = 0;
    if csr.misa_extension('F') || csr.misa_extension('D') {
        mstatus |= status::FS;
    }
    if csr.misa_extension('V') {
        mstatus |= status::VS;
    }
    csr.write(csr::MSTATUS, mstatus);

    if csr.misa_extension('S') && features.has(HartFeatureFlags::SCOUNTEREN) {
        csr.write(csr::SCOUNTEREN, SCOUNTEREN_DEFAULT);
    }
    if features.has(HartFeatureFlags::MCOUNTEREN) {
        csr.write(csr::MCOUNTEREN, usize::MAX);
    }
    if features.has(HartFeatureFlags::MCOUNTINHIBIT) {
        csr.write(csr::MCOUNTINHIBIT, MCOUNTINHIBIT_DEFAULT);
    }

    csr.write(csr::MIE, 0);

    if csr.misa_extension('S') {
        csr.write(csr::SATP, 0);
    }
}

/// Clear the FP register file and fcsr
///
/// Does nothing on harts without F/D. Fails with
/// [`SbiError::InvalidParam`] when mstatus.FS did not latch the enable
/// written by [`mstatus_init`].
pub fn fp_init<C: CsrAccess + ?Sized>(csr: &mut C) -> Result<()> {
    if !csr.misa_extension('F') && !csr.misa_extension('D') {
        return Ok(());
    }

    if csr.read(csr::MSTATUS) & status::FS == 0 {
        log::warn!("mstatus.FS did not latch, FP state left untouched");
        return Err(SbiError::InvalidParam);
    }

    csr.reset_fp_state();
    Ok(())
}
