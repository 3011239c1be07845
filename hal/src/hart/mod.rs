//! # Hart Initialization
//!
//! Entry points used by boot orchestration to bring a hart into a known
//! machine-mode state.
//!
//! ## Lifecycle
//!
//! ```text
//! cold_init ──► alloc scratch ──► detect ──► reinit
//! warm_init ──────────────────► detect ──► reinit
//! ```
//!
//! [`reinit`] programs mstatus/counters, initializes the FPU and sets up
//! trap delegation. The terminal step, [`switch_mode`](crate::privilege::switch_mode),
//! lives in the privilege module.

pub mod features;
pub mod init;
pub mod scratch;

pub use features::{HartFeatureFlags, HartFeatures};
pub use init::{fp_init, mstatus_init};
pub use scratch::{HartScratch, ScratchArena, HART_SCRATCH};

use crate::config::PlatformConfig;
use crate::csr::{CsrAccess, ExpectedTrap};
use crate::error::Result;
use crate::privilege::delegation::delegate_traps;

// ============================================================================
// Feature Accessors
// ============================================================================

impl HartScratch {
    /// Implemented PMP entries
    pub fn pmp_count(&self) -> usize {
        self.features.pmp_count
    }

    /// Minimum PMP region size in bytes
    pub fn pmp_granularity(&self) -> usize {
        self.features.pmp_gran
    }

    /// Width of the pmpaddr address field
    pub fn pmp_addr_bits(&self) -> u32 {
        self.features.pmp_addr_bits
    }

    /// Implemented generic performance counters
    pub fn mhpm_count(&self) -> usize {
        self.features.mhpm_count
    }

    /// Width of the generic performance counters
    pub fn mhpm_bits(&self) -> u32 {
        self.features.mhpm_bits
    }

    /// Check whether the hart has `feature`
    pub fn has_feature(&self, feature: HartFeatureFlags) -> bool {
        self.features.has(feature)
    }

    /// Write the feature names into `buf`, see
    /// [`HartFeatures::write_features_str`]
    pub fn features_str(&self, buf: &mut [u8]) -> usize {
        self.features.write_features_str(buf)
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Reapply the machine-mode setup of the current hart
pub fn reinit<C: CsrAccess + ?Sized>(
    csr: &mut C,
    features: &HartFeatures,
    platform: &PlatformConfig,
) -> Result<()> {
    mstatus_init(csr, features);
    fp_init(csr)?;
    delegate_traps(csr, features, platform);
    Ok(())
}

/// First initialization of hart `hartid`
///
/// Fails with [`SbiError::NoMemory`](crate::SbiError::NoMemory) when the
/// arena has no slot for the hart, which should abort the boot.
pub fn cold_init<C: CsrAccess + ?Sized, const N: usize>(
    csr: &mut C,
    arena: &ScratchArena<N>,
    hartid: usize,
    platform: &PlatformConfig,
) -> Result<()> {
    if csr.misa_extension('H') {
        csr.set_expected_trap(ExpectedTrap::Hypervisor);
    }

    let mut scratch = arena.alloc(hartid).map_err(|err| {
        log::error!("hart{}: no scratch space ({} harts max)", hartid, arena.capacity());
        err
    })?;

    detect_and_reinit(csr, &mut scratch, platform)
}

/// Initialization of hart `hartid` after a warm reset
///
/// Reuses the storage claimed by [`cold_init`]; fails with
/// [`SbiError::InvalidState`](crate::SbiError::InvalidState) if there is none.
pub fn warm_init<C: CsrAccess + ?Sized, const N: usize>(
    csr: &mut C,
    arena: &ScratchArena<N>,
    hartid: usize,
    platform: &PlatformConfig,
) -> Result<()> {
    let mut scratch = arena.get(hartid)?;
    detect_and_reinit(csr, &mut scratch, platform)
}

fn detect_and_reinit<C: CsrAccess + ?Sized>(
    csr: &mut C,
    scratch: &mut HartScratch,
    platform: &PlatformConfig,
) -> Result<()> {
    scratch.features.redetect(csr);
    log::debug!("hart{}: {}", scratch.hartid, scratch.features);
    reinit(csr, &scratch.features, platform)
}
