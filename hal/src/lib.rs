//! # Helix SBI Hart Layer
//!
//! Machine-mode bring-up of a RISC-V hart for the Helix SBI firmware. It
//! finds out what the hart implements, locks memory down to the active
//! domain, hands traps to S-mode and finally drops into the next boot stage.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Helix SBI - Hart Layer                          │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐ ┌─────────────┐    │
//! │  │    Hart     │ │     PMP     │ │ Delegation  │ │   Switch    │    │
//! │  │             │ │             │ │             │ │             │    │
//! │  │• Features   │ │• NAPOT/NA4  │ │• mideleg    │ │• MPP/MPV    │    │
//! │  │• Scratch    │ │• TOR pairs  │ │• medeleg    │ │• mepc       │    │
//! │  │• mstatus/FP │ │• Domains    │ │• Dump       │ │• mret       │    │
//! │  └──────┬──────┘ └──────┬──────┘ └──────┬──────┘ └──────┬──────┘    │
//! │         └───────────────┴───────┬───────┴───────────────┘           │
//! │                          ┌──────┴──────┐                            │
//! │                          │     CSR     │                            │
//! │                          │• CsrAccess  │                            │
//! │                          │• Probing    │                            │
//! │                          │• metal/sim  │                            │
//! │                          └─────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`csr`]: CSR numbers, the [`CsrAccess`] seam and trap-guarded probing
//! - [`hart`]: feature record, per-hart scratch, cold/warm initialization
//! - [`pmp`]: PMP entry encoding and domain configuration
//! - [`privilege`]: trap delegation and the final mode switch
//! - [`domain`]: memory regions as handed over by the domain layer
//! - [`console`]: `log` backend over the board console
//!
//! ## Boot Flow
//!
//! ```ignore
//! let mut csr = unsafe { MetalHart::new() };
//! hart::cold_init(&mut csr, &HART_SCRATCH, hartid, &platform)?;
//! let scratch = HART_SCRATCH.get(hartid)?;
//! pmp::pmp_configure(&mut csr, &scratch.features, &domain);
//! privilege::switch_mode(&mut csr, hartid, fdt, next_addr, next_mode, false);
//! ```

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod console;
pub mod csr;
pub mod domain;
pub mod error;
pub mod hart;
pub mod pmp;
pub mod privilege;

pub use config::{PlatformConfig, MAX_HARTS};
pub use csr::CsrAccess;
pub use domain::{Domain, MemRegion, MemRegionFlags, RegionSize};
pub use error::{PmpError, Result, SbiError};
pub use hart::{cold_init, reinit, warm_init, HartFeatureFlags, HartFeatures, HartScratch};
pub use privilege::{hang, switch_mode, PrivilegeMode};

#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
pub use csr::metal::MetalHart;
