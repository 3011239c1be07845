//! # Hart Feature Detection
//!
//! Builds the per-hart capability record by probing optional CSRs. The record
//! is the only source of truth for later CSR accesses on that hart.

use core::fmt;

use crate::csr::probe::{probe_family, probe_present, CsrFamily};
use crate::csr::{self, CsrAccess};

bitflags::bitflags! {
    /// Optional CSRs found on a hart
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HartFeatureFlags: usize {
        /// scounteren is implemented
        const SCOUNTEREN = 1 << 0;
        /// mcounteren is implemented
        const MCOUNTEREN = 1 << 1;
        /// mcountinhibit is implemented
        const MCOUNTINHIBIT = 1 << 2;
        /// Counter overflow and mode filtering (Sscofpmf)
        const SSCOFPMF = 1 << 3;
        /// time CSR is implemented
        const TIME = 1 << 4;
    }
}

/// Printable feature names, in feature string order
const FEATURE_NAMES: [(HartFeatureFlags, &str); 5] = [
    (HartFeatureFlags::SCOUNTEREN, "scounteren"),
    (HartFeatureFlags::MCOUNTEREN, "mcounteren"),
    (HartFeatureFlags::MCOUNTINHIBIT, "mcountinhibit"),
    (HartFeatureFlags::SSCOFPMF, "sscofpmf"),
    (HartFeatureFlags::TIME, "time"),
];

/// Number of generic performance counters (mhpmcounter3..31)
const MHPM_FAMILY_SIZE: usize = 29;

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        /// Every address bit a pmpaddr register can hold
        const PMP_ADDR_MASK: usize = (1 << 54) - 1;
    } else {
        /// Every address bit a pmpaddr register can hold
        const PMP_ADDR_MASK: usize = 0xFFFF_FFFF;
    }
}

// ============================================================================
// Hart Feature Record
// ============================================================================

/// Capabilities of one hart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HartFeatures {
    /// Optional CSRs present
    pub features: HartFeatureFlags,
    /// Implemented PMP entries, 0 without PMP
    pub pmp_count: usize,
    /// Width of the address field of a pmpaddr register
    pub pmp_addr_bits: u32,
    /// Minimum PMP region size in bytes (power of two)
    pub pmp_gran: usize,
    /// Implemented generic performance counters
    pub mhpm_count: usize,
    /// Width of the generic performance counters
    pub mhpm_bits: u32,
}

impl HartFeatures {
    /// Empty record
    pub const fn empty() -> Self {
        Self {
            features: HartFeatureFlags::empty(),
            pmp_count: 0,
            pmp_addr_bits: 0,
            pmp_gran: 0,
            mhpm_count: 0,
            mhpm_bits: 0,
        }
    }

    /// Probe the current hart
    pub fn detect<C: CsrAccess + ?Sized>(csr: &mut C) -> Self {
        let mut record = Self::empty();
        record.redetect(csr);
        record
    }

    /// Reset the record and probe the current hart again
    pub fn redetect<C: CsrAccess + ?Sized>(&mut self, csr: &mut C) {
        *self = Self::empty();

        // PMP granularity, address width and entry count
        let allowed = pmp_allowed_addr(csr);
        if allowed != 0 {
            self.pmp_gran = 1 << (allowed.trailing_zeros() + 2);
            self.pmp_addr_bits = fls(allowed) + 1;
            let family = CsrFamily::new(csr::PMPADDR0, csr::PMPADDR_COUNT);
            self.pmp_count = probe_family(csr, family, allowed);
        }

        // Generic performance counters
        let family = CsrFamily::new(csr::MHPMCOUNTER3, MHPM_FAMILY_SIZE);
        self.mhpm_count = probe_family(csr, family, 1);
        if self.mhpm_count > 0 {
            self.mhpm_bits = mhpm_allowed_bits(csr);
        }

        if probe_present(csr, csr::SCOUNTEREN) {
            self.features |= HartFeatureFlags::SCOUNTEREN;
        }
        if probe_present(csr, csr::MCOUNTEREN) {
            self.features |= HartFeatureFlags::MCOUNTEREN;
        }
        if probe_present(csr, csr::MCOUNTINHIBIT) {
            self.features |= HartFeatureFlags::MCOUNTINHIBIT;
        }

        // Overflow/filtering is meaningless without counter enable and inhibit
        if self
            .features
            .contains(HartFeatureFlags::MCOUNTEREN | HartFeatureFlags::MCOUNTINHIBIT)
            && csr.read_allowed(csr::SCOUNTOVF).is_ok()
        {
            self.features |= HartFeatureFlags::SSCOFPMF;
        }

        if csr.read_allowed(csr::TIME).is_ok() {
            self.features |= HartFeatureFlags::TIME;
        }
    }

    /// Check whether a feature is present
    pub fn has(&self, feature: HartFeatureFlags) -> bool {
        self.features.contains(feature)
    }

    /// Write the comma separated feature names (or `none`) into `buf`
    ///
    /// The output is truncated to fit and always NUL terminated inside
    /// `buf`. Returns the number of bytes before the terminator.
    pub fn write_features_str(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        buf.fill(0);

        let mut out = TruncatingWriter {
            buf,
            len: 0,
        };
        if self.features.is_empty() {
            out.push("none");
        } else {
            let mut first = true;
            for (flag, name) in FEATURE_NAMES {
                if !self.features.contains(flag) {
                    continue;
                }
                if !first {
                    out.push(",");
                }
                out.push(name);
                first = false;
            }
        }
        out.len
    }
}

impl fmt::Display for HartFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; 64];
        let len = self.write_features_str(&mut buf);
        let names = core::str::from_utf8(&buf[..len]).unwrap_or("?");
        write!(
            f,
            "features={} pmp_count={} pmp_gran={:#x} pmp_addr_bits={} mhpm_count={} mhpm_bits={}",
            names, self.pmp_count, self.pmp_gran, self.pmp_addr_bits, self.mhpm_count, self.mhpm_bits
        )
    }
}

/// Byte sink that keeps one byte free for the terminator
struct TruncatingWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl TruncatingWriter<'_> {
    fn push(&mut self, s: &str) {
        let room = self.buf.len() - 1 - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        self.buf[self.len] = 0;
    }
}

// ============================================================================
// Probes
// ============================================================================

/// Index of the highest set bit; `value` must be non-zero
#[inline]
fn fls(value: usize) -> u32 {
    usize::BITS - 1 - value.leading_zeros()
}

/// Write all ones to pmpaddr0 and read back which bits stick
///
/// Returns 0 when PMP is not implemented.
fn pmp_allowed_addr<C: CsrAccess + ?Sized>(csr: &mut C) -> usize {
    if csr.write_allowed(csr::PMPCFG0, 0).is_err() {
        return 0;
    }
    if csr.write_allowed(csr::PMPADDR0, PMP_ADDR_MASK).is_err() {
        return 0;
    }
    csr.read_allowed(csr::PMPADDR0).unwrap_or(0)
}

/// Width of the generic counters, measured on mhpmcounter3
///
/// All counters, mcycle and minstret included, are assumed to share it.
fn mhpm_allowed_bits<C: CsrAccess + ?Sized>(csr: &mut C) -> u32 {
    let low = match write_read_back(csr, csr::MHPMCOUNTER3) {
        Some(value) if value != 0 => value,
        _ => return 0,
    };
    let bits = fls(low) + 1;

    #[cfg(target_pointer_width = "32")]
    if let Some(high) = write_read_back(csr, csr::MHPMCOUNTER3H) {
        if high != 0 {
            return bits + fls(high) + 1;
        }
    }

    bits
}

fn write_read_back<C: CsrAccess + ?Sized>(csr: &mut C, num: u16) -> Option<usize> {
    let saved = csr.read_allowed(num).ok()?;
    csr.write_allowed(num, usize::MAX).ok()?;
    let value = csr.read_allowed(num).ok();
    let _ = csr.write_allowed(num, saved);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::sim::SimHart;
    use crate::csr::{MCOUNTEREN, MCOUNTINHIBIT, SCOUNTEREN, SCOUNTOVF, TIME};

    fn full_hart() -> SimHart {
        SimHart::new("imafdcsu")
            .with_pmp(16, 54, 12)
            .with_mhpm(29, 48)
            .with_csr(SCOUNTEREN, 0)
            .with_csr(MCOUNTEREN, 0)
            .with_csr(MCOUNTINHIBIT, 0)
            .with_csr(SCOUNTOVF, 0)
            .with_csr(TIME, 42)
    }

    #[test]
    fn test_detect_full_hart() {
        let mut hart = full_hart();
        let record = HartFeatures::detect(&mut hart);
        assert_eq!(record.pmp_count, 16);
        assert_eq!(record.pmp_gran, 4096);
        assert_eq!(record.pmp_addr_bits, 54);
        assert_eq!(record.mhpm_count, 29);
        assert_eq!(record.mhpm_bits, 48);
        assert_eq!(record.features, HartFeatureFlags::all());
    }

    #[test]
    fn test_detect_bare_hart() {
        let mut hart = SimHart::new("imac");
        let record = HartFeatures::detect(&mut hart);
        assert_eq!(record, HartFeatures::empty());
    }

    #[test]
    fn test_detect_is_idempotent() {
        let mut hart = full_hart();
        let first = HartFeatures::detect(&mut hart);
        let second = HartFeatures::detect(&mut hart);
        assert_eq!(first, second);

        let mut partial = SimHart::new("imasu").with_pmp(5, 34, 2).with_mhpm(3, 40);
        let first = HartFeatures::detect(&mut partial);
        let second = HartFeatures::detect(&mut partial);
        assert_eq!(first, second);
        assert_eq!(first.pmp_count, 5);
        assert_eq!(first.pmp_gran, 4);
        assert_eq!(first.mhpm_count, 3);
    }

    #[test]
    fn test_redetect_resets_stale_values() {
        let mut record = HartFeatures {
            features: HartFeatureFlags::all(),
            pmp_count: 64,
            pmp_addr_bits: 54,
            pmp_gran: 4,
            mhpm_count: 29,
            mhpm_bits: 64,
        };
        let mut hart = SimHart::new("imasu");
        record.redetect(&mut hart);
        assert_eq!(record, HartFeatures::empty());
    }

    #[test]
    fn test_sscofpmf_requires_counter_csrs() {
        let mut hart = SimHart::new("imasu")
            .with_csr(MCOUNTEREN, 0)
            .with_csr(SCOUNTOVF, 0);
        let record = HartFeatures::detect(&mut hart);
        assert!(record.has(HartFeatureFlags::MCOUNTEREN));
        assert!(!record.has(HartFeatureFlags::SSCOFPMF));
    }

    #[test]
    fn test_probe_restores_csr_values() {
        let mut hart = full_hart();
        hart.write_raw(SCOUNTEREN, 0x7);
        let _ = HartFeatures::detect(&mut hart);
        assert_eq!(hart.csr(SCOUNTEREN), Some(0x7));
        assert_eq!(hart.csr(TIME), Some(42));
    }

    #[test]
    fn test_features_str() {
        let mut hart = full_hart();
        let record = HartFeatures::detect(&mut hart);
        let mut buf = [0xFFu8; 64];
        let len = record.write_features_str(&mut buf);
        assert_eq!(&buf[..len], b"scounteren,mcounteren,mcountinhibit,sscofpmf,time");
        assert_eq!(buf[len], 0);
    }

    #[test]
    fn test_features_str_none() {
        let record = HartFeatures::empty();
        let mut buf = [0xFFu8; 16];
        let len = record.write_features_str(&mut buf);
        assert_eq!(&buf[..len], b"none");
        assert_eq!(buf[len], 0);
    }

    #[test]
    fn test_features_str_truncates() {
        let record = HartFeatures {
            features: HartFeatureFlags::SCOUNTEREN
                | HartFeatureFlags::MCOUNTEREN
                | HartFeatureFlags::MCOUNTINHIBIT,
            ..HartFeatures::empty()
        };
        let mut buf = [0xFFu8; 5];
        let len = record.write_features_str(&mut buf);
        assert_eq!(len, 4);
        assert_eq!(&buf, b"scou\0");

        let mut tiny = [0xFFu8; 1];
        assert_eq!(record.write_features_str(&mut tiny), 0);
        assert_eq!(tiny, [0]);

        let mut empty: [u8; 0] = [];
        assert_eq!(record.write_features_str(&mut empty), 0);
    }
}
