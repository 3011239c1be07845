//! # Physical Memory Protection
//!
//! Encodes domain memory regions into PMP entries of the current hart.
//!
//! Each entry is one `pmpaddrN` register plus one byte of a shared `pmpcfg`
//! register. On RV32 `pmpcfgN` holds entries `4N..4N+3`; on RV64 only the
//! even `pmpcfg` registers exist and each holds eight entries.
//!
//! Regions are placed in domain order, so earlier regions take priority.
//! Regions the hart cannot represent are skipped with a warning: the hart
//! boots with a weaker boundary rather than not at all.

use crate::csr::{self, CsrAccess};
use crate::domain::{Domain, MemRegion, MemRegionFlags, RegionSize};
use crate::error::PmpError;
use crate::hart::HartFeatures;

bitflags::bitflags! {
    /// Configuration byte of a PMP entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PmpFlags: u8 {
        /// Read
        const R = 0x01;
        /// Write
        const W = 0x02;
        /// Execute
        const X = 0x04;
        /// Address matching: top of range
        const TOR = 0x08;
        /// Address matching: naturally aligned four bytes
        const NA4 = 0x10;
        /// Address matching: naturally aligned power of two
        const NAPOT = 0x18;
        /// Lock, enforce on M-mode as well
        const L = 0x80;
    }
}

impl PmpFlags {
    /// Address-matching field
    pub const A: Self = Self::NAPOT;

    /// Permission and lock bits only
    pub fn without_match(self) -> Self {
        self.difference(Self::A)
    }
}

impl From<MemRegionFlags> for PmpFlags {
    fn from(flags: MemRegionFlags) -> Self {
        let mut pmp = Self::empty();
        if flags.contains(MemRegionFlags::READABLE) {
            pmp |= Self::R;
        }
        if flags.contains(MemRegionFlags::WRITEABLE) {
            pmp |= Self::W;
        }
        if flags.contains(MemRegionFlags::EXECUTABLE) {
            pmp |= Self::X;
        }
        if flags.contains(MemRegionFlags::MMODE) {
            pmp |= Self::L;
        }
        pmp
    }
}

/// pmpaddr holds bits [XLEN+1:2] of the address
const PMP_SHIFT: u32 = 2;

// ============================================================================
// Slot Encoding
// ============================================================================

/// pmpcfg register and bit offset holding the byte of `slot`
#[cfg(target_pointer_width = "64")]
fn cfg_location(slot: usize) -> (u16, u32) {
    let reg = (csr::PMPCFG0 + (slot >> 2) as u16) & !1;
    (reg, ((slot & 7) << 3) as u32)
}

/// pmpcfg register and bit offset holding the byte of `slot`
#[cfg(not(target_pointer_width = "64"))]
fn cfg_location(slot: usize) -> (u16, u32) {
    (csr::PMPCFG0 + (slot >> 2) as u16, ((slot & 3) << 3) as u32)
}

/// Program the address register and then the config byte of one entry
fn write_entry<C: CsrAccess + ?Sized>(csr: &mut C, slot: usize, addr: usize, flags: PmpFlags) {
    let (cfg_csr, shift) = cfg_location(slot);
    let cfg = (csr.read(cfg_csr) & !(0xFF << shift)) | ((flags.bits() as usize) << shift);

    csr.write(csr::PMPADDR0 + slot as u16, addr);
    csr.write(cfg_csr, cfg);

    #[cfg(feature = "debug")]
    log::trace!("pmp{}: addr={:#x} cfg={:#04x}", slot, addr, flags.bits());
}

/// Program `slot` with a naturally aligned region of `1 << order` bytes
///
/// Order 2 selects NA4, order XLEN covers the whole address space.
pub fn pmp_set<C: CsrAccess + ?Sized>(
    csr: &mut C,
    features: &HartFeatures,
    slot: usize,
    flags: PmpFlags,
    base: usize,
    order: u32,
) -> Result<(), PmpError> {
    if slot >= features.pmp_count {
        return Err(PmpError::SlotOutOfRange {
            slot,
            count: features.pmp_count,
        });
    }
    if !(PMP_SHIFT..=usize::BITS).contains(&order) {
        return Err(PmpError::InvalidOrder { order });
    }
    if order < usize::BITS && base & ((1usize << order) - 1) != 0 {
        return Err(PmpError::Misaligned { base, order });
    }

    let mut flags = flags.without_match();
    let addr = if order == PMP_SHIFT {
        flags |= PmpFlags::NA4;
        base >> PMP_SHIFT
    } else if order == usize::BITS {
        flags |= PmpFlags::NAPOT;
        usize::MAX
    } else {
        flags |= PmpFlags::NAPOT;
        let mask = (1usize << (order - PMP_SHIFT)) - 1;
        ((base >> PMP_SHIFT) & !mask) | (mask >> 1)
    };

    write_entry(csr, slot, addr, flags);
    Ok(())
}

/// Program `slot` and `slot + 1` as a top-of-range pair covering
/// `start..end`
///
/// The start entry carries the permissions with matching disabled. With
/// [`PmpFlags::L`] both entries are locked; a locked TOR end entry also
/// freezes the pmpaddr of its start entry.
pub fn pmp_set_tor<C: CsrAccess + ?Sized>(
    csr: &mut C,
    features: &HartFeatures,
    slot: usize,
    flags: PmpFlags,
    start: usize,
    end: usize,
) -> Result<(), PmpError> {
    let end_slot = slot + 1;
    if end_slot >= features.pmp_count {
        return Err(PmpError::SlotOutOfRange {
            slot: end_slot,
            count: features.pmp_count,
        });
    }
    if end < start {
        return Err(PmpError::InvalidRange { start, end });
    }

    let flags = flags.without_match();
    write_entry(csr, slot, start >> PMP_SHIFT, flags);
    write_entry(csr, end_slot, end >> PMP_SHIFT, flags | PmpFlags::TOR);
    Ok(())
}

// ============================================================================
// Domain Configuration
// ============================================================================

/// Program the PMP of the current hart from `domain`
///
/// Returns the number of entries used. Without PMP nothing is programmed
/// and access stays unrestricted.
pub fn pmp_configure<C: CsrAccess + ?Sized>(
    csr: &mut C,
    features: &HartFeatures,
    domain: &Domain<'_>,
) -> usize {
    let count = features.pmp_count;
    if count == 0 {
        return 0;
    }

    let gran_log2 = log2_roundup(features.pmp_gran);
    let addr_max = addr_limit(features.pmp_addr_bits);

    let mut slot = 0;
    for (index, region) in domain.regions().enumerate() {
        if region.slot_cost() > count - slot {
            log::warn!(
                "{}: out of PMP entries, {} region(s) left unprotected",
                domain.name,
                domain.regions.len() - index
            );
            break;
        }

        match place_region(csr, features, slot, region, gran_log2, addr_max) {
            Ok(()) => slot += region.slot_cost(),
            Err(err) => log::warn!(
                "{}: region {} at {:#x} skipped: {}",
                domain.name,
                index,
                region.base,
                err
            ),
        }
    }

    slot
}

fn place_region<C: CsrAccess + ?Sized>(
    csr: &mut C,
    features: &HartFeatures,
    slot: usize,
    region: &MemRegion,
    gran_log2: u32,
    addr_max: usize,
) -> Result<(), PmpError> {
    let flags = PmpFlags::from(region.flags);
    match region.size {
        RegionSize::Order(order) => {
            if order < gran_log2 {
                return Err(PmpError::InvalidOrder { order });
            }
            if region.base >> PMP_SHIFT >= addr_max {
                return Err(PmpError::AddressOutOfRange { base: region.base });
            }
            pmp_set(csr, features, slot, flags, region.base, order)
        },
        RegionSize::Tor(len) => {
            let end = region
                .base
                .checked_add(len)
                .ok_or(PmpError::AddressOutOfRange { base: region.base })?;
            if end >> PMP_SHIFT > addr_max {
                return Err(PmpError::AddressOutOfRange { base: end });
            }
            pmp_set_tor(csr, features, slot, flags, region.base, end)
        },
    }
}

/// log2 of `value` rounded up to the next power of two
fn log2_roundup(value: usize) -> u32 {
    value.max(1).next_power_of_two().trailing_zeros()
}

/// Largest value the pmpaddr address field can hold
fn addr_limit(addr_bits: u32) -> usize {
    let bits = addr_bits.saturating_sub(1);
    if bits >= usize::BITS - 1 {
        return usize::MAX;
    }
    (1usize << bits) | ((1usize << bits) - 1)
}
