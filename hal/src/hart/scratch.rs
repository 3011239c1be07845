//! # Per-Hart Scratch Storage
//!
//! A fixed-size arena indexed by hart ID. Each hart owns exactly one slot,
//! allocated once at cold boot and reused by every warm reinit.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::{Mutex, MutexGuard};

use super::features::HartFeatures;
use crate::config::MAX_HARTS;
use crate::error::{Result, SbiError};

// ============================================================================
// Hart Scratch Record
// ============================================================================

/// Per-hart state owned by the scratch arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HartScratch {
    /// Hart this record belongs to
    pub hartid: usize,
    /// Detected capabilities
    pub features: HartFeatures,
}

impl HartScratch {
    /// Empty record for `hartid`
    pub const fn new(hartid: usize) -> Self {
        Self {
            hartid,
            features: HartFeatures::empty(),
        }
    }
}

// ============================================================================
// Scratch Arena
// ============================================================================

/// Fixed-size per-hart storage
pub struct ScratchArena<const N: usize> {
    slots: [Mutex<HartScratch>; N],
    allocated: [AtomicBool; N],
}

impl<const N: usize> ScratchArena<N> {
    /// Create an arena with every slot free
    pub const fn new() -> Self {
        Self {
            slots: [const { Mutex::new(HartScratch::new(0)) }; N],
            allocated: [const { AtomicBool::new(false) }; N],
        }
    }

    /// Number of harts the arena can hold
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Claim the slot of `hartid`
    ///
    /// Claiming an already allocated slot hands it back again, so a hart
    /// re-entering cold boot keeps its storage.
    pub fn alloc(&self, hartid: usize) -> Result<MutexGuard<'_, HartScratch>> {
        let slot = self.slots.get(hartid).ok_or(SbiError::NoMemory)?;
        let mut scratch = slot.lock();
        if !self.allocated[hartid].swap(true, Ordering::AcqRel) {
            *scratch = HartScratch::new(hartid);
        }
        Ok(scratch)
    }

    /// Access the slot of an already allocated hart
    pub fn get(&self, hartid: usize) -> Result<MutexGuard<'_, HartScratch>> {
        if !self.is_allocated(hartid) {
            return Err(SbiError::InvalidState);
        }
        Ok(self.slots[hartid].lock())
    }

    /// Check whether `hartid` has storage
    pub fn is_allocated(&self, hartid: usize) -> bool {
        self.allocated
            .get(hartid)
            .map_or(false, |flag| flag.load(Ordering::Acquire))
    }
}

impl<const N: usize> fmt::Debug for ScratchArena<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allocated = self
            .allocated
            .iter()
            .filter(|flag| flag.load(Ordering::Relaxed))
            .count();
        f.debug_struct("ScratchArena")
            .field("capacity", &N)
            .field("allocated", &allocated)
            .finish()
    }
}

impl<const N: usize> Default for ScratchArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scratch storage of every hart in the system
pub static HART_SCRATCH: ScratchArena<MAX_HARTS> = ScratchArena::new();
