//! # Domain Memory Regions
//!
//! The view of an isolation domain consumed by the PMP configurator. Domain
//! bookkeeping lives elsewhere; this layer only iterates the region list in
//! the order the domain defines it, and never mutates it.

bitflags::bitflags! {
    /// Access flags of a domain memory region
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MemRegionFlags: usize {
        /// Readable by the domain
        const READABLE = 1 << 0;
        /// Writable by the domain
        const WRITEABLE = 1 << 1;
        /// Executable by the domain
        const EXECUTABLE = 1 << 2;
        /// Enforced on M-mode as well (PMP lock bit)
        const MMODE = 1 << 3;
        /// Shared between domains
        const SHARED = 1 << 4;

        /// Read + write + execute
        const RWX = Self::READABLE.bits() | Self::WRITEABLE.bits() | Self::EXECUTABLE.bits();
    }
}

/// Extent of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSize {
    /// Naturally aligned power of two: log2 of the size in bytes
    Order(u32),
    /// Top of range: length in bytes, the region spans `base..base + len`
    Tor(usize),
}

/// A domain memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemRegion {
    /// Start address
    pub base: usize,
    /// Extent
    pub size: RegionSize,
    /// Access flags
    pub flags: MemRegionFlags,
}

impl MemRegion {
    /// NAPOT region of `1 << order` bytes at `base`
    pub const fn napot(base: usize, order: u32, flags: MemRegionFlags) -> Self {
        Self {
            base,
            size: RegionSize::Order(order),
            flags,
        }
    }

    /// TOR region covering `base..base + len`
    pub const fn tor(base: usize, len: usize, flags: MemRegionFlags) -> Self {
        Self {
            base,
            size: RegionSize::Tor(len),
            flags,
        }
    }

    /// Number of PMP slots the region consumes
    pub const fn slot_cost(&self) -> usize {
        match self.size {
            RegionSize::Order(_) => 1,
            RegionSize::Tor(_) => 2,
        }
    }
}

/// An isolation domain as seen by one hart
#[derive(Debug, Clone, Copy)]
pub struct Domain<'a> {
    /// Domain name, used in diagnostics
    pub name: &'a str,
    /// Regions in priority order
    pub regions: &'a [MemRegion],
}

impl<'a> Domain<'a> {
    /// Create a domain view
    pub const fn new(name: &'a str, regions: &'a [MemRegion]) -> Self {
        Self {
            name,
            regions,
        }
    }

    /// Iterate regions in priority order
    pub fn regions(&self) -> impl Iterator<Item = &'a MemRegion> + 'a {
        self.regions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_cost() {
        let napot = MemRegion::napot(0x8000_0000, 21, MemRegionFlags::RWX);
        let tor = MemRegion::tor(0x1000, 0x1000, MemRegionFlags::READABLE);
        assert_eq!(napot.slot_cost(), 1);
        assert_eq!(tor.slot_cost(), 2);
    }
}
