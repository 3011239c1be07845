//! # Platform Configuration
//!
//! Policy knobs the board crate hands to the hart layer.

/// Maximum number of harts with per-hart scratch storage
pub const MAX_HARTS: usize = 128;

static_assertions::const_assert!(MAX_HARTS > 0);

/// Platform policy consulted during hart initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Platform name, used in diagnostics
    pub name: &'static str,
    /// Delegate page faults to S-mode
    pub mfaults_delegation: bool,
}

impl PlatformConfig {
    /// Default policy: page faults are handled by S-mode
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            mfaults_delegation: true,
        }
    }

    /// Keep page faults in M-mode (e.g. for M-mode fault emulation)
    pub const fn without_mfaults_delegation(mut self) -> Self {
        self.mfaults_delegation = false;
        self
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::new("generic")
    }
}
