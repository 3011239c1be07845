//! # RISC-V Control and Status Registers (CSRs)
//!
//! CSR numbers and bit fields used by the machine-mode hart layer, plus the
//! [`CsrAccess`] seam through which every CSR access flows.
//!
//! ## CSR Address Encoding
//!
//! CSR addresses are 12-bit values encoded as:
//! - Bits [11:10]: Read/Write access (00=RW, 01=RW, 10=RW, 11=RO)
//! - Bits [9:8]: Lowest privilege level that can access
//! - Bits [7:0]: Register index
//!
//! ## Backends
//!
//! - [`metal`]: inline-assembly access on a real hart running in M-mode
//! - `sim`: a simulated hart used by the unit tests
//!
//! Optional CSRs must only be touched through the guarded accessors
//! ([`CsrAccess::read_allowed`], [`CsrAccess::write_allowed`]) unless the
//! hart feature record says they exist.

pub mod probe;

#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
pub mod metal;

#[cfg(test)]
pub mod sim;

pub use probe::{ExpectedTrap, ProbeResult, TrapInfo};

// ============================================================================
// CSR Address Constants
// ============================================================================

// ----------------------------------------------------------------------------
// User-level CSRs
// ----------------------------------------------------------------------------

/// Floating-point control and status register
pub const FCSR: u16 = 0x003;
/// User interrupt enable (N extension)
pub const UIE: u16 = 0x004;
/// User trap handler base address (N extension)
pub const UTVEC: u16 = 0x005;
/// User scratch register (N extension)
pub const USCRATCH: u16 = 0x040;

// ----------------------------------------------------------------------------
// Supervisor-level CSRs
// ----------------------------------------------------------------------------

/// Supervisor interrupt enable
pub const SIE: u16 = 0x104;
/// Supervisor trap handler base address
pub const STVEC: u16 = 0x105;
/// Supervisor counter enable
pub const SCOUNTEREN: u16 = 0x106;
/// Supervisor scratch register
pub const SSCRATCH: u16 = 0x140;
/// Supervisor address translation and protection
pub const SATP: u16 = 0x180;
/// Supervisor count overflow (Sscofpmf)
pub const SCOUNTOVF: u16 = 0xDA0;

// ----------------------------------------------------------------------------
// Machine-level CSRs
// ----------------------------------------------------------------------------

/// Machine status register
pub const MSTATUS: u16 = 0x300;
/// Machine ISA
pub const MISA: u16 = 0x301;
/// Machine exception delegation
pub const MEDELEG: u16 = 0x302;
/// Machine interrupt delegation
pub const MIDELEG: u16 = 0x303;
/// Machine interrupt enable
pub const MIE: u16 = 0x304;
/// Machine trap handler base address
pub const MTVEC: u16 = 0x305;
/// Machine counter enable
pub const MCOUNTEREN: u16 = 0x306;
/// Upper half of mstatus (RV32 only)
pub const MSTATUSH: u16 = 0x310;
/// Machine counter inhibit
pub const MCOUNTINHIBIT: u16 = 0x320;
/// Machine exception program counter
pub const MEPC: u16 = 0x341;
/// Machine trap cause
pub const MCAUSE: u16 = 0x342;
/// Machine trap value
pub const MTVAL: u16 = 0x343;
/// Machine trap instruction (H extension)
pub const MTINST: u16 = 0x34A;
/// Machine second trap value (H extension)
pub const MTVAL2: u16 = 0x34B;
/// Hardware thread ID
pub const MHARTID: u16 = 0xF14;

// Physical Memory Protection
/// PMP configuration 0 (first of 16)
pub const PMPCFG0: u16 = 0x3A0;
/// PMP address 0 (first of 64)
pub const PMPADDR0: u16 = 0x3B0;
/// Number of architecturally defined pmpaddr registers
pub const PMPADDR_COUNT: usize = 64;

// ----------------------------------------------------------------------------
// Counter/Timer CSRs
// ----------------------------------------------------------------------------

/// Timer (low)
pub const TIME: u16 = 0xC01;
/// First generic machine performance counter
pub const MHPMCOUNTER3: u16 = 0xB03;
/// Upper half of machine performance counter 3 (RV32 only)
pub const MHPMCOUNTER3H: u16 = 0xB83;

// ============================================================================
// Status Register Bits (mstatus)
// ============================================================================

/// Status register bits
pub mod status {
    /// Machine Interrupt Enable
    pub const MIE: usize = 1 << 3;
    /// Machine Previous Interrupt Enable
    pub const MPIE: usize = 1 << 7;
    /// Vector extension state (2 bits)
    pub const VS: usize = 0b11 << 9;
    /// Machine Previous Privilege (2 bits)
    pub const MPP: usize = 0b11 << 11;
    /// FP extension state (2 bits)
    pub const FS: usize = 0b11 << 13;

    /// MPP field shift
    pub const MPP_SHIFT: usize = 11;

    cfg_if::cfg_if! {
        if #[cfg(target_pointer_width = "64")] {
            /// Machine Previous Virtualization mode (RV64: lives in mstatus)
            pub const MPV: usize = 1 << 39;
        } else {
            /// Machine Previous Virtualization mode (RV32: lives in mstatush)
            pub const MPV: usize = 1 << 7;
        }
    }
}

// ============================================================================
// Interrupt Enable/Pending Bits (mie/mip/mideleg)
// ============================================================================

/// Interrupt bits
pub mod interrupt {
    /// Supervisor Software Interrupt
    pub const SSIP: usize = 1 << 1;
    /// Supervisor Timer Interrupt
    pub const STIP: usize = 1 << 5;
    /// Supervisor External Interrupt
    pub const SEIP: usize = 1 << 9;
    /// Local Counter Overflow Interrupt (Sscofpmf)
    pub const LCOFIP: usize = 1 << 13;

    /// All supervisor interrupts
    pub const S_ALL: usize = SSIP | STIP | SEIP;
}

// ============================================================================
// Trap Cause Codes (mcause)
// ============================================================================

/// Exception cause codes
pub mod exception {
    /// Instruction address misaligned
    pub const INSTRUCTION_MISALIGNED: usize = 0;
    /// Instruction access fault
    pub const INSTRUCTION_ACCESS_FAULT: usize = 1;
    /// Illegal instruction
    pub const ILLEGAL_INSTRUCTION: usize = 2;
    /// Breakpoint
    pub const BREAKPOINT: usize = 3;
    /// Environment call from U-mode
    pub const ECALL_FROM_U: usize = 8;
    /// Environment call from VS-mode
    pub const ECALL_FROM_VS: usize = 10;
    /// Instruction page fault
    pub const INSTRUCTION_PAGE_FAULT: usize = 12;
    /// Load page fault
    pub const LOAD_PAGE_FAULT: usize = 13;
    /// Store/AMO page fault
    pub const STORE_PAGE_FAULT: usize = 15;
    /// Instruction guest-page fault
    pub const INSTRUCTION_GUEST_PAGE_FAULT: usize = 20;
    /// Load guest-page fault
    pub const LOAD_GUEST_PAGE_FAULT: usize = 21;
    /// Virtual instruction
    pub const VIRTUAL_INSTRUCTION: usize = 22;
    /// Store/AMO guest-page fault
    pub const STORE_GUEST_PAGE_FAULT: usize = 23;
}

// ============================================================================
// MISA Extension Detection
// ============================================================================

/// ISA extension bits in MISA
pub mod misa {
    /// Bit for an extension letter, `None` for anything outside `A..=Z`
    pub const fn bit(ext: char) -> Option<usize> {
        match ext {
            'A'..='Z' => Some(1 << (ext as u32 - 'A' as u32)),
            'a'..='z' => Some(1 << (ext as u32 - 'a' as u32)),
            _ => None,
        }
    }
}

// ============================================================================
// CSR Access Seam
// ============================================================================

/// Machine-mode access to the CSRs of the current hart.
///
/// Unguarded accessors ([`read`](Self::read), [`write`](Self::write),
/// [`swap`](Self::swap)) must only target registers that the architecture
/// guarantees or the hart feature record has confirmed. Everything else goes
/// through the guarded accessors, which convert the resulting trap into an
/// `Err(TrapInfo)` instead of taking the hart down.
pub trait CsrAccess {
    /// Read a CSR known to exist
    fn read(&mut self, csr: u16) -> usize;

    /// Write a CSR known to exist
    fn write(&mut self, csr: u16, value: usize);

    /// Atomically write `value` and return the previous contents
    fn swap(&mut self, csr: u16, value: usize) -> usize;

    /// Read a CSR that may not exist
    fn read_allowed(&mut self, csr: u16) -> ProbeResult<usize>;

    /// Write a CSR that may not exist
    fn write_allowed(&mut self, csr: u16, value: usize) -> ProbeResult<()>;

    /// Select the expected-trap path used by the guarded accessors
    fn set_expected_trap(&mut self, path: ExpectedTrap);

    /// Zero f0..f31 and clear fcsr
    ///
    /// Only called once mstatus.FS has been observed enabled.
    fn reset_fp_state(&mut self);

    /// Stall the hart until the next interrupt
    fn wait_for_interrupt(&mut self);

    /// Return from M-mode into the mode programmed in mstatus.MPP at mepc,
    /// with `arg0`/`arg1` in a0/a1
    fn mret(&mut self, arg0: usize, arg1: usize) -> !;

    /// Check whether misa reports the given extension letter
    fn misa_extension(&mut self, ext: char) -> bool {
        match misa::bit(ext) {
            Some(bit) => self.read(MISA) & bit != 0,
            None => false,
        }
    }
}

/// Insert `value` into the field selected by `mask`
#[inline]
pub const fn insert_field(reg: usize, mask: usize, value: usize) -> usize {
    (reg & !mask) | ((value * (mask & mask.wrapping_neg())) & mask)
}
