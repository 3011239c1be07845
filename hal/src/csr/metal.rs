//! # Bare-Metal CSR Access
//!
//! [`CsrAccess`] backend for a real hart executing in M-mode.
//!
//! CSR numbers are immediates in the `csr*` instructions, so dynamic CSR
//! numbers are dispatched through a table of every register this layer
//! touches; each arm is a const-generic accessor.
//!
//! Guarded accesses swap mtvec to an expected-trap handler for the duration
//! of one instruction. The handler stores mepc/mcause/mtval (and
//! mtval2/mtinst on the hypervisor path) into the [`TrapInfo`] pointed to by
//! a3, steps mepc over the faulting instruction and returns.

use core::arch::{asm, global_asm};
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use super::probe::{ExpectedTrap, ProbeResult, TrapInfo};
use super::CsrAccess;

// ============================================================================
// Expected-Trap Handlers
// ============================================================================

cfg_if::cfg_if! {
    if #[cfg(target_arch = "riscv64")] {
        global_asm!(
            r#"
    .section .text.helix_expected_trap, "ax", @progbits
    .align 3
    .global __helix_expected_trap
__helix_expected_trap:
    csrr a4, mepc
    sd   a4, 0(a3)
    csrr a4, mcause
    sd   a4, 8(a3)
    csrr a4, mtval
    sd   a4, 16(a3)
    sd   zero, 24(a3)
    sd   zero, 32(a3)
    csrr a4, mepc
    addi a4, a4, 4
    csrw mepc, a4
    mret

    .align 3
    .global __helix_expected_trap_hext
__helix_expected_trap_hext:
    csrr a4, mepc
    sd   a4, 0(a3)
    csrr a4, mcause
    sd   a4, 8(a3)
    csrr a4, mtval
    sd   a4, 16(a3)
    csrr a4, 0x34b
    sd   a4, 24(a3)
    csrr a4, 0x34a
    sd   a4, 32(a3)
    csrr a4, mepc
    addi a4, a4, 4
    csrw mepc, a4
    mret
"#
        );
    } else {
        global_asm!(
            r#"
    .section .text.helix_expected_trap, "ax", @progbits
    .align 2
    .global __helix_expected_trap
__helix_expected_trap:
    csrr a4, mepc
    sw   a4, 0(a3)
    csrr a4, mcause
    sw   a4, 4(a3)
    csrr a4, mtval
    sw   a4, 8(a3)
    sw   zero, 12(a3)
    sw   zero, 16(a3)
    csrr a4, mepc
    addi a4, a4, 4
    csrw mepc, a4
    mret

    .align 2
    .global __helix_expected_trap_hext
__helix_expected_trap_hext:
    csrr a4, mepc
    sw   a4, 0(a3)
    csrr a4, mcause
    sw   a4, 4(a3)
    csrr a4, mtval
    sw   a4, 8(a3)
    csrr a4, 0x34b
    sw   a4, 12(a3)
    csrr a4, 0x34a
    sw   a4, 16(a3)
    csrr a4, mepc
    addi a4, a4, 4
    csrw mepc, a4
    mret
"#
        );
    }
}

extern "C" {
    fn __helix_expected_trap();
    fn __helix_expected_trap_hext();
}

/// Handler installed around guarded accesses, 0 until selected
static EXPECTED_TRAP: AtomicUsize = AtomicUsize::new(0);

#[inline]
fn expected_trap_addr() -> usize {
    match EXPECTED_TRAP.load(Ordering::Relaxed) {
        0 => __helix_expected_trap as usize,
        addr => addr,
    }
}

// ============================================================================
// CSR Dispatch
// ============================================================================

/// Expand `$f::<N> $args` for every CSR number this layer may touch
macro_rules! csr_dispatch {
    ($csr:expr, $f:ident $args:tt, $fallback:expr) => {
        csr_dispatch!(@table $csr, $f, $args, $fallback, [
            0x003, 0x004, 0x005, 0x040, 0x104, 0x105, 0x106, 0x140, 0x180, 0x300, 0x301, 0x302,
            0x303, 0x304, 0x305, 0x306, 0x310, 0x320, 0x341, 0x342, 0x343, 0x34A, 0x34B, 0x3A0,
            0x3A1, 0x3A2, 0x3A3, 0x3A4, 0x3A5, 0x3A6, 0x3A7, 0x3A8, 0x3A9, 0x3AA, 0x3AB, 0x3AC,
            0x3AD, 0x3AE, 0x3AF, 0x3B0, 0x3B1, 0x3B2, 0x3B3, 0x3B4, 0x3B5, 0x3B6, 0x3B7, 0x3B8,
            0x3B9, 0x3BA, 0x3BB, 0x3BC, 0x3BD, 0x3BE, 0x3BF, 0x3C0, 0x3C1, 0x3C2, 0x3C3, 0x3C4,
            0x3C5, 0x3C6, 0x3C7, 0x3C8, 0x3C9, 0x3CA, 0x3CB, 0x3CC, 0x3CD, 0x3CE, 0x3CF, 0x3D0,
            0x3D1, 0x3D2, 0x3D3, 0x3D4, 0x3D5, 0x3D6, 0x3D7, 0x3D8, 0x3D9, 0x3DA, 0x3DB, 0x3DC,
            0x3DD, 0x3DE, 0x3DF, 0x3E0, 0x3E1, 0x3E2, 0x3E3, 0x3E4, 0x3E5, 0x3E6, 0x3E7, 0x3E8,
            0x3E9, 0x3EA, 0x3EB, 0x3EC, 0x3ED, 0x3EE, 0x3EF, 0xB03, 0xB04, 0xB05, 0xB06, 0xB07,
            0xB08, 0xB09, 0xB0A, 0xB0B, 0xB0C, 0xB0D, 0xB0E, 0xB0F, 0xB10, 0xB11, 0xB12, 0xB13,
            0xB14, 0xB15, 0xB16, 0xB17, 0xB18, 0xB19, 0xB1A, 0xB1B, 0xB1C, 0xB1D, 0xB1E, 0xB1F,
            0xB83, 0xB84, 0xB85, 0xB86, 0xB87, 0xB88, 0xB89, 0xB8A, 0xB8B, 0xB8C, 0xB8D, 0xB8E,
            0xB8F, 0xB90, 0xB91, 0xB92, 0xB93, 0xB94, 0xB95, 0xB96, 0xB97, 0xB98, 0xB99, 0xB9A,
            0xB9B, 0xB9C, 0xB9D, 0xB9E, 0xB9F, 0xC01, 0xDA0, 0xF14,
        ])
    };
    (@table $csr:expr, $f:ident, $args:tt, $fallback:expr, [$($num:literal),* $(,)?]) => {
        match $csr {
            $( $num => $f::<$num> $args, )*
            _ => $fallback,
        }
    };
}

/// Unguarded access to a CSR the dispatch table does not know
#[cold]
fn missing_csr(csr: u16) -> ! {
    unreachable!("csr {:#05x} is not in the dispatch table", csr)
}

#[inline(always)]
unsafe fn csrr<const CSR: u16>() -> usize {
    let value: usize;
    unsafe {
        asm!("csrr {value}, {csr}", value = out(reg) value, csr = const CSR, options(nostack));
    }
    value
}

#[inline(always)]
unsafe fn csrw<const CSR: u16>(value: usize) {
    unsafe {
        asm!("csrw {csr}, {value}", value = in(reg) value, csr = const CSR, options(nostack));
    }
}

#[inline(always)]
unsafe fn csrrw<const CSR: u16>(value: usize) -> usize {
    let old: usize;
    unsafe {
        asm!(
            "csrrw {old}, {csr}, {value}",
            old = out(reg) old,
            value = in(reg) value,
            csr = const CSR,
            options(nostack),
        );
    }
    old
}

#[inline(always)]
unsafe fn csrr_allowed<const CSR: u16>(trap: *mut TrapInfo) -> usize {
    let value: usize;
    unsafe {
        asm!(
            "csrrw {mtvec}, mtvec, {mtvec}",
            "csrr {value}, {csr}",
            "csrw mtvec, {mtvec}",
            mtvec = inout(reg) expected_trap_addr() => _,
            value = inout(reg) 0usize => value,
            csr = const CSR,
            in("a3") trap,
            out("a4") _,
            options(nostack),
        );
    }
    value
}

#[inline(always)]
unsafe fn csrw_allowed<const CSR: u16>(trap: *mut TrapInfo, value: usize) {
    unsafe {
        asm!(
            "csrrw {mtvec}, mtvec, {mtvec}",
            "csrw {csr}, {value}",
            "csrw mtvec, {mtvec}",
            mtvec = inout(reg) expected_trap_addr() => _,
            value = in(reg) value,
            csr = const CSR,
            in("a3") trap,
            out("a4") _,
            options(nostack),
        );
    }
}

// ============================================================================
// Machine-Mode Hart
// ============================================================================

/// The hart this code is executing on
#[derive(Debug)]
pub struct MetalHart {
    _private: (),
}

impl MetalHart {
    /// Access the current hart's CSRs
    ///
    /// # Safety
    /// Must be executing in M-mode, with mtvec owned by this firmware.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl CsrAccess for MetalHart {
    fn read(&mut self, csr: u16) -> usize {
        unsafe {
            csr_dispatch!(csr, csrr(), missing_csr(csr))
        }
    }

    fn write(&mut self, csr: u16, value: usize) {
        unsafe {
            csr_dispatch!(csr, csrw(value), missing_csr(csr))
        }
    }

    fn swap(&mut self, csr: u16, value: usize) -> usize {
        unsafe {
            csr_dispatch!(csr, csrrw(value), missing_csr(csr))
        }
    }

    fn read_allowed(&mut self, csr: u16) -> ProbeResult<usize> {
        let mut trap = TrapInfo::default();
        let slot: *mut TrapInfo = &mut trap;
        let value = unsafe {
            csr_dispatch!(csr, csrr_allowed(slot), {
                ptr::write_volatile(slot, TrapInfo::illegal_instruction(0));
                0
            })
        };
        if unsafe { ptr::read_volatile(slot) }.cause != 0 {
            Err(trap)
        } else {
            Ok(value)
        }
    }

    fn write_allowed(&mut self, csr: u16, value: usize) -> ProbeResult<()> {
        let mut trap = TrapInfo::default();
        let slot: *mut TrapInfo = &mut trap;
        unsafe {
            csr_dispatch!(csr, csrw_allowed(slot, value), {
                ptr::write_volatile(slot, TrapInfo::illegal_instruction(0));
            })
        }
        if unsafe { ptr::read_volatile(slot) }.cause != 0 {
            Err(trap)
        } else {
            Ok(())
        }
    }

    fn set_expected_trap(&mut self, path: ExpectedTrap) {
        let addr = match path {
            ExpectedTrap::Basic => __helix_expected_trap as usize,
            ExpectedTrap::Hypervisor => __helix_expected_trap_hext as usize,
        };
        EXPECTED_TRAP.store(addr, Ordering::Relaxed);
    }

    fn reset_fp_state(&mut self) {
        #[allow(unused_macros)]
        macro_rules! zero_fp_regs {
            ($insn:literal: $($reg:literal)*) => {
                unsafe {
                    asm!(
                        $(concat!($insn, " ", $reg, ", zero"),)*
                        "csrw fcsr, zero",
                        options(nomem, nostack),
                    )
                }
            };
        }

        cfg_if::cfg_if! {
            if #[cfg(target_feature = "d")] {
                zero_fp_regs!("fcvt.d.w":
                    "f0" "f1" "f2" "f3" "f4" "f5" "f6" "f7" "f8" "f9" "f10" "f11" "f12" "f13"
                    "f14" "f15" "f16" "f17" "f18" "f19" "f20" "f21" "f22" "f23" "f24" "f25"
                    "f26" "f27" "f28" "f29" "f30" "f31");
            } else if #[cfg(target_feature = "f")] {
                zero_fp_regs!("fmv.w.x":
                    "f0" "f1" "f2" "f3" "f4" "f5" "f6" "f7" "f8" "f9" "f10" "f11" "f12" "f13"
                    "f14" "f15" "f16" "f17" "f18" "f19" "f20" "f21" "f22" "f23" "f24" "f25"
                    "f26" "f27" "f28" "f29" "f30" "f31");
            }
        }
    }

    fn wait_for_interrupt(&mut self) {
        unsafe {
            asm!("wfi", options(nomem, nostack));
        }
    }

    fn mret(&mut self, arg0: usize, arg1: usize) -> ! {
        unsafe {
            asm!("mret", in("a0") arg0, in("a1") arg1, options(noreturn));
        }
    }
}
