//! # Simulated Hart
//!
//! A software model of one hart's CSR file, used to exercise feature
//! detection, PMP programming and mode switching on the host.
//!
//! Every CSR is either absent (guarded access traps, unguarded access is a
//! test failure) or present with a WARL write mask. Diverging operations
//! unwind with a [`SimExit`] payload; use [`run_to_exit`] to observe them.

use std::panic::{self, AssertUnwindSafe};
use std::vec::Vec;

use super::probe::{ExpectedTrap, ProbeResult, TrapInfo};
use super::*;

const CSR_SPACE: usize = 4096;

/// How a diverging operation left the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimExit {
    /// `mret` executed
    Mret {
        /// Value handed over in a0
        arg0: usize,
        /// Value handed over in a1
        arg1: usize,
    },
    /// `wfi` executed from the hang loop
    Parked,
}

#[derive(Debug, Clone, Copy)]
struct SimCsr {
    value: usize,
    mask: usize,
}

/// Simulated hart
#[derive(Debug)]
pub struct SimHart {
    csrs: Vec<Option<SimCsr>>,
    fp_regs: [u64; 32],
    expected_trap: ExpectedTrap,
    writes: Vec<(u16, usize)>,
    guarded_accesses: usize,
    guarded_traps: usize,
    fake_pc: usize,
}

impl SimHart {
    /// Create a hart implementing the given ISA letters (e.g. `"imafdcsuh"`)
    pub fn new(isa: &str) -> Self {
        let mut misa_val = 2usize << (usize::BITS - 2);
        for ext in isa.chars() {
            if let Some(bit) = misa::bit(ext) {
                misa_val |= bit;
            }
        }
        let has = |ext: char| misa::bit(ext).map_or(false, |bit| misa_val & bit != 0);

        let mut hart = Self {
            csrs: vec![None; CSR_SPACE],
            fp_regs: [0; 32],
            expected_trap: ExpectedTrap::Basic,
            writes: Vec::new(),
            guarded_accesses: 0,
            guarded_traps: 0,
            fake_pc: 0x8000_0000,
        };

        let mut mstatus_mask = status::MIE | status::MPIE | status::MPP;
        if has('F') || has('D') {
            mstatus_mask |= status::FS;
            hart.present(FCSR, 0, 0xFF);
        }
        if has('V') {
            mstatus_mask |= status::VS;
        }
        if has('H') {
            mstatus_mask |= status::MPV;
            hart.present(MTVAL2, 0, usize::MAX);
            hart.present(MTINST, 0, usize::MAX);
        }
        hart.present(MSTATUS, 0, mstatus_mask);
        hart.present(MISA, misa_val, 0);
        hart.present(MHARTID, 0, 0);
        for num in [MIE, MTVEC, MEPC, MCAUSE, MTVAL] {
            hart.present(num, 0, usize::MAX);
        }
        if has('S') {
            for num in [MEDELEG, MIDELEG, SIE, STVEC, SSCRATCH, SATP] {
                hart.present(num, 0, usize::MAX);
            }
        }
        if has('N') {
            for num in [UIE, UTVEC, USCRATCH] {
                hart.present(num, 0, usize::MAX);
            }
        }
        hart
    }

    fn present(&mut self, num: u16, value: usize, mask: usize) {
        self.csrs[num as usize] = Some(SimCsr { value, mask });
    }

    /// Add a fully writable CSR
    pub fn with_csr(mut self, num: u16, value: usize) -> Self {
        self.present(num, value, usize::MAX);
        self
    }

    /// Implement `count` PMP entries with the given address width and
    /// granularity (log2 bytes)
    ///
    /// All 64 pmpaddr registers exist; those past `count` are hardwired to
    /// zero, as on real silicon.
    pub fn with_pmp(mut self, count: usize, addr_bits: u32, gran_log2: u32) -> Self {
        if count == 0 {
            return self;
        }
        let addr_mask = ((1usize << addr_bits) - 1) & !((1usize << (gran_log2 - 2)) - 1);
        for n in 0..PMPADDR_COUNT {
            let mask = if n < count { addr_mask } else { 0 };
            self.present(PMPADDR0 + n as u16, 0, mask);
        }
        for reg in (0..16).step_by(2) {
            let mut mask = 0usize;
            for byte in 0..8 {
                if reg / 2 * 8 + byte < count {
                    mask |= 0xFF << (byte * 8);
                }
            }
            self.present(PMPCFG0 + reg as u16, 0, mask);
        }
        self
    }

    /// Implement `count` generic performance counters of `bits` width
    pub fn with_mhpm(mut self, count: usize, bits: u32) -> Self {
        let mask = if bits >= usize::BITS { usize::MAX } else { (1usize << bits) - 1 };
        for n in 0..count {
            self.present(MHPMCOUNTER3 + n as u16, 0, mask);
        }
        self
    }

    /// Make mstatus.FS read-only zero even though misa reports F/D
    pub fn with_fs_hardwired(mut self) -> Self {
        if let Some(reg) = self.csrs[MSTATUS as usize].as_mut() {
            reg.mask &= !status::FS;
            reg.value &= !status::FS;
        }
        self
    }

    /// Current value of a CSR, `None` if absent
    pub fn csr(&self, num: u16) -> Option<usize> {
        self.csrs[num as usize].map(|reg| reg.value)
    }

    /// Overwrite a present CSR, ignoring its write mask
    pub fn write_raw(&mut self, num: u16, value: usize) {
        if let Some(reg) = self.csrs[num as usize].as_mut() {
            reg.value = value;
        }
    }

    /// Write an FP register directly
    pub fn set_fp_reg(&mut self, index: usize, value: u64) {
        self.fp_regs[index] = value;
    }

    /// FP register file
    pub fn fp_regs(&self) -> &[u64; 32] {
        &self.fp_regs
    }

    /// Selected expected-trap path
    pub fn expected_trap(&self) -> ExpectedTrap {
        self.expected_trap
    }

    /// Every successful CSR write, in program order
    pub fn writes(&self) -> &[(u16, usize)] {
        &self.writes
    }

    /// Writes to one CSR, in program order
    pub fn writes_to(&self, num: u16) -> Vec<usize> {
        self.writes.iter().filter(|(csr, _)| *csr == num).map(|(_, value)| *value).collect()
    }

    /// Number of guarded accesses performed
    pub fn guarded_accesses(&self) -> usize {
        self.guarded_accesses
    }

    /// Number of guarded accesses that trapped
    pub fn guarded_traps(&self) -> usize {
        self.guarded_traps
    }

    fn trap(&mut self) -> TrapInfo {
        self.guarded_traps += 1;
        self.fake_pc += 4;
        TrapInfo::illegal_instruction(self.fake_pc)
    }

    fn store(&mut self, num: u16, value: usize) -> bool {
        match self.csrs[num as usize].as_mut() {
            Some(reg) => {
                reg.value = (reg.value & !reg.mask) | (value & reg.mask);
                self.writes.push((num, value));
                true
            }
            None => false,
        }
    }
}

impl CsrAccess for SimHart {
    fn read(&mut self, csr: u16) -> usize {
        match self.csr(csr) {
            Some(value) => value,
            None => panic!("unguarded read of missing csr {:#05x}", csr),
        }
    }

    fn write(&mut self, csr: u16, value: usize) {
        if !self.store(csr, value) {
            panic!("unguarded write of missing csr {:#05x}", csr);
        }
    }

    fn swap(&mut self, csr: u16, value: usize) -> usize {
        let old = self.read(csr);
        self.write(csr, value);
        old
    }

    fn read_allowed(&mut self, csr: u16) -> ProbeResult<usize> {
        self.guarded_accesses += 1;
        match self.csr(csr) {
            Some(value) => Ok(value),
            None => Err(self.trap()),
        }
    }

    fn write_allowed(&mut self, csr: u16, value: usize) -> ProbeResult<()> {
        self.guarded_accesses += 1;
        if self.store(csr, value) {
            Ok(())
        } else {
            Err(self.trap())
        }
    }

    fn set_expected_trap(&mut self, path: ExpectedTrap) {
        self.expected_trap = path;
    }

    fn reset_fp_state(&mut self) {
        self.fp_regs = [0; 32];
        self.write(FCSR, 0);
    }

    fn wait_for_interrupt(&mut self) {
        panic::panic_any(SimExit::Parked);
    }

    fn mret(&mut self, arg0: usize, arg1: usize) -> ! {
        panic::panic_any(SimExit::Mret { arg0, arg1 });
    }
}

/// Run a diverging operation and report how it left the simulator
pub fn run_to_exit<F: FnOnce()>(f: F) -> SimExit {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => panic!("operation returned instead of diverging"),
        Err(payload) => match payload.downcast::<SimExit>() {
            Ok(exit) => *exit,
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}
