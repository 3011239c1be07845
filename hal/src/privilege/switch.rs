//! # Mode Switch
//!
//! The last thing the firmware does on a hart: leave M-mode for the next
//! boot stage. Neither function here returns.

use super::PrivilegeMode;
use crate::csr::{self, insert_field, status, CsrAccess};

/// Park the hart forever
pub fn hang<C: CsrAccess + ?Sized>(csr: &mut C) -> ! {
    loop {
        csr.wait_for_interrupt();
    }
}

/// Enter `next_mode` at `next_addr` with `arg0`/`arg1` in a0/a1
///
/// `next_mode` uses the mstatus.MPP encoding. A mode the hart does not
/// implement parks the hart instead: the request is a firmware
/// configuration bug and there is no sane mode to fall back to.
///
/// `next_virt` selects a guest (VS/VU) target on harts with the H extension
/// and is ignored elsewhere.
pub fn switch_mode<C: CsrAccess + ?Sized>(
    csr: &mut C,
    arg0: usize,
    arg1: usize,
    next_addr: usize,
    next_mode: usize,
    next_virt: bool,
) -> ! {
    let mode = match PrivilegeMode::try_from(next_mode) {
        Ok(mode) => mode,
        Err(raw) => {
            log::error!("switch to invalid privilege mode {}", raw);
            hang(csr)
        },
    };
    if let Some(ext) = mode.required_extension() {
        if !csr.misa_extension(ext) {
            log::error!("switch to {} on a hart without misa.{}", mode, ext);
            hang(csr);
        }
    }

    let has_h = csr.misa_extension('H');
    let mut mstatus = csr.read(csr::MSTATUS);
    mstatus = insert_field(mstatus, status::MPP, mode as usize);
    mstatus = insert_field(mstatus, status::MPIE, 0);

    #[cfg(target_pointer_width = "64")]
    if has_h {
        mstatus = insert_field(mstatus, status::MPV, next_virt as usize);
    }
    #[cfg(not(target_pointer_width = "64"))]
    if has_h {
        let mstatush = csr.read(csr::MSTATUSH);
        csr.write(csr::MSTATUSH, insert_field(mstatush, status::MPV, next_virt as usize));
    }

    csr.write(csr::MSTATUS, mstatus);
    csr.write(csr::MEPC, next_addr);

    match mode {
        PrivilegeMode::Supervisor => {
            csr.write(csr::STVEC, next_addr);
            csr.write(csr::SSCRATCH, 0);
            csr.write(csr::SIE, 0);
            csr.write(csr::SATP, 0);
        },
        PrivilegeMode::User if csr.misa_extension('N') => {
            csr.write(csr::UTVEC, next_addr);
            csr.write(csr::USCRATCH, 0);
            csr.write(csr::UIE, 0);
        },
        _ => {},
    }

    log::debug!("entering {} at {:#x}", mode, next_addr);
    csr.mret(arg0, arg1)
}
