// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The 32-byte shared-memory contract between the bootloader and the
//! application it boots.
//!
//! Persisted across a reset in a fixed, linker-placed RAM region. A single
//! CRC-8 in byte 0 covers the remaining 31 bytes; any corruption is treated
//! as "no prior state" rather than trusted.

use crate::crc::crc8_frame;
use crate::status::BootStatus;

/// Reason the bootloader believes it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootReason {
    /// No opinion yet / first boot.
    None = 0,
    /// Application explicitly requested entry into the bootloader.
    App = 1,
    /// Host tooling over the wire protocol requested entry.
    Com = 2,
    /// A watchdog reset occurred.
    Wdt = 3,
}

impl BootReason {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => BootReason::App,
            2 => BootReason::Com,
            3 => BootReason::Wdt,
            _ => BootReason::None,
        }
    }
}

pub const SHARED_MEM_VERSION: u8 = 1;
pub const SHARED_MEM_SIZE: usize = 32;

#[repr(C)]
#[derive(Clone, Copy)]
struct Ctrl {
    crc: u8,
    ver: u8,
    reserved: [u8; 6],
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Data {
    boot_ver: u32,
    boot_reason: u8,
    boot_cnt: u8,
    reserved: [u8; 18],
}

#[repr(C)]
#[derive(Clone, Copy)]
struct Raw {
    ctrl: Ctrl,
    data: Data,
}

const _: () = assert!(core::mem::size_of::<Raw>() == SHARED_MEM_SIZE);

/// Owns the persisted shared-memory window and mediates all access to it.
///
/// On the embedded target this wraps a `&'static mut [u8; 32]` placed by the
/// linker script at a fixed address; in host-side tests it owns a plain
/// array.
pub struct SharedMemory<'a> {
    bytes: &'a mut [u8; SHARED_MEM_SIZE],
}

impl<'a> SharedMemory<'a> {
    /// Wrap an existing 32-byte region without touching its contents.
    ///
    /// # Safety
    /// `bytes` must be the sole owner of the backing memory for the lifetime
    /// `'a`; on the embedded target that means no other code may alias the
    /// linker-placed shared-memory region while this value is alive.
    pub unsafe fn wrap(bytes: &'a mut [u8; SHARED_MEM_SIZE]) -> Self {
        Self { bytes }
    }

    fn raw(&self) -> Raw {
        unsafe { core::ptr::read_unaligned(self.bytes.as_ptr() as *const Raw) }
    }

    fn write_raw(&mut self, raw: Raw) {
        unsafe {
            core::ptr::write_unaligned(self.bytes.as_mut_ptr() as *mut Raw, raw);
        }
        self.bytes[0] = crc8_frame(&self.bytes[1..]);
    }

    fn crc_is_valid(&self) -> bool {
        self.bytes[0] == crc8_frame(&self.bytes[1..])
    }

    /// Validate the stored record. If the CRC doesn't check out, the region
    /// is reset to a fresh record with `boot_cnt = 1`. If it does check out,
    /// `boot_cnt` is incremented (saturating) on every call: every reset
    /// increments the counter, it is never merely read back unchanged.
    pub fn init(&mut self) -> BootReason {
        if !self.crc_is_valid() {
            let raw = Raw {
                ctrl: Ctrl {
                    crc: 0,
                    ver: SHARED_MEM_VERSION,
                    reserved: [0; 6],
                },
                data: Data {
                    boot_ver: 0,
                    boot_reason: BootReason::None as u8,
                    boot_cnt: 1,
                    reserved: [0; 18],
                },
            };
            self.write_raw(raw);
            return BootReason::None;
        }

        let mut raw = self.raw();
        raw.data.boot_cnt = raw.data.boot_cnt.saturating_add(1);
        let reason = BootReason::from_u8(raw.data.boot_reason);
        self.write_raw(raw);
        reason
    }

    pub fn get_version(&self) -> Result<u8, BootStatus> {
        if !self.crc_is_valid() {
            return Err(BootStatus::CrcError);
        }
        Ok(self.raw().ctrl.ver)
    }

    pub fn get_boot_reason(&self) -> Result<BootReason, BootStatus> {
        if !self.crc_is_valid() {
            return Err(BootStatus::CrcError);
        }
        Ok(BootReason::from_u8(self.raw().data.boot_reason))
    }

    pub fn set_boot_reason(&mut self, reason: BootReason) {
        let mut raw = self.raw();
        raw.data.boot_reason = reason as u8;
        self.write_raw(raw);
    }

    pub fn get_boot_count(&self) -> Result<u8, BootStatus> {
        if !self.crc_is_valid() {
            return Err(BootStatus::CrcError);
        }
        Ok(self.raw().data.boot_cnt)
    }

    pub fn reset_boot_count(&mut self) {
        let mut raw = self.raw();
        raw.data.boot_cnt = 0;
        self.write_raw(raw);
    }

    pub fn get_boot_version(&self) -> Result<u32, BootStatus> {
        if !self.crc_is_valid() {
            return Err(BootStatus::CrcError);
        }
        Ok(self.raw().data.boot_ver)
    }

    pub fn set_boot_version(&mut self, version: u32) {
        let mut raw = self.raw();
        raw.data.boot_ver = version;
        self.write_raw(raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> [u8; SHARED_MEM_SIZE] {
        [0xFF; SHARED_MEM_SIZE]
    }

    #[test]
    fn corrupt_region_resets_and_counts_one() {
        let mut backing = fresh();
        let mut mem = unsafe { SharedMemory::wrap(&mut backing) };
        let reason = mem.init();
        assert_eq!(reason, BootReason::None);
        assert_eq!(mem.get_boot_count().unwrap(), 1);
    }

    #[test]
    fn boot_count_increments_every_init() {
        let mut backing = fresh();
        let mut mem = unsafe { SharedMemory::wrap(&mut backing) };
        mem.init();
        assert_eq!(mem.get_boot_count().unwrap(), 1);
        mem.init();
        assert_eq!(mem.get_boot_count().unwrap(), 2);
        mem.init();
        assert_eq!(mem.get_boot_count().unwrap(), 3);
    }

    #[test]
    fn boot_count_saturates_instead_of_wrapping() {
        let mut backing = fresh();
        let mut mem = unsafe { SharedMemory::wrap(&mut backing) };
        mem.init();
        for _ in 0..300 {
            mem.init();
        }
        assert_eq!(mem.get_boot_count().unwrap(), 255);
    }

    #[test]
    fn reset_boot_count_clears_on_confirmed_boot() {
        let mut backing = fresh();
        let mut mem = unsafe { SharedMemory::wrap(&mut backing) };
        mem.init();
        mem.init();
        assert_eq!(mem.get_boot_count().unwrap(), 2);
        mem.reset_boot_count();
        assert_eq!(mem.get_boot_count().unwrap(), 0);
    }

    #[test]
    fn boot_reason_round_trips() {
        let mut backing = fresh();
        let mut mem = unsafe { SharedMemory::wrap(&mut backing) };
        mem.init();
        mem.set_boot_reason(BootReason::Com);
        assert_eq!(mem.get_boot_reason().unwrap(), BootReason::Com);
    }

    #[test]
    fn boot_version_round_trips() {
        let mut backing = fresh();
        let mut mem = unsafe { SharedMemory::wrap(&mut backing) };
        mem.init();
        mem.set_boot_version(0x0001_0203);
        assert_eq!(mem.get_boot_version().unwrap(), 0x0001_0203);
    }

    #[test]
    fn tampered_byte_is_detected_as_crc_error() {
        let mut backing = fresh();
        {
            let mut mem = unsafe { SharedMemory::wrap(&mut backing) };
            mem.init();
        }
        backing[10] ^= 0xFF;
        let mem = unsafe { SharedMemory::wrap(&mut backing) };
        assert_eq!(mem.get_boot_count(), Err(BootStatus::CrcError));
    }
}
