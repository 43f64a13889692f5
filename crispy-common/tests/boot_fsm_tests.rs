// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! End-to-end scenarios for the image lifecycle: Idle -> Prepare -> Flash ->
//! Exit, driven through `Bootloader::handle_frame` rather than the FSM
//! directly, so the frame/opcode dispatch is exercised too.

use std::collections::HashMap;

use crispy_common::crc::{crc32_image, crc8_frame};
use crispy_common::image::IMAGE_HEADER_SIZE;
use crispy_common::shared_mem::SHARED_MEM_SIZE;
use crispy_common::status::BootStatus;
use crispy_common::{BootConfig, BootState, Bootloader, FlashDriver, MsgStatus, PublicKeyProvider, Watchdog};

struct FakeFlash {
    bytes: HashMap<u32, u8>,
}

impl FakeFlash {
    fn new() -> Self {
        Self {
            bytes: HashMap::new(),
        }
    }
}

impl FlashDriver for FakeFlash {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), BootStatus> {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = *self.bytes.get(&(addr + i as u32)).unwrap_or(&0xFF);
        }
        Ok(())
    }
    fn erase(&mut self, addr: u32, len: u32) -> Result<(), BootStatus> {
        for i in 0..len {
            self.bytes.insert(addr + i, 0xFF);
        }
        Ok(())
    }
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), BootStatus> {
        for (i, &b) in data.iter().enumerate() {
            self.bytes.insert(addr + i as u32, b);
        }
        Ok(())
    }
}

struct FakeWatchdog(u32);
impl Watchdog for FakeWatchdog {
    fn kick(&mut self) {
        self.0 += 1;
    }
}

struct NoKeys;
impl PublicKeyProvider for NoKeys {
    fn public_key(&self) -> &[u8] {
        &[]
    }
}

const HEADER_ADDR: u32 = 0x1000_0000;
const FW_ADDR: u32 = 0x1001_0000;

fn header_bytes_for(body: &[u8], sw_ver: u32, hw_ver: u16) -> [u8; IMAGE_HEADER_SIZE] {
    let mut header = crispy_common::ImageHeader {
        ver: 1,
        sig_type: 0,
        hw_ver,
        sw_ver,
        fw_size: body.len() as u32,
        fw_crc: crc32_image(body),
        fw_addr: FW_ADDR,
        signature: [0; 64],
        reserved: [0; 171],
        crc: 0,
    };
    header.crc = crc8_frame(&header.as_bytes()[..IMAGE_HEADER_SIZE - 1]);
    *header.as_bytes()
}

/// Scenario 1: full Prepare -> Flash -> Exit cycle with a valid CRC32 image
/// ends in `Idle` with `Ok` on every step.
#[test]
fn scenario_happy_path_crc32_image() {
    let mut shared_mem_bytes = [0u8; SHARED_MEM_SIZE];
    let mut bl = Bootloader::new(&mut shared_mem_bytes, HEADER_ADDR, BootConfig::default_const());
    let mut flash = FakeFlash::new();
    let mut wdt = FakeWatchdog(0);
    let keys = NoKeys;

    let body = [0xAAu8; 64];
    let mut header = header_bytes_for(&body, 2, 1);

    assert_eq!(
        bl.handle_frame(0, crispy_common::Opcode::Connect as u8, &mut [], 1, &mut flash, &mut wdt, &keys, None),
        MsgStatus::Ok
    );
    assert_eq!(
        bl.handle_frame(1, crispy_common::Opcode::Prepare as u8, &mut header, 1, &mut flash, &mut wdt, &keys, None),
        MsgStatus::Ok
    );
    assert_eq!(bl.fsm.state(), BootState::Flash);

    let mut body_chunk = body;
    assert_eq!(
        bl.handle_frame(2, crispy_common::Opcode::Flash as u8, &mut body_chunk, 1, &mut flash, &mut wdt, &keys, None),
        MsgStatus::Ok
    );
    assert_eq!(bl.fsm.state(), BootState::Exit);

    assert_eq!(
        bl.handle_frame(3, crispy_common::Opcode::Exit as u8, &mut [], 1, &mut flash, &mut wdt, &keys, None),
        MsgStatus::Ok
    );
    assert_eq!(bl.fsm.state(), BootState::Idle);
    assert!(wdt.0 > 0);
}

/// Scenario 2: a lower `sw_ver` than what is currently running is rejected
/// at `Prepare`, before any flash is touched.
#[test]
fn scenario_downgrade_rejected() {
    let mut shared_mem_bytes = [0u8; SHARED_MEM_SIZE];
    let mut bl = Bootloader::new(&mut shared_mem_bytes, HEADER_ADDR, BootConfig::default_const());
    let mut flash = FakeFlash::new();
    let mut wdt = FakeWatchdog(0);
    let keys = NoKeys;

    bl.handle_frame(0, crispy_common::Opcode::Connect as u8, &mut [], 5, &mut flash, &mut wdt, &keys, None);
    let mut header = header_bytes_for(&[1, 2, 3, 4], 1, 1);
    let status = bl.handle_frame(1, crispy_common::Opcode::Prepare as u8, &mut header, 5, &mut flash, &mut wdt, &keys, None);
    assert_eq!(status, MsgStatus::FwVersion);
    assert_eq!(bl.fsm.state(), BootState::Idle);
}

/// Scenario 3: a hardware version mismatch is rejected at `Prepare`.
#[test]
fn scenario_hw_version_mismatch_rejected() {
    let mut shared_mem_bytes = [0u8; SHARED_MEM_SIZE];
    let mut config = BootConfig::default_const();
    config.hw_version = 7;
    let mut bl = Bootloader::new(&mut shared_mem_bytes, HEADER_ADDR, config);
    let mut flash = FakeFlash::new();
    let mut wdt = FakeWatchdog(0);
    let keys = NoKeys;

    bl.handle_frame(0, crispy_common::Opcode::Connect as u8, &mut [], 1, &mut flash, &mut wdt, &keys, None);
    let mut header = header_bytes_for(&[1, 2, 3, 4], 1, 1);
    let status = bl.handle_frame(1, crispy_common::Opcode::Prepare as u8, &mut header, 1, &mut flash, &mut wdt, &keys, None);
    assert_eq!(status, MsgStatus::HwVersion);
}

/// Scenario 4: data corrupted in transit (written bytes don't match the
/// header's CRC-32) is only caught at `Exit`, and the header is poisoned.
#[test]
fn scenario_corrupted_body_caught_at_exit() {
    let mut shared_mem_bytes = [0u8; SHARED_MEM_SIZE];
    let mut bl = Bootloader::new(&mut shared_mem_bytes, HEADER_ADDR, BootConfig::default_const());
    let mut flash = FakeFlash::new();
    let mut wdt = FakeWatchdog(0);
    let keys = NoKeys;

    let body = [0x11u8; 32];
    let mut header = header_bytes_for(&body, 1, 1);
    bl.handle_frame(0, crispy_common::Opcode::Connect as u8, &mut [], 1, &mut flash, &mut wdt, &keys, None);
    bl.handle_frame(1, crispy_common::Opcode::Prepare as u8, &mut header, 1, &mut flash, &mut wdt, &keys, None);

    let mut wrong_body = [0x22u8; 32];
    assert_eq!(
        bl.handle_frame(2, crispy_common::Opcode::Flash as u8, &mut wrong_body, 1, &mut flash, &mut wdt, &keys, None),
        MsgStatus::Ok
    );

    let status = bl.handle_frame(3, crispy_common::Opcode::Exit as u8, &mut [], 1, &mut flash, &mut wdt, &keys, None);
    assert_eq!(status, MsgStatus::Validation);
    assert_eq!(bl.fsm.state(), BootState::Idle);

    let mut readback = [0u8; IMAGE_HEADER_SIZE];
    flash.read(HEADER_ADDR, &mut readback).unwrap();
    assert!(readback.iter().all(|&b| b == 0xFF));
}

/// Scenario 5: the host goes silent mid-flash; the next tick past the
/// configured timeout reverts the FSM to `Idle`.
#[test]
fn scenario_host_silence_times_out_mid_flash() {
    let mut shared_mem_bytes = [0u8; SHARED_MEM_SIZE];
    let config = BootConfig::default_const();
    let mut bl = Bootloader::new(&mut shared_mem_bytes, HEADER_ADDR, config);
    let mut flash = FakeFlash::new();
    let mut wdt = FakeWatchdog(0);
    let keys = NoKeys;

    let mut header = header_bytes_for(&[1, 2, 3, 4], 1, 1);
    bl.handle_frame(0, crispy_common::Opcode::Connect as u8, &mut [], 1, &mut flash, &mut wdt, &keys, None);
    bl.handle_frame(1, crispy_common::Opcode::Prepare as u8, &mut header, 1, &mut flash, &mut wdt, &keys, None);
    assert_eq!(bl.fsm.state(), BootState::Flash);

    let timed_out = bl.fsm.on_tick(bl.config.flash_idle_timeout_ms + 1, &bl.config);
    assert!(timed_out);
    assert_eq!(bl.fsm.state(), BootState::Idle);
}

/// Scenario 6: an explicit `Disconnect` abandons an in-progress session
/// immediately, regardless of how much has been flashed.
#[test]
fn scenario_disconnect_abandons_session() {
    let mut shared_mem_bytes = [0u8; SHARED_MEM_SIZE];
    let mut bl = Bootloader::new(&mut shared_mem_bytes, HEADER_ADDR, BootConfig::default_const());
    let mut flash = FakeFlash::new();
    let mut wdt = FakeWatchdog(0);
    let keys = NoKeys;

    let mut header = header_bytes_for(&[1, 2, 3, 4], 1, 1);
    bl.handle_frame(0, crispy_common::Opcode::Connect as u8, &mut [], 1, &mut flash, &mut wdt, &keys, None);
    bl.handle_frame(1, crispy_common::Opcode::Prepare as u8, &mut header, 1, &mut flash, &mut wdt, &keys, None);

    let status = bl.handle_frame(2, crispy_common::Opcode::Disconnect as u8, &mut [], 1, &mut flash, &mut wdt, &keys, None);
    assert_eq!(status, MsgStatus::Ok);
    assert_eq!(bl.fsm.state(), BootState::Idle);
}

/// A host that skips straight to `Prepare` without first sending `Connect`
/// is rejected, never allowed to start a flashing session.
#[test]
fn scenario_prepare_without_connect_is_rejected() {
    let mut shared_mem_bytes = [0u8; SHARED_MEM_SIZE];
    let mut bl = Bootloader::new(&mut shared_mem_bytes, HEADER_ADDR, BootConfig::default_const());
    let mut flash = FakeFlash::new();
    let mut wdt = FakeWatchdog(0);
    let keys = NoKeys;

    let mut header = header_bytes_for(&[1, 2, 3, 4], 1, 1);
    let status = bl.handle_frame(0, crispy_common::Opcode::Prepare as u8, &mut header, 1, &mut flash, &mut wdt, &keys, None);
    assert_eq!(status, MsgStatus::InvalidRequest);
    assert_eq!(bl.fsm.state(), BootState::Idle);
}

/// The reset counter is a shared-memory concern, independent of the FSM:
/// it must increment on every `SharedMemory::init`, never merely be read
/// back unchanged.
#[test]
fn boot_count_is_monotonic_across_resets() {
    let mut backing = [0xFFu8; SHARED_MEM_SIZE];
    let mut mem = unsafe { crispy_common::SharedMemory::wrap(&mut backing) };
    let mut last = 0;
    for _ in 0..5 {
        mem.init();
        let count = mem.get_boot_count().unwrap();
        assert!(count > last);
        last = count;
    }
}
