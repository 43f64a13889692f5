// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Update-mode service loop.
//!
//! Drives `crispy_common`'s frame parser and FSM against the USB transport.
//! `Info` and `FlashStatus` carry response payloads the core doesn't build
//! itself (see `Bootloader::handle_frame`'s doc comment), so they are
//! dispatched here instead of through that method; everything else follows
//! the same match it documents.

use cortex_m::peripheral::SCB;
use rp2040_hal as hal;

use crispy_common::frame::{self, FrameHeader, Opcode, SRC_BOOTLOADER, SRC_MANAGER};
use crispy_common::image::IMAGE_HEADER_SIZE;
use crispy_common::parser::{FrameParser, ParserEvent, MAX_PAYLOAD};
use crispy_common::shared_mem::{BootReason, SharedMemory};
use crispy_common::status::MsgStatus;
use crispy_common::traits::{SystemClock, Transport, Watchdog as WatchdogTrait};
use crispy_common::{BootConfig, BootFsm, BootState};

use crate::boot::MemoryLayout;
use crate::flash::{DevicePublicKey, Rp2040Flash};
use crate::peripherals::Peripherals;
use crate::usb_transport::UsbTransport;

/// Reported in the `Info` response payload, little-endian.
const BOOTLOADER_VERSION: u32 = 0x0001_0000;

struct Rp2040Clock<'t> {
    timer: &'t hal::Timer,
}

impl SystemClock for Rp2040Clock<'_> {
    fn now_ms(&self) -> u32 {
        (self.timer.get_counter().ticks() / 1000) as u32
    }
}

struct WatchdogKicker<'w> {
    watchdog: &'w mut hal::Watchdog,
}

impl WatchdogTrait for WatchdogKicker<'_> {
    fn kick(&mut self) {
        self.watchdog.feed();
    }
}

/// Takes ownership of the USB peripherals out of `p` and brings the CDC
/// transport up. Must be called exactly once per boot, before either
/// [`run_back_door_window`] or [`run_update_mode`].
pub fn init_usb(p: &mut Peripherals) -> UsbTransport {
    let mut usb = p.usb.take().expect("usb peripherals already taken");
    let bus = hal::usb::UsbBus::new(usb.regs, usb.dpram, usb.clock, true, &mut usb.resets);
    crate::peripherals::store_usb_bus(usb_device::bus::UsbBusAllocator::new(bus));
    UsbTransport::new(crate::peripherals::usb_bus_ref())
}

fn respond(transport: &mut UsbTransport, command: u8, status: u8, payload: &[u8]) {
    let header = FrameHeader {
        length: payload.len() as u16,
        source: SRC_BOOTLOADER,
        command,
        status,
    };
    let mut buf = [0u8; frame::FRAME_HEADER_SIZE + MAX_PAYLOAD];
    if let Some(n) = frame::encode(&header, payload, &mut buf) {
        let _ = transport.send(&buf[..n]);
    }
}

/// Runs one iteration of the service loop: polls USB, feeds at most one
/// byte into the frame parser, and dispatches a complete frame if one was
/// just reassembled. Returns `true` if a frame from the host manager was
/// handled.
#[allow(clippy::too_many_arguments)]
fn service_tick(
    transport: &mut UsbTransport,
    parser: &mut FrameParser,
    fsm: &mut BootFsm,
    clock: &Rp2040Clock,
    flash: &mut Rp2040Flash,
    watchdog: &mut WatchdogKicker,
    keys: &DevicePublicKey,
    config: &BootConfig,
    shared_mem: &mut SharedMemory,
) -> bool {
    transport.poll();
    let now_ms = clock.now_ms();
    fsm.on_tick(now_ms, config);

    let byte = transport.receive_byte();
    let event = parser.poll(byte, now_ms, config.idle_timeout_ms);

    let ParserEvent::Frame { header, mut payload } = event else {
        return false;
    };

    if header.source != SRC_MANAGER {
        return false;
    }

    shared_mem.set_boot_reason(BootReason::Com);

    let Some(opcode) = Opcode::from_u8(header.command) else {
        respond(transport, header.command, MsgStatus::InvalidRequest as u8, &[]);
        return true;
    };

    match opcode {
        Opcode::Info => {
            // Mirrors the original boot_com_info_msg_rcv_cb: the real version
            // is only handed out from Idle; any other state gets a zeroed
            // version alongside InvalidRequest, never a silent drop.
            if fsm.state() == BootState::Idle {
                respond(
                    transport,
                    Opcode::Info.response() as u8,
                    MsgStatus::Ok as u8,
                    &BOOTLOADER_VERSION.to_le_bytes(),
                );
            } else {
                respond(
                    transport,
                    Opcode::Info.response() as u8,
                    MsgStatus::InvalidRequest as u8,
                    &0u32.to_le_bytes(),
                );
            }
        }
        Opcode::FlashStatus => {
            let mut buf = [0u8; 8];
            buf[0..4].copy_from_slice(&fsm.flashed_bytes().to_le_bytes());
            buf[4..8].copy_from_slice(&fsm.total_size().to_le_bytes());
            respond(transport, Opcode::FlashStatus.response() as u8, MsgStatus::Ok as u8, &buf);
        }
        Opcode::Connect => {
            let status = fsm.on_connect(now_ms);
            respond(transport, Opcode::Connect.response() as u8, status as u8, &[]);
        }
        Opcode::Disconnect => {
            let status = fsm.on_disconnect();
            respond(transport, Opcode::Disconnect.response() as u8, status as u8, &[]);
        }
        Opcode::Reset => {
            respond(transport, Opcode::Reset.response() as u8, MsgStatus::Ok as u8, &[]);
            SCB::sys_reset();
        }
        Opcode::Prepare => {
            let current_sw_ver = shared_mem.get_boot_version().unwrap_or(0);
            let status = if payload.len() != IMAGE_HEADER_SIZE {
                MsgStatus::InvalidRequest
            } else {
                let mut bytes = [0u8; IMAGE_HEADER_SIZE];
                bytes.copy_from_slice(&payload);
                fsm.on_prepare(&bytes, now_ms, config, current_sw_ver, flash, watchdog)
            };
            respond(transport, Opcode::Prepare.response() as u8, status as u8, &[]);
        }
        Opcode::Flash => {
            let status = fsm.on_flash_chunk(&mut payload, now_ms, flash, watchdog, None);
            respond(transport, Opcode::Flash.response() as u8, status as u8, &[]);
        }
        Opcode::Exit => {
            let status = fsm.on_exit(flash, keys);
            respond(transport, Opcode::Exit.response() as u8, status as u8, &[]);
        }
        Opcode::ConnectRsp
        | Opcode::PrepareRsp
        | Opcode::FlashRsp
        | Opcode::ExitRsp
        | Opcode::InfoRsp
        | Opcode::DisconnectRsp
        | Opcode::FlashStatusRsp
        | Opcode::ResetRsp => {
            respond(transport, header.command, MsgStatus::InvalidRequest as u8, &[]);
        }
    }

    true
}

/// Bounded variant of the service loop run immediately after a valid image
/// is found at reset: gives a host tool `deadline_ms` to interrupt the
/// pending jump-to-app with a `Connect`. Returns `true` if it was
/// interrupted.
#[allow(clippy::too_many_arguments)]
pub fn run_back_door_window(
    p: &mut Peripherals,
    transport: &mut UsbTransport,
    flash: &mut Rp2040Flash,
    shared_mem: &mut SharedMemory,
    layout: &MemoryLayout,
    config: &BootConfig,
    _current_sw_ver: u32,
    keys: &DevicePublicKey,
    deadline_ms: u32,
) -> bool {
    let mut parser = FrameParser::new();
    let mut fsm = BootFsm::new(layout.header_addr);
    let clock = Rp2040Clock { timer: &p.timer };
    let mut watchdog = WatchdogKicker {
        watchdog: &mut p.watchdog,
    };

    let start_ms = clock.now_ms();
    loop {
        if shared_mem.get_boot_reason().unwrap_or(BootReason::None) != BootReason::None {
            return true;
        }
        if clock.now_ms().wrapping_sub(start_ms) >= deadline_ms {
            return false;
        }
        service_tick(
            transport,
            &mut parser,
            &mut fsm,
            &clock,
            flash,
            &mut watchdog,
            keys,
            config,
            shared_mem,
        );
    }
}

/// Indefinite update-mode service loop. Entered when no valid image is
/// installed, or after the back-door window was interrupted.
#[allow(clippy::too_many_arguments)]
pub fn run_update_mode(
    p: &mut Peripherals,
    transport: &mut UsbTransport,
    flash: &mut Rp2040Flash,
    shared_mem: &mut SharedMemory,
    layout: &MemoryLayout,
    config: &BootConfig,
    _current_sw_ver: u32,
    keys: &DevicePublicKey,
) -> ! {
    let mut parser = FrameParser::new();
    let mut fsm = BootFsm::new(layout.header_addr);
    let clock = Rp2040Clock { timer: &p.timer };
    let mut watchdog = WatchdogKicker {
        watchdog: &mut p.watchdog,
    };

    loop {
        service_tick(
            transport,
            &mut parser,
            &mut fsm,
            &clock,
            flash,
            &mut watchdog,
            keys,
            config,
            shared_mem,
        );
    }
}
