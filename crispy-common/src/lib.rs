// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared bootloader core: the wire protocol, image validation, flash
//! orchestration and lifecycle FSM, all hardware-independent.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) builds:
//! - Default: `no_std`, for the `crispy-bootloader` target.
//! - `std` feature: enables `std`-backed crypto backends for host tooling
//!   (`crispy-upload`'s `sign` subcommand).
//! - `embedded` feature: enables RP2040 board support (`rp2040-hal`).

#![cfg_attr(not(feature = "std"), no_std)]

pub mod boot_fsm;
pub mod config;
pub mod crc;
pub mod flashing;
pub mod frame;
pub mod image;
pub mod parser;
pub mod shared_mem;
pub mod status;
pub mod traits;

pub use boot_fsm::{BootFsm, BootState};
pub use config::BootConfig;
pub use frame::{FrameHeader, Opcode};
pub use image::{ImageHeader, ImageValidator, IMAGE_HEADER_SIZE};
pub use parser::{FrameParser, ParserEvent, MAX_PAYLOAD};
pub use shared_mem::{BootReason, SharedMemory, SHARED_MEM_SIZE};
pub use status::{BootStatus, MsgStatus};
pub use traits::{AppJumper, Decryptor, FlashDriver, PublicKeyProvider, SystemClock, Transport, Watchdog};

/// Owns the whole lifecycle: the shared-memory window, the frame
/// reassembler, and the FSM. Replaces the scattered process-wide mutable
/// state the original library relied on with a single constructed value.
pub struct Bootloader<'a> {
    pub shared_mem: SharedMemory<'a>,
    pub parser: FrameParser,
    pub fsm: BootFsm,
    pub config: BootConfig,
}

impl<'a> Bootloader<'a> {
    pub fn new(
        shared_mem_bytes: &'a mut [u8; SHARED_MEM_SIZE],
        header_addr: u32,
        config: BootConfig,
    ) -> Self {
        Self {
            // SAFETY: the caller hands us exclusive ownership of the
            // linker-placed shared-memory window for the lifetime `'a`.
            shared_mem: unsafe { SharedMemory::wrap(shared_mem_bytes) },
            parser: FrameParser::new(),
            fsm: BootFsm::new(header_addr),
            config,
        }
    }

    /// Dispatches a single reassembled frame to the FSM. `Info` and
    /// `FlashStatus` carry response payloads and are handled by the caller
    /// directly against `self.fsm`/`self.shared_mem` instead of through this
    /// method.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_frame(
        &mut self,
        now_ms: u32,
        command: u8,
        payload: &mut [u8],
        current_sw_ver: u32,
        flash: &mut impl FlashDriver,
        watchdog: &mut impl Watchdog,
        keys: &impl PublicKeyProvider,
        decryptor: Option<&mut dyn Decryptor>,
    ) -> MsgStatus {
        let Some(opcode) = Opcode::from_u8(command) else {
            return MsgStatus::InvalidRequest;
        };

        match opcode {
            Opcode::Connect => self.fsm.on_connect(now_ms),
            Opcode::Disconnect | Opcode::Reset => self.fsm.on_disconnect(),
            Opcode::Prepare => {
                if payload.len() != IMAGE_HEADER_SIZE {
                    return MsgStatus::InvalidRequest;
                }
                let mut bytes = [0u8; IMAGE_HEADER_SIZE];
                bytes.copy_from_slice(payload);
                self.fsm.on_prepare(
                    &bytes,
                    now_ms,
                    &self.config,
                    current_sw_ver,
                    flash,
                    watchdog,
                )
            }
            Opcode::Flash => self.fsm.on_flash_chunk(payload, now_ms, flash, watchdog, decryptor),
            Opcode::Exit => self.fsm.on_exit(flash, keys),
            Opcode::Info | Opcode::FlashStatus => MsgStatus::Ok,
            Opcode::ConnectRsp
            | Opcode::PrepareRsp
            | Opcode::FlashRsp
            | Opcode::ExitRsp
            | Opcode::InfoRsp
            | Opcode::DisconnectRsp
            | Opcode::FlashStatusRsp
            | Opcode::ResetRsp => MsgStatus::InvalidRequest,
        }
    }
}

/// Blinks `led` `count` times as a startup/activity indicator. Board-agnostic
/// over `embedded-hal`'s digital and delay traits.
#[cfg(feature = "embedded")]
pub fn blink(
    led: &mut impl embedded_hal::digital::OutputPin,
    timer: &mut impl embedded_hal::delay::DelayNs,
    count: u32,
    period_ms: u32,
) {
    for _ in 0..count {
        let _ = led.set_high();
        timer.delay_ms(period_ms);
        let _ = led.set_low();
        timer.delay_ms(period_ms);
    }
}
