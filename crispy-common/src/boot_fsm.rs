// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The image lifecycle FSM: `Idle -> Prepare -> Flash -> Exit -> Idle`.
//!
//! Pure logic, hardware accessed only through the injected traits, so the
//! whole lifecycle is unit-testable with fakes and never touches real flash.

use crate::config::BootConfig;
use crate::flashing::{self, FlashingSession};
use crate::image::{ImageHeader, ImageValidator, IMAGE_HEADER_SIZE};
use crate::status::MsgStatus;
use crate::traits::{Decryptor, FlashDriver, PublicKeyProvider, Watchdog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Idle,
    Prepare,
    Flash,
    Exit,
}

pub struct BootFsm {
    state: BootState,
    header_addr: u32,
    last_activity_ms: u32,
    header: Option<ImageHeader>,
    session: Option<FlashingSession>,
}

impl BootFsm {
    /// `header_addr` is the fixed flash address the application header lives
    /// at; it is board configuration, not wire state.
    pub fn new(header_addr: u32) -> Self {
        Self {
            state: BootState::Idle,
            header_addr,
            last_activity_ms: 0,
            header: None,
            session: None,
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    /// Bytes written so far in the current flashing session, 0 if none.
    pub fn flashed_bytes(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.flashed_bytes)
    }

    /// Total image size for the current flashing session, 0 if none.
    pub fn total_size(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.total_size)
    }

    fn revert_to_idle(&mut self) {
        self.state = BootState::Idle;
        self.header = None;
        self.session = None;
    }

    /// Checks the per-state inactivity timeout. Returns `true` if the FSM
    /// timed out and reverted to `Idle`.
    pub fn on_tick(&mut self, now_ms: u32, config: &BootConfig) -> bool {
        let timeout_ms = match self.state {
            BootState::Idle => return false,
            BootState::Prepare => config.prepare_idle_timeout_ms,
            BootState::Flash => config.flash_idle_timeout_ms,
            BootState::Exit => config.exit_idle_timeout_ms,
        };
        if now_ms.wrapping_sub(self.last_activity_ms) > timeout_ms {
            self.revert_to_idle();
            return true;
        }
        false
    }

    /// `Connect` is valid from `Idle` only; it opens the session and moves
    /// the FSM into `Prepare`, where it waits for an image header.
    pub fn on_connect(&mut self, now_ms: u32) -> MsgStatus {
        if self.state != BootState::Idle {
            return MsgStatus::InvalidRequest;
        }
        self.state = BootState::Prepare;
        self.last_activity_ms = now_ms;
        MsgStatus::Ok
    }

    /// `Prepare` is valid from `Prepare` only (i.e. after a preceding
    /// `Connect`), carrying the candidate image header. Any precheck
    /// failure drops the session back to `Idle`.
    #[allow(clippy::too_many_arguments)]
    pub fn on_prepare(
        &mut self,
        header_bytes: &[u8; IMAGE_HEADER_SIZE],
        now_ms: u32,
        config: &BootConfig,
        current_sw_ver: u32,
        flash: &mut impl FlashDriver,
        watchdog: &mut impl Watchdog,
    ) -> MsgStatus {
        if self.state != BootState::Prepare {
            return MsgStatus::InvalidRequest;
        }

        let header = ImageHeader::from_bytes(header_bytes);
        if !header.header_crc_valid() {
            self.revert_to_idle();
            return MsgStatus::Validation;
        }
        if header.sig_type().is_none() {
            self.revert_to_idle();
            return MsgStatus::Validation;
        }
        if config.enforce_hw_version_match && header.hw_ver != config.hw_version {
            self.revert_to_idle();
            return MsgStatus::HwVersion;
        }
        if config.enforce_downgrade_protection && header.sw_ver < current_sw_ver {
            self.revert_to_idle();
            return MsgStatus::FwVersion;
        }
        if header.fw_size == 0 || header.fw_size > config.app_size_max {
            self.revert_to_idle();
            return MsgStatus::FwSize;
        }

        let session = match flashing::prepare(
            flash,
            watchdog,
            self.header_addr,
            config.app_size_max,
            header.fw_addr,
            header.fw_size,
            config.flash_page_size,
        ) {
            Ok(session) => session,
            Err(_) => {
                self.revert_to_idle();
                return MsgStatus::FlashErase;
            }
        };

        self.header = Some(header);
        self.session = Some(session);
        self.state = BootState::Flash;
        self.last_activity_ms = now_ms;
        MsgStatus::Ok
    }

    pub fn on_flash_chunk(
        &mut self,
        data: &mut [u8],
        now_ms: u32,
        flash: &mut impl FlashDriver,
        watchdog: &mut impl Watchdog,
        decryptor: Option<&mut dyn Decryptor>,
    ) -> MsgStatus {
        if self.state != BootState::Flash {
            return MsgStatus::InvalidRequest;
        }

        let Some(session) = self.session.as_mut() else {
            return MsgStatus::InvalidRequest;
        };

        match flashing::write_chunk(session, flash, watchdog, decryptor, data) {
            Ok(()) => {}
            Err(_) => {
                self.revert_to_idle();
                return MsgStatus::FlashWrite;
            }
        }

        self.last_activity_ms = now_ms;
        self.state = if session.is_complete() {
            BootState::Exit
        } else {
            BootState::Flash
        };
        MsgStatus::Ok
    }

    /// Finalizes the image: writes the header (committing it) and validates
    /// it. Any failure poisons the header, so a corrupt or unsigned image is
    /// never seen as valid on the next reset.
    pub fn on_exit(
        &mut self,
        flash: &mut impl FlashDriver,
        keys: &impl PublicKeyProvider,
    ) -> MsgStatus {
        if self.state != BootState::Exit {
            return MsgStatus::InvalidRequest;
        }

        let Some(header) = self.header.take() else {
            self.revert_to_idle();
            return MsgStatus::InvalidRequest;
        };

        let status = match flash.write(self.header_addr, header.as_bytes()) {
            Ok(()) => {
                match ImageValidator::new(flash).validate(self.header_addr, keys) {
                    Ok(_) => MsgStatus::Ok,
                    Err(status) => status,
                }
            }
            Err(_) => MsgStatus::FlashWrite,
        };

        self.revert_to_idle();
        status
    }

    /// Abandons whatever is in progress and returns to `Idle`. Valid from
    /// any state.
    pub fn on_disconnect(&mut self) -> MsgStatus {
        self.revert_to_idle();
        MsgStatus::Ok
    }
}
