// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Compile-time bootloader configuration.
//!
//! Mirrors the original `boot_cfg.h` header: a single const struct rather
//! than scattered `#define`s, so a board port builds one `BootConfig` value
//! and passes it into [`crate::Bootloader::new`].

/// Per-board compile-time policy and timing configuration.
#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    /// Inter-byte timeout for the frame parser, in milliseconds.
    pub idle_timeout_ms: u32,
    /// Time the FSM waits in `Prepare` for a `Flash` command before giving up.
    pub prepare_idle_timeout_ms: u32,
    /// Time the FSM waits in `Flash` for the next data chunk before giving up.
    pub flash_idle_timeout_ms: u32,
    /// Time the FSM waits in `Exit` before falling back to `Idle`.
    pub exit_idle_timeout_ms: u32,
    /// Time the reset-time controller waits at startup for a back-door connect.
    pub wait_at_startup_ms: u32,
    /// Time a freshly jumped-to `JumpToApp` flow is allowed before it is
    /// considered to have failed to hand off control.
    pub jump_to_app_timeout_ms: u32,
    /// Boot attempts allowed before the counter forces update mode.
    pub max_boot_attempts: u8,
    /// Reject an image whose `sw_ver` is lower than the currently running one.
    pub enforce_downgrade_protection: bool,
    /// Reject an image whose `hw_ver` does not match the board's hardware id.
    pub enforce_hw_version_match: bool,
    /// This board's hardware version, compared against `ImageHeader.hw_ver`.
    pub hw_version: u16,
    /// Flash page size used to chunk erase operations during `Prepare`.
    pub flash_page_size: u32,
    /// Largest `fw_size` accepted; `Prepare` also erases exactly this many
    /// bytes starting at the header address, regardless of the incoming
    /// image's actual size, so a smaller image never leaves stale bytes
    /// trailing a previous larger one.
    pub app_size_max: u32,
}

impl BootConfig {
    /// Defaults matching the original library's `boot_cfg.h` constants.
    pub const fn default_const() -> Self {
        Self {
            idle_timeout_ms: 20,
            prepare_idle_timeout_ms: 500,
            flash_idle_timeout_ms: 1000,
            exit_idle_timeout_ms: 500,
            wait_at_startup_ms: 100,
            jump_to_app_timeout_ms: 1000,
            max_boot_attempts: 3,
            enforce_downgrade_protection: true,
            enforce_hw_version_match: true,
            hw_version: 1,
            flash_page_size: 256,
            app_size_max: 512 * 1024,
        }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::default_const()
    }
}
