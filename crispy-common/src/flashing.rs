// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Page-aligned erase and sequential write orchestration for the `Flash`
//! FSM state.

use crate::status::BootStatus;
use crate::traits::{Decryptor, FlashDriver, Watchdog};

/// Transient state for an in-progress flash session. Not persisted across a
/// reset; a reset mid-flash simply abandons and re-prepares.
#[derive(Debug, Clone, Copy)]
pub struct FlashingSession {
    pub working_addr: u32,
    pub flashed_bytes: u32,
    pub total_size: u32,
}

impl FlashingSession {
    pub fn is_complete(&self) -> bool {
        self.flashed_bytes >= self.total_size
    }
}

/// Erases `erase_len` bytes at `erase_addr` page-by-page, kicking the
/// watchdog between pages, then returns a session that tracks the body
/// write at `write_addr`/`write_len`. The erase region spans the configured
/// maximum image size starting at the header address, which is usually
/// wider than the body actually being written this time; that keeps a
/// smaller image from leaving stale bytes trailing a previous larger one.
pub fn prepare(
    flash: &mut impl FlashDriver,
    watchdog: &mut impl Watchdog,
    erase_addr: u32,
    erase_len: u32,
    write_addr: u32,
    write_len: u32,
    page_size: u32,
) -> Result<FlashingSession, BootStatus> {
    let mut erased = 0u32;
    while erased < erase_len {
        let chunk = page_size.min(erase_len - erased);
        flash
            .erase(erase_addr + erased, chunk)
            .map_err(|_| BootStatus::Error)?;
        watchdog.kick();
        erased += chunk;
    }

    Ok(FlashingSession {
        working_addr: write_addr,
        flashed_bytes: 0,
        total_size: write_len,
    })
}

/// Write one chunk of firmware data at the session's current address,
/// optionally decrypting it in place first. Advances the session.
pub fn write_chunk(
    session: &mut FlashingSession,
    flash: &mut impl FlashDriver,
    watchdog: &mut impl Watchdog,
    decryptor: Option<&mut dyn Decryptor>,
    data: &mut [u8],
) -> Result<(), BootStatus> {
    if session.flashed_bytes + data.len() as u32 > session.total_size {
        return Err(BootStatus::Error);
    }

    if let Some(decryptor) = decryptor {
        decryptor
            .decrypt(session.working_addr, data)
            .map_err(|_| BootStatus::Error)?;
    }

    flash
        .write(session.working_addr, data)
        .map_err(|_| BootStatus::Error)?;
    watchdog.kick();

    session.working_addr += data.len() as u32;
    session.flashed_bytes += data.len() as u32;

    Ok(())
}
