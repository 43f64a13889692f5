// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Status taxonomies used across the bootloader core.
//!
//! Two distinct taxonomies exist on purpose: [`BootStatus`] is internal,
//! returned by functions inside this crate, while [`MsgStatus`] is the
//! wire-visible status carried in a frame's `status` byte.

/// Internal result status for fallible operations inside the bootloader core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStatus {
    Ok,
    Error,
    Timeout,
    CrcError,
    QueueEmpty,
    QueueFull,
}

/// Wire-visible status, reported back to the host in a frame's status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgStatus {
    Ok = 0,
    Validation = 1,
    InvalidRequest = 2,
    FlashWrite = 3,
    FlashErase = 4,
    FwSize = 5,
    FwVersion = 6,
    HwVersion = 7,
    Signature = 8,
}

impl MsgStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => MsgStatus::Ok,
            1 => MsgStatus::Validation,
            2 => MsgStatus::InvalidRequest,
            3 => MsgStatus::FlashWrite,
            4 => MsgStatus::FlashErase,
            5 => MsgStatus::FwSize,
            6 => MsgStatus::FwVersion,
            7 => MsgStatus::HwVersion,
            8 => MsgStatus::Signature,
            _ => return None,
        })
    }
}
