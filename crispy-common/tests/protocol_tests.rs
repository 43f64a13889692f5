// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Constant and type-shape tests for the wire protocol.

use crispy_common::crc::{CRC32_SEED, CRC8_SEED};
use crispy_common::frame::{
    FrameError, FrameHeader, Opcode, FRAME_HEADER_SIZE, FRAME_PREAMBLE, SRC_BOOTLOADER,
    SRC_MANAGER,
};
use crispy_common::image::IMAGE_HEADER_SIZE;
use crispy_common::shared_mem::SHARED_MEM_SIZE;
use crispy_common::status::MsgStatus;

#[test]
fn frame_preamble_value() {
    assert_eq!(FRAME_PREAMBLE, 0x07B0);
}

#[test]
fn frame_header_size_is_eight_bytes() {
    assert_eq!(FRAME_HEADER_SIZE, 8);
}

#[test]
fn shared_mem_is_exactly_32_bytes() {
    assert_eq!(SHARED_MEM_SIZE, 32);
}

#[test]
fn image_header_is_exactly_256_bytes() {
    assert_eq!(IMAGE_HEADER_SIZE, 256);
}

#[test]
fn crc_seeds() {
    assert_eq!(CRC8_SEED, 0xB6);
    assert_eq!(CRC32_SEED, 0x1010_1010);
}

#[test]
fn message_sources_are_distinct() {
    assert_ne!(SRC_MANAGER, SRC_BOOTLOADER);
    assert_eq!(SRC_MANAGER, 0x2B);
    assert_eq!(SRC_BOOTLOADER, 0xB2);
}

#[test]
fn opcode_round_trips_through_from_u8() {
    for opcode in [
        Opcode::Connect,
        Opcode::ConnectRsp,
        Opcode::Prepare,
        Opcode::PrepareRsp,
        Opcode::Flash,
        Opcode::FlashRsp,
        Opcode::Exit,
        Opcode::ExitRsp,
        Opcode::Info,
        Opcode::InfoRsp,
        Opcode::Disconnect,
        Opcode::DisconnectRsp,
        Opcode::FlashStatus,
        Opcode::FlashStatusRsp,
        Opcode::Reset,
        Opcode::ResetRsp,
    ] {
        assert_eq!(Opcode::from_u8(opcode as u8), Some(opcode));
    }
}

#[test]
fn opcode_mandated_byte_values_match_wire_table() {
    assert_eq!(Opcode::Connect as u8, 0x10);
    assert_eq!(Opcode::ConnectRsp as u8, 0x11);
    assert_eq!(Opcode::Prepare as u8, 0x20);
    assert_eq!(Opcode::PrepareRsp as u8, 0x21);
    assert_eq!(Opcode::Flash as u8, 0x30);
    assert_eq!(Opcode::FlashRsp as u8, 0x31);
    assert_eq!(Opcode::Exit as u8, 0x40);
    assert_eq!(Opcode::ExitRsp as u8, 0x41);
    assert_eq!(Opcode::Info as u8, 0xA0);
    assert_eq!(Opcode::InfoRsp as u8, 0xA1);
}

#[test]
fn opcode_response_maps_requests_to_their_response() {
    assert_eq!(Opcode::Connect.response(), Opcode::ConnectRsp);
    assert_eq!(Opcode::Prepare.response(), Opcode::PrepareRsp);
    assert_eq!(Opcode::Flash.response(), Opcode::FlashRsp);
    assert_eq!(Opcode::Exit.response(), Opcode::ExitRsp);
    assert_eq!(Opcode::Info.response(), Opcode::InfoRsp);
}

#[test]
fn unassigned_opcode_byte_is_none() {
    assert_eq!(Opcode::from_u8(0xFF), None);
    assert_eq!(Opcode::from_u8(0x12), None);
}

#[test]
fn frame_error_equality() {
    assert_eq!(FrameError::Crc, FrameError::Crc);
    assert_ne!(FrameError::Crc, FrameError::TooShort);
}

#[test]
fn frame_header_debug() {
    let header = FrameHeader {
        length: 0,
        source: SRC_MANAGER,
        command: Opcode::Connect as u8,
        status: 0,
    };
    assert!(format!("{:?}", header).contains("FrameHeader"));
}

#[test]
fn msg_status_from_u8_round_trips() {
    for status in [
        MsgStatus::Ok,
        MsgStatus::Validation,
        MsgStatus::InvalidRequest,
        MsgStatus::FlashWrite,
        MsgStatus::FlashErase,
        MsgStatus::FwSize,
        MsgStatus::FwVersion,
        MsgStatus::HwVersion,
        MsgStatus::Signature,
    ] {
        assert_eq!(MsgStatus::from_u8(status as u8), Some(status));
    }
}
