// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Integration tests for the header + body validation pipeline, including
//! the SHA-256 + ECDSA-secp256k1 signature path.

use std::collections::HashMap;

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};

use crispy_common::crc::{crc32_image, crc8_frame};
use crispy_common::image::{ImageHeader, ImageValidator, IMAGE_HEADER_SIZE};
use crispy_common::status::BootStatus;
use crispy_common::status::MsgStatus;
use crispy_common::traits::{FlashDriver, PublicKeyProvider};

struct FakeFlash {
    bytes: HashMap<u32, u8>,
}

impl FakeFlash {
    fn new() -> Self {
        Self {
            bytes: HashMap::new(),
        }
    }

    fn put(&mut self, addr: u32, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.bytes.insert(addr + i as u32, b);
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
        self.put(addr, data);
        Ok(())
    }
}

struct Keys(Vec<u8>);
impl PublicKeyProvider for Keys {
    fn public_key(&self) -> &[u8] {
        &self.0
    }
}

const HEADER_ADDR: u32 = 0x1000_0000;
const FW_ADDR: u32 = 0x1001_0000;

#[test]
fn crc32_body_round_trips() {
    let mut flash = FakeFlash::new();
    let body = [7u8; 100];
    flash.put(FW_ADDR, &body);

    let mut header = ImageHeader {
        ver: 1,
        sig_type: 0,
        hw_ver: 1,
        sw_ver: 1,
        fw_size: body.len() as u32,
        fw_crc: crc32_image(&body),
        fw_addr: FW_ADDR,
        signature: [0; 64],
        reserved: [0; 171],
        crc: 0,
    };
    header.crc = crc8_frame(&header.as_bytes()[..IMAGE_HEADER_SIZE - 1]);
    flash.write(HEADER_ADDR, header.as_bytes()).unwrap();

    let keys = Keys(Vec::new());
    let result = ImageValidator::new(&mut flash).validate(HEADER_ADDR, &keys);
    assert!(result.is_ok());
}

#[test]
fn crc32_body_mismatch_is_rejected_and_poisons_header() {
    let mut flash = FakeFlash::new();
    let body = [7u8; 100];
    flash.put(FW_ADDR, &body);

    let mut header = ImageHeader {
        ver: 1,
        sig_type: 0,
        hw_ver: 1,
        sw_ver: 1,
        fw_size: body.len() as u32,
        fw_crc: crc32_image(&body) ^ 0xFFFF_FFFF,
        fw_addr: FW_ADDR,
        signature: [0; 64],
        reserved: [0; 171],
        crc: 0,
    };
    header.crc = crc8_frame(&header.as_bytes()[..IMAGE_HEADER_SIZE - 1]);
    flash.write(HEADER_ADDR, header.as_bytes()).unwrap();

    let keys = Keys(Vec::new());
    let result = ImageValidator::new(&mut flash).validate(HEADER_ADDR, &keys);
    assert_eq!(result.unwrap_err(), MsgStatus::Validation);

    let mut readback = [0u8; IMAGE_HEADER_SIZE];
    flash.read(HEADER_ADDR, &mut readback).unwrap();
    assert!(readback.iter().all(|&b| b == 0xFF));
}

#[test]
fn ecdsa_secp256k1_signature_verifies() {
    let signing_key = SigningKey::from_bytes(&[0x11u8; 32].into()).unwrap();
    let verifying_key = signing_key.verifying_key();
    let public_key_bytes = verifying_key.to_encoded_point(false).as_bytes().to_vec();

    let mut flash = FakeFlash::new();
    let body = [0x42u8; 200];
    flash.put(FW_ADDR, &body);

    let digest = Sha256::digest(&body);
    let signature: Signature = signing_key.sign_prehash(&digest).unwrap();

    let mut signature_bytes = [0u8; 64];
    signature_bytes.copy_from_slice(&signature.to_bytes());

    let mut header = ImageHeader {
        ver: 1,
        sig_type: 1,
        hw_ver: 1,
        sw_ver: 1,
        fw_size: body.len() as u32,
        fw_crc: 0,
        fw_addr: FW_ADDR,
        signature: signature_bytes,
        reserved: [0; 171],
        crc: 0,
    };
    header.crc = crc8_frame(&header.as_bytes()[..IMAGE_HEADER_SIZE - 1]);
    flash.write(HEADER_ADDR, header.as_bytes()).unwrap();

    let keys = Keys(public_key_bytes);
    let result = ImageValidator::new(&mut flash).validate(HEADER_ADDR, &keys);
    assert!(result.is_ok(), "signature should verify: {:?}", result.err());
}

#[test]
fn ecdsa_signature_from_wrong_key_is_rejected() {
    let signing_key = SigningKey::from_bytes(&[0x22u8; 32].into()).unwrap();
    let other_key = SigningKey::from_bytes(&[0x33u8; 32].into()).unwrap();
    let wrong_public_key = other_key
        .verifying_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();

    let mut flash = FakeFlash::new();
    let body = [0x55u8; 64];
    flash.put(FW_ADDR, &body);

    let digest = Sha256::digest(&body);
    let signature: Signature = signing_key.sign_prehash(&digest).unwrap();
    let mut signature_bytes = [0u8; 64];
    signature_bytes.copy_from_slice(&signature.to_bytes());

    let mut header = ImageHeader {
        ver: 1,
        sig_type: 1,
        hw_ver: 1,
        sw_ver: 1,
        fw_size: body.len() as u32,
        fw_crc: 0,
        fw_addr: FW_ADDR,
        signature: signature_bytes,
        reserved: [0; 171],
        crc: 0,
    };
    header.crc = crc8_frame(&header.as_bytes()[..IMAGE_HEADER_SIZE - 1]);
    flash.write(HEADER_ADDR, header.as_bytes()).unwrap();

    let keys = Keys(wrong_public_key);
    let result = ImageValidator::new(&mut flash).validate(HEADER_ADDR, &keys);
    assert_eq!(result.unwrap_err(), MsgStatus::Signature);
}
