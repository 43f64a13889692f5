// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Application image header and the validation pipeline that gates a jump.

use sha2::{Digest, Sha256};

use crate::crc::{crc32_image, crc8_frame};
use crate::status::MsgStatus;
use crate::traits::{FlashDriver, PublicKeyProvider};

pub const IMAGE_HEADER_SIZE: usize = 256;
const SIGNATURE_SIZE: usize = 64;
const READ_CHUNK_SIZE: usize = 256;

/// Signature scheme carried by an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SigType {
    /// Body integrity only, checked with CRC-32.
    None = 0,
    /// SHA-256 + ECDSA-secp256k1 signature over the body.
    Ecdsa = 1,
}

impl SigType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SigType::None),
            1 => Some(SigType::Ecdsa),
            _ => None,
        }
    }
}

/// The 256-byte header prepended to every application image.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ImageHeader {
    pub ver: u8,
    pub sig_type: u8,
    pub hw_ver: u16,
    pub sw_ver: u32,
    pub fw_size: u32,
    pub fw_crc: u32,
    pub fw_addr: u32,
    pub signature: [u8; SIGNATURE_SIZE],
    pub reserved: [u8; 171],
    pub crc: u8,
}

const _: () = assert!(core::mem::size_of::<ImageHeader>() == IMAGE_HEADER_SIZE);

impl ImageHeader {
    /// Reinterpret a 256-byte buffer as a header, without validating it.
    pub fn from_bytes(bytes: &[u8; IMAGE_HEADER_SIZE]) -> Self {
        unsafe { core::ptr::read_unaligned(bytes.as_ptr() as *const Self) }
    }

    pub fn as_bytes(&self) -> &[u8; IMAGE_HEADER_SIZE] {
        unsafe { &*(self as *const Self as *const [u8; IMAGE_HEADER_SIZE]) }
    }

    /// CRC-8 over `ver..crc`, i.e. every header byte except the trailing CRC.
    pub fn computed_crc(&self) -> u8 {
        crc8_frame(&self.as_bytes()[..IMAGE_HEADER_SIZE - 1])
    }

    pub fn header_crc_valid(&self) -> bool {
        self.computed_crc() == self.crc
    }

    pub fn sig_type(&self) -> Option<SigType> {
        SigType::from_u8(self.sig_type)
    }
}

/// Drives the header-then-body validation pipeline against a [`FlashDriver`].
pub struct ImageValidator<'a, F: FlashDriver> {
    flash: &'a mut F,
}

impl<'a, F: FlashDriver> ImageValidator<'a, F> {
    pub fn new(flash: &'a mut F) -> Self {
        Self { flash }
    }

    /// Validate the image at `header_addr`. Any failure erases (poisons) the
    /// header so a subsequent reset never mistakes this region for a valid
    /// application.
    pub fn validate(
        &mut self,
        header_addr: u32,
        keys: &impl PublicKeyProvider,
    ) -> Result<ImageHeader, MsgStatus> {
        match self.validate_inner(header_addr, keys) {
            Ok(header) => Ok(header),
            Err(status) => {
                let _ = self.flash.erase(header_addr, IMAGE_HEADER_SIZE as u32);
                Err(status)
            }
        }
    }

    fn validate_inner(
        &mut self,
        header_addr: u32,
        keys: &impl PublicKeyProvider,
    ) -> Result<ImageHeader, MsgStatus> {
        let mut raw = [0u8; IMAGE_HEADER_SIZE];
        self.flash
            .read(header_addr, &mut raw)
            .map_err(|_| MsgStatus::InvalidRequest)?;
        let header = ImageHeader::from_bytes(&raw);

        if !header.header_crc_valid() {
            return Err(MsgStatus::Validation);
        }

        let sig_type = header.sig_type().ok_or(MsgStatus::Validation)?;

        match sig_type {
            SigType::None => self.check_crc32(&header)?,
            SigType::Ecdsa => self.check_signature(&header, keys)?,
        }

        Ok(header)
    }

    fn check_crc32(&mut self, header: &ImageHeader) -> Result<(), MsgStatus> {
        let mut remaining = header.fw_size;
        let mut addr = header.fw_addr;
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let mut crc = crate::crc::CRC32_SEED;
        while remaining > 0 {
            let take = remaining.min(READ_CHUNK_SIZE as u32) as usize;
            self.flash
                .read(addr, &mut buf[..take])
                .map_err(|_| MsgStatus::InvalidRequest)?;
            crc = crate::crc::crc32(crc, &buf[..take]);
            addr += take as u32;
            remaining -= take as u32;
        }
        if crc != header.fw_crc {
            return Err(MsgStatus::Validation);
        }
        Ok(())
    }

    fn check_signature(
        &mut self,
        header: &ImageHeader,
        keys: &impl PublicKeyProvider,
    ) -> Result<(), MsgStatus> {
        let mut remaining = header.fw_size;
        let mut addr = header.fw_addr;
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let mut hasher = Sha256::new();
        while remaining > 0 {
            let take = remaining.min(READ_CHUNK_SIZE as u32) as usize;
            self.flash
                .read(addr, &mut buf[..take])
                .map_err(|_| MsgStatus::InvalidRequest)?;
            hasher.update(&buf[..take]);
            addr += take as u32;
            remaining -= take as u32;
        }
        let digest = hasher.finalize();

        verify_secp256k1(keys.public_key(), &digest, &header.signature)
    }
}

fn verify_secp256k1(public_key: &[u8], digest: &[u8], signature: &[u8; 64]) -> Result<(), MsgStatus> {
    use k256::ecdsa::signature::hazmat::PrehashVerifier;
    use k256::ecdsa::{Signature, VerifyingKey};

    let verifying_key =
        VerifyingKey::from_sec1_bytes(public_key).map_err(|_| MsgStatus::Signature)?;
    let signature = Signature::from_slice(signature).map_err(|_| MsgStatus::Signature)?;

    verifying_key
        .verify_prehash(digest, &signature)
        .map_err(|_| MsgStatus::Signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(sig_type: u8, fw_size: u32, fw_addr: u32, fw_crc: u32) -> ImageHeader {
        let mut header = ImageHeader {
            ver: 1,
            sig_type,
            hw_ver: 1,
            sw_ver: 1,
            fw_size,
            fw_crc,
            fw_addr,
            signature: [0; SIGNATURE_SIZE],
            reserved: [0; 171],
            crc: 0,
        };
        header.crc = header.computed_crc();
        header
    }

    #[test]
    fn header_crc_round_trips() {
        let header = header_with(0, 16, 0x1001_0000, 0x1234_5678);
        assert!(header.header_crc_valid());
    }

    #[test]
    fn tampered_header_fails_crc() {
        let mut header = header_with(0, 16, 0x1001_0000, 0x1234_5678);
        header.sw_ver += 1;
        assert!(!header.header_crc_valid());
    }

    #[test]
    fn unknown_sig_type_is_rejected() {
        let header = header_with(0xFF, 16, 0x1001_0000, 0x1234_5678);
        assert!(header.sig_type().is_none());
    }
}
