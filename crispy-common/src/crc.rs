// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! CRC-8 and CRC-32 matching the bootloader wire format.
//!
//! Both are MSB-first, non-reflected, with no final XOR. Neither matches a
//! catalogued variant in the `crc` crate's table (`CRC_8_*`/`CRC_32_*`), but
//! its `Algorithm<W>` takes an arbitrary width/poly/init/refin/refout/xorout
//! directly, so the custom parameters go through `crc::Crc` rather than a
//! hand-rolled shift loop.

use crc::{Algorithm, Crc};

/// CRC-8 polynomial, `x^8 + x^2 + x^1 + 1`.
pub const CRC8_POLY: u8 = 0x07;
/// CRC-8 seed used for frame fields and image header checks.
pub const CRC8_SEED: u8 = 0xB6;

/// CRC-32 polynomial (same as used by most CCITT/IEEE flavors, non-reflected here).
pub const CRC32_POLY: u32 = 0x04C1_1DB7;
/// CRC-32 seed used for image body checks.
pub const CRC32_SEED: u32 = 0x1010_1010;

const CRC8_ALGO: Algorithm<u8> = Algorithm {
    width: 8,
    poly: CRC8_POLY,
    init: CRC8_SEED,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0x00,
    residue: 0x00,
};

const CRC32_ALGO: Algorithm<u32> = Algorithm {
    width: 32,
    poly: CRC32_POLY,
    init: CRC32_SEED,
    refin: false,
    refout: false,
    xorout: 0x0000_0000,
    check: 0x0000_0000,
    residue: 0x0000_0000,
};

static CRC8: Crc<u8> = Crc::<u8>::new(&CRC8_ALGO);
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC32_ALGO);

/// Compute a CRC-8 over `data`, starting from `seed`.
pub fn crc8(seed: u8, data: &[u8]) -> u8 {
    let mut digest = CRC8.digest_with_initial(seed);
    digest.update(data);
    digest.finalize()
}

/// Compute a CRC-8 using the frame/header seed.
pub fn crc8_frame(data: &[u8]) -> u8 {
    crc8(CRC8_SEED, data)
}

/// Compute a CRC-32 over `data`, continuing from `seed` — the running CRC of
/// whatever was already fed in, or `CRC32_SEED` to start a fresh check.
/// Chunking the input across calls (as image validation does, one flash read
/// at a time) produces the same result as one call over the whole buffer.
pub fn crc32(seed: u32, data: &[u8]) -> u32 {
    let mut digest = CRC32.digest_with_initial(seed);
    digest.update(data);
    digest.finalize()
}

/// Compute a CRC-32 using the image-body seed.
pub fn crc32_image(data: &[u8]) -> u32 {
    crc32(CRC32_SEED, data)
}
