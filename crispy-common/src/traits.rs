// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! External collaborator interfaces.
//!
//! The original library injected these as weak default callbacks, overridden
//! per board. Here they are trait objects/bounds injected once at
//! [`crate::Bootloader::new`] construction, so the core stays hardware-free
//! and unit-testable with fakes.

use crate::status::BootStatus;

/// Raw flash access. Addresses are absolute, not bank-relative.
pub trait FlashDriver {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), BootStatus>;
    fn erase(&mut self, addr: u32, len: u32) -> Result<(), BootStatus>;
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), BootStatus>;
}

/// Byte-oriented transport. Non-blocking: `receive_byte` returns `None` when
/// no byte is currently available rather than blocking the superloop.
pub trait Transport {
    fn receive_byte(&mut self) -> Option<u8>;
    fn send(&mut self, data: &[u8]) -> Result<(), BootStatus>;
}

/// Monotonic millisecond clock.
pub trait SystemClock {
    fn now_ms(&self) -> u32;
}

/// Watchdog kick, called periodically during long flash operations.
pub trait Watchdog {
    fn kick(&mut self);
}

/// Supplies the public key used to verify ECDSA-signed images.
pub trait PublicKeyProvider {
    /// SEC1-encoded (compressed or uncompressed) secp256k1 public key.
    fn public_key(&self) -> &[u8];
}

/// Optional image decryption, applied to each chunk before it is flashed.
pub trait Decryptor {
    fn decrypt(&mut self, addr: u32, data: &mut [u8]) -> Result<(), BootStatus>;
}

/// Jumps to the application's reset vector. Never returns: everything after
/// a call to `jump` is unreachable at the type level.
pub trait AppJumper {
    fn jump(&mut self, initial_sp: u32, reset_vector: u32) -> !;
}
