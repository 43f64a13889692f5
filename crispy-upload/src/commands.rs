// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for bootloader operations.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use k256::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};

use crispy_common::frame::Opcode;
use crispy_common::image::{ImageHeader, SigType, IMAGE_HEADER_SIZE};
use crispy_common::status::MsgStatus;

use crate::transport::Transport;

/// Chunk size for `Flash` data blocks, matching the board's flash page size.
const CHUNK_SIZE: usize = 256;

fn require_ok(what: &str, status: MsgStatus) -> Result<()> {
    if status == MsgStatus::Ok {
        Ok(())
    } else {
        bail!("{what} failed: {status:?}")
    }
}

/// Query the bootloader's reported version.
pub fn info(transport: &mut Transport) -> Result<()> {
    let (status, payload) = transport.send_recv(Opcode::Info, &[])?;
    require_ok("Info", status)?;
    if payload.len() != 4 {
        bail!("Info response had unexpected payload length {}", payload.len());
    }
    let version = u32::from_le_bytes(payload.try_into().unwrap());
    println!(
        "Bootloader version: {}.{}.{}",
        (version >> 16) & 0xFF,
        (version >> 8) & 0xFF,
        version & 0xFF
    );
    Ok(())
}

/// Query in-progress flashing status.
pub fn status(transport: &mut Transport) -> Result<()> {
    let (status, payload) = transport.send_recv(Opcode::FlashStatus, &[])?;
    require_ok("FlashStatus", status)?;
    if payload.len() != 8 {
        bail!("FlashStatus response had unexpected payload length {}", payload.len());
    }
    let flashed = u32::from_le_bytes(payload[0..4].try_into().unwrap());
    let total = u32::from_le_bytes(payload[4..8].try_into().unwrap());
    if total == 0 {
        println!("No update in progress.");
    } else {
        println!("Flashing in progress: {flashed}/{total} bytes");
    }
    Ok(())
}

/// Flash a signed image: Connect, Prepare, stream Flash chunks, Exit.
pub fn prepare_and_flash(transport: &mut Transport, file: &Path) -> Result<()> {
    let image = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    if image.len() <= IMAGE_HEADER_SIZE {
        bail!(
            "{} is too short to be a signed image (need more than {} bytes)",
            file.display(),
            IMAGE_HEADER_SIZE
        );
    }
    let (header_bytes, body) = image.split_at(IMAGE_HEADER_SIZE);
    let header = ImageHeader::from_bytes(header_bytes.try_into().unwrap());

    println!(
        "Image: {} ({} byte body, sw_ver {}, hw_ver {})",
        file.display(),
        body.len(),
        header.sw_ver,
        header.hw_ver
    );

    print!("Connecting... ");
    std::io::stdout().flush()?;
    let (status, _) = transport.send_recv(Opcode::Connect, &[])?;
    require_ok("Connect", status)?;
    println!("OK");

    print!("Preparing (erasing target region)... ");
    std::io::stdout().flush()?;
    let (status, _) = transport.send_recv_timeout(Opcode::Prepare, header_bytes, 60_000)?;
    require_ok("Prepare", status)?;
    println!("OK");

    let pb = ProgressBar::new(body.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let mut offset = 0usize;
    for chunk in body.chunks(CHUNK_SIZE) {
        let (status, _) = transport.send_recv(Opcode::Flash, chunk)?;
        if status != MsgStatus::Ok {
            pb.abandon();
            bail!("Flash failed at offset {offset}: {status:?}");
        }
        offset += chunk.len();
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("Upload complete");
    println!();

    print!("Finalizing... ");
    std::io::stdout().flush()?;
    let (status, _) = transport.send_recv(Opcode::Exit, &[])?;
    require_ok("Exit", status)?;
    println!("OK");

    println!();
    println!("Firmware flashed successfully.");
    println!(
        "Use 'crispy-upload --port {} reboot' to restart the device.",
        transport.port_name()
    );

    Ok(())
}

/// Ask the device to reboot.
pub fn reboot(transport: &mut Transport) -> Result<()> {
    print!("Rebooting device... ");
    std::io::stdout().flush()?;
    let (status, _) = transport.send_recv(Opcode::Reset, &[])?;
    require_ok("Reset", status)?;
    println!("OK");
    Ok(())
}

fn load_signing_key(path: &Path) -> Result<SigningKey> {
    if let Ok(text) = fs::read_to_string(path) {
        if text.contains("BEGIN") {
            return SigningKey::from_pkcs8_pem(&text)
                .with_context(|| format!("invalid PEM private key in {}", path.display()));
        }
    }
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let raw: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("private key must be 32 raw bytes or a PEM-encoded key"))?;
    SigningKey::from_bytes(&raw.into()).context("invalid secp256k1 private key")
}

/// Sign a firmware body into a flashable image: a 256-byte `ImageHeader`
/// carrying a SHA-256 + ECDSA-secp256k1 signature over the body, followed by
/// the body itself.
pub fn sign(
    input: &Path,
    output: &Path,
    key: &Path,
    hw_version: u16,
    sw_version: u32,
    fw_addr: u32,
) -> Result<()> {
    let body = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let signing_key = load_signing_key(key)?;

    let digest = Sha256::digest(&body);
    let signature: Signature = signing_key
        .sign_prehash(&digest)
        .context("failed to sign firmware digest")?;
    let mut signature_bytes = [0u8; 64];
    signature_bytes.copy_from_slice(&signature.to_bytes());

    let mut header = ImageHeader {
        ver: 1,
        sig_type: SigType::Ecdsa as u8,
        hw_ver: hw_version,
        sw_ver: sw_version,
        fw_size: body.len() as u32,
        fw_crc: 0,
        fw_addr,
        signature: signature_bytes,
        reserved: [0; 171],
        crc: 0,
    };
    header.crc = header.computed_crc();

    let mut out = fs::File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    out.write_all(header.as_bytes())?;
    out.write_all(&body)?;

    println!(
        "Signed image written to {} ({} byte body, sw_ver {sw_version}, hw_ver {hw_version})",
        output.display(),
        body.len()
    );
    Ok(())
}
