// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::commands;
use crate::transport::Transport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "crispy-upload")]
#[command(about = "Firmware upload tool for crispy-bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0). Required for every command except `sign`.
    #[arg(short, long)]
    pub port: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Query the bootloader's reported version
    Info,

    /// Query in-progress flashing status (0/0 when idle)
    Status,

    /// Flash a signed image: Connect, Prepare, stream Flash chunks, Exit
    PrepareAndFlash {
        /// Signed image file produced by `sign`
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Sign a firmware body into a flashable, header-prefixed image
    Sign {
        /// Raw firmware binary
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output path for the signed image (header + body)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// secp256k1 private key, PEM-encoded or 32 raw bytes
        #[arg(long)]
        key: PathBuf,

        /// This board's hardware version
        #[arg(long, default_value = "1")]
        hw_version: u16,

        /// Firmware version, checked against the device's downgrade policy
        #[arg(long, default_value = "1")]
        sw_version: u32,

        /// Flash address the firmware body is written to, e.g. 0x10010000
        #[arg(long, default_value = "0x10010000")]
        fw_addr: String,
    },

    /// Ask the device to reboot
    Reboot,
}

fn parse_addr(text: &str) -> Result<u32> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u32::from_str_radix(digits, 16).with_context(|| format!("invalid address: {text}"))
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Sign {
        input,
        output,
        key,
        hw_version,
        sw_version,
        fw_addr,
    } = &cli.command
    {
        return commands::sign(input, output, key, *hw_version, *sw_version, parse_addr(fw_addr)?);
    }

    let port = cli
        .port
        .context("--port is required for this command")?;
    let mut transport = Transport::new(&port)?;

    match cli.command {
        Commands::Info => commands::info(&mut transport),
        Commands::Status => commands::status(&mut transport),
        Commands::PrepareAndFlash { file } => commands::prepare_and_flash(&mut transport, &file),
        Commands::Reboot => commands::reboot(&mut transport),
        Commands::Sign { .. } => unreachable!("handled above"),
    }
}
