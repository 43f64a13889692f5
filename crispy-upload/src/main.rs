// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware upload tool for crispy-bootloader via USB CDC.
//!
//! Usage:
//!   crispy-upload sign firmware.bin firmware.signed.bin --key dev.key
//!   crispy-upload --port /dev/ttyACM0 prepare-and-flash firmware.signed.bin
//!   crispy-upload --port /dev/ttyACM0 status
//!   crispy-upload --port /dev/ttyACM0 reboot

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Cli::parse();
    cli::run(args)
}
