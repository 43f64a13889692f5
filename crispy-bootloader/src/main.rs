// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Crispy Bootloader for RP2040: single-image firmware update over USB CDC,
//! gated by header + signature validation at reset.

#![no_std]
#![no_main]

mod boot;
mod flash;
mod peripherals;
mod update;
mod usb_transport;

use defmt_rtt as _;
use embedded_hal::digital::InputPin;
use panic_probe as _;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;
use crispy_common::BootConfig;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

#[entry]
fn main() -> ! {
    defmt::println!("Bootloader init");

    let mut p = peripherals::init();

    crispy_common::blink(&mut p.led_pin, &mut p.timer, 3, 200);

    let gp2_low = p.gp2.is_low().unwrap_or(false);

    boot::run_reset_controller(&mut p, &BootConfig::default_const(), gp2_low);
}
