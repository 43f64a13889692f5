// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot management: memory layout, image validation, and the reset-time
//! controller that decides jump-to-app vs. stay-in-bootloader (SPEC_FULL
//! §4.8).

use crispy_common::image::{ImageHeader, ImageValidator, IMAGE_HEADER_SIZE};
use crispy_common::shared_mem::{BootReason, SharedMemory};
use crispy_common::{AppJumper, BootConfig, FlashDriver};

use crate::flash::{DevicePublicKey, Rp2040Flash};
use crate::peripherals::Peripherals;

unsafe extern "C" {
    static __app_header_addr: u32;
    static __shared_mem_addr: u32;
    static __pubkey_addr: u32;
    static __fw_ram_base: u32;
    static __fw_copy_size: u32;
    static __fw_ram_start: u32;
    static __fw_ram_end: u32;
}

macro_rules! linker_addr {
    ($sym:ident) => {
        unsafe { &$sym as *const u32 as u32 }
    };
}

/// Fixed flash/RAM addresses supplied by the linker script. Unlike the
/// multi-bank layout this replaces, there is exactly one application image:
/// its header lives at `header_addr`, its body immediately after.
pub struct MemoryLayout {
    pub header_addr: u32,
    pub shared_mem_addr: u32,
    pub pubkey_addr: u32,
    pub ram_base: u32,
    pub copy_size: u32,
}

impl MemoryLayout {
    pub fn from_linker() -> Self {
        Self {
            header_addr: linker_addr!(__app_header_addr),
            shared_mem_addr: linker_addr!(__shared_mem_addr),
            pubkey_addr: linker_addr!(__pubkey_addr),
            ram_base: linker_addr!(__fw_ram_base),
            copy_size: linker_addr!(__fw_copy_size),
        }
    }
}

struct VectorTable {
    initial_sp: u32,
    reset_vector: u32,
}

impl VectorTable {
    unsafe fn read_from(addr: u32) -> Self {
        Self {
            initial_sp: (addr as *const u32).read_volatile(),
            reset_vector: (addr as *const u32).offset(1).read_volatile(),
        }
    }
}

fn is_in_ram(addr: u32) -> bool {
    let start = linker_addr!(__fw_ram_start);
    let end = linker_addr!(__fw_ram_end);
    (start..=end).contains(&addr)
}

/// Validate the installed image (header CRC, then CRC-32 or ECDSA body
/// check per `sig_type`). Any failure poisons the header, per
/// `ImageValidator::validate`.
pub fn validate_installed_image(
    flash: &mut Rp2040Flash,
    layout: &MemoryLayout,
    keys: &DevicePublicKey,
) -> Result<ImageHeader, crispy_common::MsgStatus> {
    ImageValidator::new(flash).validate(layout.header_addr, keys)
}

/// `crispy_common::AppJumper` for RP2040: sets MSP and branches to the
/// application's reset vector. Never returns.
pub struct Rp2040Jumper;

impl AppJumper for Rp2040Jumper {
    fn jump(&mut self, initial_sp: u32, reset_vector: u32) -> ! {
        unsafe {
            core::arch::asm!(
                "msr msp, {sp}",
                "cpsie i",
                "bx {reset}",
                sp = in(reg) initial_sp,
                reset = in(reg) reset_vector,
                options(noreturn)
            );
        }
    }
}

/// Copies the validated application body into RAM, relocates the vector
/// table, and jumps. Everything after this call is unreachable.
///
/// # Safety
/// `header` must describe an image that has already passed
/// [`validate_installed_image`]; `layout` must be this board's real memory
/// layout.
pub unsafe fn load_and_jump(
    header: &ImageHeader,
    layout: &MemoryLayout,
    jumper: &mut impl AppJumper,
) -> ! {
    core::ptr::copy_nonoverlapping(
        header.fw_addr as *const u32,
        layout.ram_base as *mut u32,
        layout.copy_size as usize / 4,
    );

    cortex_m::interrupt::disable();
    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    NVIC_ICPR.write_volatile(0xFFFF_FFFF);
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    NVIC_ICER.write_volatile(0xFFFF_FFFF);

    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(layout.ram_base);
    cortex_m::asm::dsb();
    cortex_m::asm::isb();

    if !is_in_ram(layout.ram_base) {
        defmt::println!("RAM base outside expected RAM window, refusing to jump");
    }

    let vt = VectorTable::read_from(layout.ram_base);
    jumper.jump(vt.initial_sp, vt.reset_vector)
}

/// Reset-time controller (SPEC_FULL §4.8). Decides whether to jump straight
/// to the application or to fall into the update-mode service loop, and
/// never returns: either branch ends in a non-returning call.
pub fn run_reset_controller(p: &mut Peripherals, config: &BootConfig, gp2_low: bool) -> ! {
    let layout = MemoryLayout::from_linker();
    let mut flash = Rp2040Flash;
    crate::flash::init();
    let keys = DevicePublicKey::load(layout.pubkey_addr);
    let mut transport = crate::update::init_usb(p);

    // SAFETY: `shared_mem_addr` is a linker-placed 32-byte RAM region
    // reserved exclusively for this contract; nothing else in the bootloader
    // or application aliases it while this reference is alive.
    let shared_mem_region = unsafe { &mut *(layout.shared_mem_addr as *mut [u8; crispy_common::SHARED_MEM_SIZE]) };
    let mut shared_mem = unsafe { SharedMemory::wrap(shared_mem_region) };
    let mut reason = shared_mem.init();

    if reason == BootReason::None && gp2_low {
        defmt::println!("GP2 held low at reset, forcing update mode");
        shared_mem.set_boot_reason(BootReason::Com);
        reason = BootReason::Com;
    }

    let boot_count = shared_mem.get_boot_count().unwrap_or(u8::MAX);
    if reason == BootReason::None && boot_count >= config.max_boot_attempts {
        defmt::println!(
            "Boot count {} reached limit {}, poisoning image and forcing update mode",
            boot_count,
            config.max_boot_attempts
        );
        let _ = flash.erase(layout.header_addr, IMAGE_HEADER_SIZE as u32);
        shared_mem.set_boot_reason(BootReason::Wdt);
        reason = BootReason::Wdt;
    }

    let current_sw_ver = shared_mem.get_boot_version().unwrap_or(0);

    if reason == BootReason::None {
        if let Ok(header) = validate_installed_image(&mut flash, &layout, &keys) {
            defmt::println!("Image valid, entering back-door window");
            let connected = crate::update::run_back_door_window(
                p,
                &mut transport,
                &mut flash,
                &mut shared_mem,
                &layout,
                config,
                current_sw_ver,
                &keys,
                config.wait_at_startup_ms,
            );
            if !connected {
                defmt::println!("No connect during back-door window, jumping to application");
                let mut jumper = Rp2040Jumper;
                unsafe { load_and_jump(&header, &layout, &mut jumper) }
            }
        } else {
            defmt::println!("No valid image installed, entering update mode");
        }
    }

    crate::update::run_update_mode(
        p,
        &mut transport,
        &mut flash,
        &mut shared_mem,
        &layout,
        config,
        current_sw_ver,
        &keys,
    )
}
