// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB CDC transport. Bytes are handed to the core one at a time through
//! `crispy_common::Transport`; framing (preamble/length/CRC) is entirely the
//! core's concern, not the transport's.

use crispy_common::status::BootStatus;
use crispy_common::Transport;
use rp2040_hal::usb::UsbBus;
use usb_device::class_prelude::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

const RX_QUEUE_SIZE: usize = 256;

pub struct UsbTransport {
    serial: SerialPort<'static, UsbBus>,
    usb_dev: UsbDevice<'static, UsbBus>,
    rx_queue: [u8; RX_QUEUE_SIZE],
    rx_head: usize,
    rx_tail: usize,
}

impl UsbTransport {
    pub fn new(usb_bus: &'static UsbBusAllocator<UsbBus>) -> Self {
        let serial = SerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x2E8A, 0x000A))
            .strings(&[StringDescriptors::default()
                .manufacturer("ADNT")
                .product("Crispy Bootloader")
                .serial_number("0001")])
            .unwrap()
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Self {
            serial,
            usb_dev,
            rx_queue: [0u8; RX_QUEUE_SIZE],
            rx_head: 0,
            rx_tail: 0,
        }
    }

    /// Poll USB device and drain any available bytes into the local ring
    /// buffer. Must be called frequently from the service loop.
    pub fn poll(&mut self) -> bool {
        let ready = self.usb_dev.poll(&mut [&mut self.serial]);
        let mut tmp = [0u8; 64];
        if let Ok(count) = self.serial.read(&mut tmp) {
            for &byte in &tmp[..count] {
                let next = (self.rx_tail + 1) % RX_QUEUE_SIZE;
                if next != self.rx_head {
                    self.rx_queue[self.rx_tail] = byte;
                    self.rx_tail = next;
                }
            }
        }
        ready
    }
}

impl Transport for UsbTransport {
    fn receive_byte(&mut self) -> Option<u8> {
        if self.rx_head == self.rx_tail {
            return None;
        }
        let byte = self.rx_queue[self.rx_head];
        self.rx_head = (self.rx_head + 1) % RX_QUEUE_SIZE;
        Some(byte)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), BootStatus> {
        let mut offset = 0;
        while offset < data.len() {
            match self.serial.write(&data[offset..]) {
                Ok(n) => offset += n,
                Err(UsbError::WouldBlock) => {
                    self.poll();
                }
                Err(_) => return Err(BootStatus::Error),
            }
        }
        Ok(())
    }
}
