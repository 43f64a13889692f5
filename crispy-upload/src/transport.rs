// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport layer for bootloader communication.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serialport::SerialPort;

use crispy_common::frame::{self, FrameHeader, Opcode, FRAME_HEADER_SIZE, SRC_BOOTLOADER, SRC_MANAGER};
use crispy_common::parser::{FrameParser, ParserEvent, MAX_PAYLOAD};
use crispy_common::status::MsgStatus;

/// Default timeout for serial operations in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// USB CDC transport for communicating with the bootloader, framed the same
/// way the device frames its own responses (see `crispy_common::frame`).
pub struct Transport {
    port: Box<dyn SerialPort>,
    parser: FrameParser,
    clock: Instant,
}

impl Transport {
    /// Create a new transport connection to the specified serial port.
    pub fn new(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, 115200)
            .timeout(Duration::from_millis(50))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;

        Ok(Self {
            port,
            parser: FrameParser::new(),
            clock: Instant::now(),
        })
    }

    /// Get the port name.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }

    fn now_ms(&self) -> u32 {
        self.clock.elapsed().as_millis() as u32
    }

    fn send(&mut self, opcode: Opcode, payload: &[u8]) -> Result<()> {
        let header = FrameHeader {
            length: payload.len() as u16,
            source: SRC_MANAGER,
            command: opcode as u8,
            status: 0,
        };
        let mut buf = [0u8; FRAME_HEADER_SIZE + MAX_PAYLOAD];
        let n = frame::encode(&header, payload, &mut buf)
            .context("payload too large to frame")?;
        log::debug!("tx {} bytes: {:02x?}", n, &buf[..n]);
        self.port
            .write_all(&buf[..n])
            .context("failed to write to serial port")?;
        self.port.flush()?;
        Ok(())
    }

    fn recv(&mut self, timeout_ms: u64) -> Result<(FrameHeader, Vec<u8>)> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut byte = [0u8; 1];
        loop {
            if Instant::now() > deadline {
                bail!("timeout waiting for response");
            }
            match self.port.read(&mut byte) {
                Ok(1) => match self.parser.poll(Some(byte[0]), self.now_ms(), 250) {
                    ParserEvent::Frame { header, payload } => {
                        log::debug!("rx frame {:?} ({} byte payload)", header, payload.len());
                        return Ok((header, payload.to_vec()));
                    }
                    ParserEvent::Crc => bail!("response failed its frame CRC"),
                    ParserEvent::Overrun => bail!("response payload too large to parse"),
                    ParserEvent::Timeout | ParserEvent::Empty => {}
                },
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => bail!("serial read error: {e}"),
            }
        }
    }

    fn drain_rx(&mut self) {
        let mut buf = [0u8; 64];
        while self.port.read(&mut buf).unwrap_or(0) > 0 {}
    }

    /// Send a request frame and wait for its response, validating the
    /// response came from the bootloader and carries a known status.
    pub fn send_recv(&mut self, opcode: Opcode, payload: &[u8]) -> Result<(MsgStatus, Vec<u8>)> {
        self.send_recv_timeout(opcode, payload, DEFAULT_TIMEOUT_MS)
    }

    pub fn send_recv_timeout(
        &mut self,
        opcode: Opcode,
        payload: &[u8],
        timeout_ms: u64,
    ) -> Result<(MsgStatus, Vec<u8>)> {
        self.drain_rx();
        self.send(opcode, payload)?;
        let (header, payload) = self.recv(timeout_ms)?;
        if header.source != SRC_BOOTLOADER {
            bail!("response came from an unexpected source (0x{:02x})", header.source);
        }
        let status = MsgStatus::from_u8(header.status)
            .with_context(|| format!("unknown status byte 0x{:02x}", header.status))?;
        Ok((status, payload))
    }
}
