// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Byte-by-byte frame reassembler.
//!
//! Three states: `Idle` scans for the two-byte preamble, `RcvHeader`
//! collects the remaining header bytes, `RcvPayload` collects the payload.
//! A single call is made per available byte (or `None` when none is
//! available), alongside the current tick, so the parser can detect an
//! inter-byte timeout without owning a clock itself.

use heapless::Vec;

use crate::frame::{self, FrameHeader, FrameError, FRAME_HEADER_SIZE, FRAME_PREAMBLE};

/// Largest payload this parser will reassemble.
pub const MAX_PAYLOAD: usize = 512;
const BUF_CAPACITY: usize = FRAME_HEADER_SIZE + MAX_PAYLOAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    RcvHeader,
    RcvPayload,
}

/// Outcome of feeding one byte (or none) into the parser.
#[derive(Debug, PartialEq, Eq)]
pub enum ParserEvent {
    /// No complete frame yet; keep feeding bytes.
    Empty,
    /// A complete, CRC-valid frame was reassembled.
    Frame {
        header: FrameHeader,
        payload: Vec<u8, MAX_PAYLOAD>,
    },
    /// The declared length exceeds what this parser can buffer.
    Overrun,
    /// No byte arrived within the inter-byte timeout while mid-frame.
    Timeout,
    /// A complete frame arrived but failed its CRC.
    Crc,
}

pub struct FrameParser {
    state: State,
    buf: Vec<u8, BUF_CAPACITY>,
    declared_len: u16,
    last_byte_ms: u32,
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            buf: Vec::new(),
            declared_len: 0,
            last_byte_ms: 0,
        }
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.buf.clear();
        self.declared_len = 0;
    }

    /// Feed one byte (or `None` if the transport had nothing to offer) at
    /// the given tick. `idle_timeout_ms` bounds how long a partially
    /// received frame may sit before it is abandoned.
    pub fn poll(&mut self, byte: Option<u8>, now_ms: u32, idle_timeout_ms: u32) -> ParserEvent {
        let Some(byte) = byte else {
            if self.state != State::Idle && now_ms.wrapping_sub(self.last_byte_ms) > idle_timeout_ms
            {
                self.reset();
                return ParserEvent::Timeout;
            }
            return ParserEvent::Empty;
        };

        self.last_byte_ms = now_ms;

        match self.state {
            State::Idle => self.poll_idle(byte),
            State::RcvHeader => self.poll_header(byte),
            State::RcvPayload => self.poll_payload(byte),
        }
    }

    fn poll_idle(&mut self, byte: u8) -> ParserEvent {
        let _ = self.buf.push(byte);
        if self.buf.len() < 2 {
            return ParserEvent::Empty;
        }
        let preamble = u16::from_le_bytes([self.buf[0], self.buf[1]]);
        if preamble == FRAME_PREAMBLE {
            self.state = State::RcvHeader;
        } else {
            // Resync: drop the oldest byte and keep scanning.
            self.buf[0] = self.buf[1];
            self.buf.truncate(1);
        }
        ParserEvent::Empty
    }

    fn poll_header(&mut self, byte: u8) -> ParserEvent {
        if self.buf.push(byte).is_err() {
            self.reset();
            return ParserEvent::Overrun;
        }
        if self.buf.len() < FRAME_HEADER_SIZE {
            return ParserEvent::Empty;
        }

        let length = u16::from_le_bytes([self.buf[2], self.buf[3]]);
        if length as usize > MAX_PAYLOAD {
            self.reset();
            return ParserEvent::Overrun;
        }
        self.declared_len = length;

        if length == 0 {
            self.finish()
        } else {
            self.state = State::RcvPayload;
            ParserEvent::Empty
        }
    }

    fn poll_payload(&mut self, byte: u8) -> ParserEvent {
        if self.buf.push(byte).is_err() {
            self.reset();
            return ParserEvent::Overrun;
        }
        if self.buf.len() < FRAME_HEADER_SIZE + self.declared_len as usize {
            return ParserEvent::Empty;
        }
        self.finish()
    }

    fn finish(&mut self) -> ParserEvent {
        let event = match frame::decode(&self.buf) {
            Ok((header, payload)) => match Vec::from_slice(payload) {
                Ok(payload) => ParserEvent::Frame { header, payload },
                Err(_) => ParserEvent::Overrun,
            },
            Err(FrameError::Crc) => ParserEvent::Crc,
            Err(_) => ParserEvent::Overrun,
        };
        self.reset();
        event
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
