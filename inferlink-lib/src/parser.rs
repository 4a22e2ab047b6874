//! Stateful byte-at-a-time frame reassembler.
//!
//! Hunts for the preamble in the incoming byte stream, accumulates one
//! frame into a bounded scratch buffer, and emits it once the CRC checks
//! out. Anything that fails validation is discarded and scanning resumes
//! at the next preamble; the parser itself never touches I/O and holds no
//! global state, so the caller decides where emitted packets go.

use crate::constants::{HEADER_SIZE, MAX_FRAME_SIZE, MIN_FRAME_SIZE, PREAMBLE};
use crate::packet::RawPacket;
use bytes::Bytes;
use tracing::{debug, trace};

const PREAMBLE_SIZE: usize = 2;

#[derive(Debug, Clone, Copy)]
enum ParseState {
    /// Sliding a two-byte window over the stream looking for the preamble.
    Hunt,
    /// Accumulating the six header bytes that follow the preamble.
    Header,
    /// Accumulating payload and CRC trailer up to the declared size.
    Body { size: usize },
}

/// Reassembles frames from a raw byte stream.
pub struct FrameParser {
    state: ParseState,
    buf: Vec<u8>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Hunt,
            buf: Vec::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Consume one byte; returns a packet when it completes a valid frame.
    pub fn push(&mut self, byte: u8) -> Option<RawPacket> {
        match self.state {
            ParseState::Hunt => {
                self.buf.push(byte);
                if self.buf.len() > PREAMBLE_SIZE {
                    self.buf.remove(0);
                }
                if self.buf == PREAMBLE.to_le_bytes() {
                    self.state = ParseState::Header;
                }
                None
            }
            ParseState::Header => {
                self.buf.push(byte);
                if self.buf.len() < HEADER_SIZE {
                    return None;
                }
                let size = u16::from_le_bytes([self.buf[6], self.buf[7]]) as usize;
                if (MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&size) {
                    self.state = ParseState::Body { size };
                } else {
                    debug!(size, "frame size out of range, resuming preamble hunt");
                    self.resync();
                }
                None
            }
            ParseState::Body { size } => {
                self.buf.push(byte);
                if self.buf.len() < size {
                    return None;
                }
                match RawPacket::try_from(Bytes::copy_from_slice(&self.buf)) {
                    Ok(packet) => {
                        trace!(kind = ?packet.kind, len = size, "frame reassembled");
                        self.buf.clear();
                        self.state = ParseState::Hunt;
                        Some(packet)
                    }
                    Err(err) => {
                        debug!("discarding corrupt frame: {err}");
                        self.resync();
                        None
                    }
                }
            }
        }
    }

    /// Feed a received chunk, invoking `sink` for every completed frame.
    pub fn feed<F: FnMut(RawPacket)>(&mut self, chunk: &[u8], mut sink: F) {
        for &byte in chunk {
            if let Some(packet) = self.push(byte) {
                sink(packet);
            }
        }
    }

    // Drop accumulated progress, keeping the last byte in the hunt window.
    fn resync(&mut self) {
        let last = self.buf.last().copied();
        self.buf.clear();
        self.buf.extend(last);
        self.state = ParseState::Hunt;
    }
}
