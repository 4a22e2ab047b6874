//! Wire framing: header layout, kind and error enums, frame encode/decode.
//!
//! Every frame is `header (8) | payload | crc16 (2)`, all little-endian.
//! The header is serialized field by field through fixed-endian types
//! rather than by reinterpreting host memory, so layout never depends on
//! the platform.

use crate::checksum::crc16;
use crate::constants::{ANSWER_FLAG, CRC_SIZE, HEADER_SIZE, MIN_FRAME_SIZE, PREAMBLE};
use crate::error::Error;
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Fixed 8-byte packet header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PacketHeader {
    pub preamble: U16,
    pub packet_type: U16,
    pub error: U16,
    pub size: U16,
}

/// Semantic category of a frame, encoded in the low bits of the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum PacketKind {
    ModelInfo = 1,
    DatasetInfo = 2,
    DatasetSample = 3,
    PerfReport = 4,
    Error = 5,

    #[num_enum(catch_all)]
    Unknown(u16),
}

/// Status carried in the header `error` field. Meaningful on answers only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum ErrorCode {
    #[strum(to_string = "SUCCESS")]
    Success = 0,
    #[strum(to_string = "INVALID_SIZE")]
    InvalidSize = 1,
    #[strum(to_string = "NO_MEMORY")]
    NoMemory = 2,
    #[strum(to_string = "SEND_AGAIN")]
    SendAgain = 3,

    #[num_enum(catch_all)]
    #[strum(to_string = "UNKNOWN({0})")]
    Unknown(u16),
}

/// Extract the kind bits of a raw `type` field value.
pub fn kind_of(packet_type: u16) -> PacketKind {
    PacketKind::from_primitive(packet_type & !ANSWER_FLAG)
}

/// True if the `type` field carries the answer direction bit.
pub fn is_answer(packet_type: u16) -> bool {
    packet_type & ANSWER_FLAG != 0
}

/// One validated frame, stripped of preamble, size, and CRC trailer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    pub kind: PacketKind,
    pub answer: bool,
    pub error: ErrorCode,
    pub payload: Bytes,
}

impl RawPacket {
    /// Build a host-to-device request.
    pub fn request(kind: PacketKind, payload: Bytes) -> Self {
        Self {
            kind,
            answer: false,
            error: ErrorCode::Success,
            payload,
        }
    }

    /// Build a device-to-host answer.
    pub fn reply(kind: PacketKind, payload: Bytes) -> Self {
        Self {
            kind,
            answer: true,
            error: ErrorCode::Success,
            payload,
        }
    }
}

impl From<RawPacket> for Bytes {
    fn from(packet: RawPacket) -> Self {
        let size = HEADER_SIZE + packet.payload.len() + CRC_SIZE;
        let mut type_field: u16 = packet.kind.into();
        if packet.answer {
            type_field |= ANSWER_FLAG;
        }

        let header = PacketHeader {
            preamble: U16::new(PREAMBLE),
            packet_type: U16::new(type_field),
            error: U16::new(packet.error.into()),
            size: U16::new(size as u16),
        };

        let mut frame = BytesMut::with_capacity(size);
        frame.put_slice(header.as_bytes());
        frame.put_slice(&packet.payload);
        let crc = crc16(&frame, 0);
        frame.put_u16_le(crc);
        frame.freeze()
    }
}

impl TryFrom<Bytes> for RawPacket {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Error> {
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(Error::InvalidPacket(format!(
                "frame too short: expected at least {MIN_FRAME_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let (header, _) = PacketHeader::read_from_prefix(&bytes)
            .map_err(|_| Error::InvalidPacket("failed to read packet header".to_string()))?;

        if header.preamble.get() != PREAMBLE {
            return Err(Error::InvalidPacket(format!(
                "bad preamble: {:#06x}",
                header.preamble.get()
            )));
        }

        let size = header.size.get() as usize;
        if size < MIN_FRAME_SIZE || size > bytes.len() {
            return Err(Error::InvalidPacket(format!(
                "declared size {size} outside [{MIN_FRAME_SIZE}, {}]",
                bytes.len()
            )));
        }

        let crc_stored = u16::from_le_bytes([bytes[size - 2], bytes[size - 1]]);
        let crc_computed = crc16(&bytes[..size - CRC_SIZE], 0);
        if crc_stored != crc_computed {
            return Err(Error::InvalidPacket(format!(
                "crc mismatch: frame {crc_stored:#06x}, computed {crc_computed:#06x}"
            )));
        }

        let raw_type = header.packet_type.get();
        Ok(RawPacket {
            kind: kind_of(raw_type),
            answer: is_answer(raw_type),
            error: ErrorCode::from_primitive(header.error.get()),
            payload: bytes.slice(HEADER_SIZE..size - CRC_SIZE),
        })
    }
}
