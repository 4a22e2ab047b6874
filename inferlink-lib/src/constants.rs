// Protocol constants shared with the device firmware

/// Frame sync word. Transmitted little-endian, so the wire sees `55 AA`.
pub const PREAMBLE: u16 = 0xAA55;

/// Size of the fixed packet header (8 bytes).
pub const HEADER_SIZE: usize = 8;

/// Size of the CRC-16 trailer (2 bytes).
pub const CRC_SIZE: usize = 2;

/// Minimum size of a valid frame: header plus trailer, empty payload.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CRC_SIZE;

/// Capacity of the parser scratch buffer, and the upper bound on frame size.
pub const MAX_FRAME_SIZE: usize = 2048;

/// Bit in the header `type` field marking a device-to-host answer.
pub const ANSWER_FLAG: u16 = 0x8000;
