//! Typed payloads and the high-level message layer on top of raw frames.

use crate::error::Error;
use crate::packet::{ErrorCode, PacketKind, RawPacket};
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;
use zerocopy::byteorder::little_endian::{F32, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Model description returned by the device on a `MODEL_INFO` answer.
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ModelInfo {
    pub columns_count: U32,
    pub task_type: U32,
}

impl ModelInfo {
    pub fn new(columns_count: u32, task_type: TaskType) -> Self {
        Self {
            columns_count: U32::new(columns_count),
            task_type: U32::new(task_type.into()),
        }
    }

    pub fn task(&self) -> TaskType {
        TaskType::from_primitive(self.task_type.get())
    }
}

/// Dataset geometry announced to the device before sample streaming.
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DatasetInfo {
    pub columns_count: U32,
    pub reverse_byte_order: u8,
}

impl DatasetInfo {
    pub fn new(columns_count: u32) -> Self {
        Self {
            columns_count: U32::new(columns_count),
            reverse_byte_order: 0,
        }
    }
}

/// Resource and timing counters returned by the device on `PERF_REPORT`.
#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PerformanceReport {
    pub freq: U32,
    pub flash_usage: U32,
    pub ram_usage: U32,
    pub ram_usage_cur: U32,
    pub buffer_size: U32,
    pub us_sample_min: F32,
    pub us_sample_max: F32,
    pub us_sample_avg: F32,
}

impl PerformanceReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        freq: u32,
        flash_usage: u32,
        ram_usage: u32,
        ram_usage_cur: u32,
        buffer_size: u32,
        us_sample_min: f32,
        us_sample_max: f32,
        us_sample_avg: f32,
    ) -> Self {
        Self {
            freq: U32::new(freq),
            flash_usage: U32::new(flash_usage),
            ram_usage: U32::new(ram_usage),
            ram_usage_cur: U32::new(ram_usage_cur),
            buffer_size: U32::new(buffer_size),
            us_sample_min: F32::new(us_sample_min),
            us_sample_max: F32::new(us_sample_max),
            us_sample_avg: F32::new(us_sample_avg),
        }
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resource report:")?;
        writeln!(f, "       CPU freq: {}", self.freq.get())?;
        writeln!(f, "    Flash usage: {}", self.flash_usage.get())?;
        writeln!(f, "RAM usage total: {}", self.ram_usage.get())?;
        writeln!(f, "      RAM usage: {}", self.ram_usage_cur.get())?;
        writeln!(f, "    UART buffer: {}", self.buffer_size.get())?;
        writeln!(f)?;
        writeln!(f, "Performance report:")?;
        writeln!(f, "Sample calc time, avg: {:3.1} us", self.us_sample_avg.get())?;
        writeln!(f, "Sample calc time, min: {:3.1} us", self.us_sample_min.get())?;
        writeln!(f, "Sample calc time, max: {:3.1} us", self.us_sample_max.get())?;
        write!(f, "================")
    }
}

/// Output shape declared by the device. Drives prediction formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u32)]
pub enum TaskType {
    BinaryClassification = 0,
    MulticlassClassification = 1,
    Regression = 2,

    #[num_enum(catch_all)]
    Unknown(u32),
}

impl TaskType {
    /// Regression prints raw values; everything else prints argmax first.
    pub fn is_regression(&self) -> bool {
        matches!(self, TaskType::Regression)
    }
}

/// One protocol message, either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Host request for the model description.
    GetModelInfo,
    /// Device answer carrying the model description.
    ModelInfo(ModelInfo),
    /// Host announcement of the dataset geometry.
    DatasetInfo(DatasetInfo),
    /// Device acknowledgement of the dataset geometry.
    DatasetInfoAck,
    /// Host request carrying one input sample.
    Sample(Vec<f32>),
    /// Device answer carrying one prediction.
    Prediction(Vec<f32>),
    /// Host request for the performance report.
    GetPerfReport,
    /// Device answer carrying the performance report.
    PerfReport(PerformanceReport),
    /// Device-reported protocol error.
    DeviceError(ErrorCode),
}

impl Message {
    /// Encode into a raw frame with the proper direction bit.
    pub fn to_raw(&self) -> RawPacket {
        match self {
            Message::GetModelInfo => RawPacket::request(PacketKind::ModelInfo, Bytes::new()),
            Message::ModelInfo(info) => {
                RawPacket::reply(PacketKind::ModelInfo, Bytes::copy_from_slice(info.as_bytes()))
            }
            Message::DatasetInfo(info) => {
                RawPacket::request(PacketKind::DatasetInfo, Bytes::copy_from_slice(info.as_bytes()))
            }
            Message::DatasetInfoAck => RawPacket::reply(PacketKind::DatasetInfo, Bytes::new()),
            Message::Sample(values) => {
                RawPacket::request(PacketKind::DatasetSample, encode_f32s(values))
            }
            Message::Prediction(values) => {
                RawPacket::reply(PacketKind::DatasetSample, encode_f32s(values))
            }
            Message::GetPerfReport => RawPacket::request(PacketKind::PerfReport, Bytes::new()),
            Message::PerfReport(report) => {
                RawPacket::reply(PacketKind::PerfReport, Bytes::copy_from_slice(report.as_bytes()))
            }
            Message::DeviceError(code) => RawPacket {
                kind: PacketKind::Error,
                answer: true,
                error: *code,
                payload: Bytes::new(),
            },
        }
    }
}

impl TryFrom<RawPacket> for Message {
    type Error = Error;

    fn try_from(packet: RawPacket) -> Result<Self, Error> {
        if packet.kind == PacketKind::Error {
            return Ok(Message::DeviceError(packet.error));
        }

        match (packet.kind, packet.answer) {
            (PacketKind::ModelInfo, false) => Ok(Message::GetModelInfo),
            (PacketKind::ModelInfo, true) => {
                let (info, _) = ModelInfo::read_from_prefix(&packet.payload).map_err(|_| {
                    Error::InvalidPacket(format!(
                        "model info payload too short: {} bytes",
                        packet.payload.len()
                    ))
                })?;
                Ok(Message::ModelInfo(info))
            }
            (PacketKind::DatasetInfo, false) => {
                let (info, _) = DatasetInfo::read_from_prefix(&packet.payload).map_err(|_| {
                    Error::InvalidPacket(format!(
                        "dataset info payload too short: {} bytes",
                        packet.payload.len()
                    ))
                })?;
                Ok(Message::DatasetInfo(info))
            }
            (PacketKind::DatasetInfo, true) => Ok(Message::DatasetInfoAck),
            (PacketKind::DatasetSample, false) => Ok(Message::Sample(decode_f32s(&packet.payload))),
            (PacketKind::DatasetSample, true) => {
                Ok(Message::Prediction(decode_f32s(&packet.payload)))
            }
            (PacketKind::PerfReport, false) => Ok(Message::GetPerfReport),
            (PacketKind::PerfReport, true) => {
                let (report, _) =
                    PerformanceReport::read_from_prefix(&packet.payload).map_err(|_| {
                        Error::InvalidPacket(format!(
                            "performance report payload too short: {} bytes",
                            packet.payload.len()
                        ))
                    })?;
                Ok(Message::PerfReport(report))
            }
            (PacketKind::Unknown(value), _) => {
                Err(Error::Protocol(format!("unrecognized packet kind {value:#06x}")))
            }
            (PacketKind::Error, _) => unreachable!("handled above"),
        }
    }
}

fn encode_f32s(values: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(values.len() * size_of::<f32>());
    for value in values {
        buf.put_f32_le(*value);
    }
    buf.freeze()
}

fn decode_f32s(payload: &[u8]) -> Vec<f32> {
    payload
        .chunks_exact(size_of::<f32>())
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
