use std::io;
use thiserror::Error;

use crate::session::SessionState;

/// The primary error type for the `inferlink` library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("dataset error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("no answer in state {state} after {attempts} attempts")]
    RetriesExhausted { state: SessionState, attempts: u32 },

    #[error("device advertised zero result columns")]
    NoResultColumns,

    #[error("nothing to send: dataset is empty")]
    EmptyDataset,

    #[error("unsupported baud rate: {0}")]
    UnsupportedBaud(u32),
}
