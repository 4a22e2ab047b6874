//! Common test utilities: a scripted UDP mock device and dataset helpers.

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#![allow(dead_code)]

#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use inferlink_lib::error::Error;
#[allow(unused_imports)]
pub use inferlink_lib::message::{Message, ModelInfo, PerformanceReport, TaskType};
#[allow(unused_imports)]
pub use inferlink_lib::packet::{ErrorCode, PacketKind, RawPacket};
#[allow(unused_imports)]
pub use inferlink_lib::session::{Session, SessionConfig, SessionState};

use inferlink_lib::{CsvSource, Transport};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Write a dataset file under the OS temp directory and return its path.
pub fn write_dataset(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("inferlink-test-{}-{name}.csv", std::process::id()));
    let mut file = File::create(&path).expect("create dataset file");
    file.write_all(contents.as_bytes()).expect("write dataset");
    path
}

/// Session pacing shrunk so retry scenarios finish quickly.
pub fn quick_config() -> SessionConfig {
    SessionConfig {
        pause: Duration::ZERO,
        response_timeout: Duration::from_millis(200),
        error_retry_delay: Duration::from_millis(50),
        max_retries: 3,
    }
}

/// Kinds of every request the mock device received, in arrival order.
pub type SeenRequests = Arc<Mutex<Vec<PacketKind>>>;

/// In-process device double: answers the host's conversation over UDP
/// loopback, with knobs for the failure scenarios.
pub struct MockDevice {
    socket: UdpSocket,
    pub model: ModelInfo,
    pub prediction: Vec<f32>,
    pub report: PerformanceReport,
    /// Ignore this many MODEL_INFO requests before answering one.
    pub ignore_model_info: usize,
    /// Never acknowledge DATASET_INFO.
    pub mute_dataset_info: bool,
    /// Answer the first sample with an ERROR frame carrying this code.
    pub sample_error: Option<ErrorCode>,
    /// Answer the first sample with a CRC-corrupted frame.
    pub corrupt_first_prediction: bool,
}

impl MockDevice {
    pub async fn bind(model: ModelInfo, prediction: Vec<f32>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind mock device");
        Self {
            socket,
            model,
            prediction,
            report: PerformanceReport::new(48_000_000, 3072, 10_446, 0, 2048, 2.0, 8.0, 4.0),
            ignore_model_info: 0,
            mute_dataset_info: false,
            sample_error: None,
            corrupt_first_prediction: false,
        }
    }

    pub fn port(&self) -> u16 {
        self.socket.local_addr().expect("mock device addr").port()
    }

    /// Serve requests until the task is aborted, recording every request kind.
    pub fn spawn(mut self, seen: SeenRequests) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                let (received, from) = self.socket.recv_from(&mut buf).await.expect("mock recv");
                let Ok(packet) = RawPacket::try_from(Bytes::copy_from_slice(&buf[..received])) else {
                    continue;
                };
                seen.lock().expect("seen lock").push(packet.kind);

                let reply = match Message::try_from(packet) {
                    Ok(Message::GetModelInfo) => {
                        if self.ignore_model_info > 0 {
                            self.ignore_model_info -= 1;
                            continue;
                        }
                        Message::ModelInfo(self.model)
                    }
                    Ok(Message::DatasetInfo(_)) => {
                        if self.mute_dataset_info {
                            continue;
                        }
                        Message::DatasetInfoAck
                    }
                    Ok(Message::Sample(_)) => {
                        if let Some(code) = self.sample_error.take() {
                            Message::DeviceError(code)
                        } else if self.corrupt_first_prediction {
                            self.corrupt_first_prediction = false;
                            let mut frame =
                                Bytes::from(Message::Prediction(self.prediction.clone()).to_raw())
                                    .to_vec();
                            let last = frame.len() - 1;
                            frame[last] ^= 0x01;
                            self.socket.send_to(&frame, from).await.expect("mock send");
                            continue;
                        } else {
                            Message::Prediction(self.prediction.clone())
                        }
                    }
                    Ok(Message::GetPerfReport) => Message::PerfReport(self.report),
                    _ => continue,
                };

                let frame = Bytes::from(reply.to_raw());
                self.socket.send_to(&frame, from).await.expect("mock send");
            }
        })
    }
}

/// Run a full session against the mock device and return its stdout capture
/// together with the request kinds the device saw.
pub async fn run_session(
    device: MockDevice,
    dataset: &str,
    csv: &str,
) -> (Result<(), Error>, String, Vec<PacketKind>) {
    let port = device.port();
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let server = device.spawn(seen.clone());

    let transport = Transport::bind_udp(0, port).await.expect("bind host transport");
    let path = write_dataset(dataset, csv);
    let source = CsvSource::open(&path).expect("open dataset");
    let mut session = Session::new(transport, source, quick_config(), Vec::new());

    let result = session.run().await;
    server.abort();

    let stdout = String::from_utf8(session.output().clone()).expect("utf-8 output");
    let requests = seen.lock().expect("seen lock").clone();
    (result, stdout, requests)
}
