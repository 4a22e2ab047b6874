//! The conversation driver.
//!
//! One session walks the device through model discovery, dataset
//! announcement, sample streaming, and the final performance report, then
//! shuts down. Each request gets a bounded answer window; silence is
//! retried up to the configured budget and anything past that is fatal.

use crate::constants::MAX_FRAME_SIZE;
use crate::dataset::CsvSource;
use crate::error::Error;
use crate::format;
use crate::message::{DatasetInfo, Message, ModelInfo, PerformanceReport, TaskType};
use crate::packet::{PacketKind, RawPacket};
use crate::parser::FrameParser;
use crate::transport::Transport;
use bytes::Bytes;
use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;
use strum_macros::Display;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

/// Step of the device conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    #[strum(to_string = "GET_MODEL_INFO")]
    GetModelInfo,
    #[strum(to_string = "SEND_DATASET_INFO")]
    SendDatasetInfo,
    #[strum(to_string = "SEND_SAMPLES")]
    SendSamples,
    #[strum(to_string = "GET_PERFORMANCE_COUNTERS")]
    GetPerf,
    #[strum(to_string = "SHUTDOWN")]
    Shutdown,
}

/// Pacing knobs for the conversation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay before the first request goes out.
    pub pause: Duration,
    /// Answer window per request.
    pub response_timeout: Duration,
    /// Delay before the next attempt after the device reports an error.
    pub error_retry_delay: Duration,
    /// Additional attempts per state (per sample while streaming).
    pub max_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pause: Duration::ZERO,
            response_timeout: Duration::from_millis(2000),
            error_retry_delay: Duration::from_millis(1000),
            max_retries: 3,
        }
    }
}

/// Outcome of one answer window.
enum Wait {
    Answer(RawPacket),
    TimedOut,
}

/// One end-to-end conversation with the device.
///
/// `W` is the sink for the prediction CSV; production code passes stdout,
/// tests pass a byte buffer.
pub struct Session<W> {
    transport: Transport,
    parser: FrameParser,
    pending: VecDeque<RawPacket>,
    dataset: CsvSource,
    config: SessionConfig,
    state: SessionState,
    columns_in_sample: u32,
    columns_in_result: u32,
    task_type: TaskType,
    sample: Vec<f32>,
    header_printed: bool,
    rx_buf: Vec<u8>,
    out: W,
}

impl<W: Write> Session<W> {
    /// The dataset's header must already be readable: its field count plus
    /// the trailing sentinel fixes the sample width for the whole session.
    pub fn new(transport: Transport, dataset: CsvSource, config: SessionConfig, out: W) -> Self {
        let columns_in_sample = dataset.columns() as u32 + 1;
        Self {
            transport,
            parser: FrameParser::new(),
            pending: VecDeque::new(),
            dataset,
            config,
            state: SessionState::GetModelInfo,
            columns_in_sample,
            columns_in_result: 0,
            task_type: TaskType::BinaryClassification,
            sample: vec![0.0; columns_in_sample as usize],
            header_printed: false,
            rx_buf: vec![0u8; MAX_FRAME_SIZE],
            out,
        }
    }

    /// Drive the conversation to completion.
    pub async fn run(&mut self) -> Result<(), Error> {
        if !self.config.pause.is_zero() {
            debug!(delay_ms = self.config.pause.as_millis() as u64, "pausing before first request");
        }
        sleep(self.config.pause).await;

        loop {
            match self.state {
                SessionState::GetModelInfo => self.get_model_info().await?,
                SessionState::SendDatasetInfo => self.send_dataset_info().await?,
                SessionState::SendSamples => self.send_samples().await?,
                SessionState::GetPerf => self.get_perf_report().await?,
                SessionState::Shutdown => {
                    debug!("session complete");
                    return Ok(());
                }
            }
        }
    }

    /// Borrow the prediction sink (tests inspect the captured output).
    pub fn output(&self) -> &W {
        &self.out
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    async fn get_model_info(&mut self) -> Result<(), Error> {
        info!(">> Request model info");
        let reply = self
            .request(Message::GetModelInfo, PacketKind::ModelInfo, size_of::<ModelInfo>())
            .await?;
        let Message::ModelInfo(model) = Message::try_from(reply)? else {
            return Err(Error::Protocol("model info answer did not decode".to_string()));
        };

        self.task_type = model.task();
        self.columns_in_result = model.columns_count.get();
        info!(
            task_type = ?self.task_type,
            result_columns = self.columns_in_result,
            "Model info received"
        );

        if self.columns_in_result == 0 {
            return Err(Error::NoResultColumns);
        }
        self.transition(SessionState::SendDatasetInfo);
        Ok(())
    }

    async fn send_dataset_info(&mut self) -> Result<(), Error> {
        info!(columns_in_sample = self.columns_in_sample, ">> Send dataset info");
        let message = Message::DatasetInfo(DatasetInfo::new(self.columns_in_sample));
        self.request(message, PacketKind::DatasetInfo, 0).await?;
        self.transition(SessionState::SendSamples);
        Ok(())
    }

    async fn send_samples(&mut self) -> Result<(), Error> {
        if !self.load_next_sample()? {
            return Err(Error::EmptyDataset);
        }

        let min_payload = self.columns_in_result as usize * size_of::<f32>();
        loop {
            let reply = self
                .request(
                    Message::Sample(self.sample.clone()),
                    PacketKind::DatasetSample,
                    min_payload,
                )
                .await?;
            let Message::Prediction(mut results) = Message::try_from(reply)? else {
                return Err(Error::Protocol("sample answer did not decode".to_string()));
            };
            results.truncate(self.columns_in_result as usize);
            self.print_prediction(&results)?;

            if !self.load_next_sample()? {
                eprintln!("================");
                self.transition(SessionState::GetPerf);
                return Ok(());
            }
        }
    }

    async fn get_perf_report(&mut self) -> Result<(), Error> {
        info!(">> Request performance report");
        let reply = self
            .request(
                Message::GetPerfReport,
                PacketKind::PerfReport,
                size_of::<PerformanceReport>(),
            )
            .await?;
        let Message::PerfReport(report) = Message::try_from(reply)? else {
            return Err(Error::Protocol("performance report answer did not decode".to_string()));
        };
        eprintln!("{report}");
        self.transition(SessionState::Shutdown);
        Ok(())
    }

    /// Refill the sample buffer from the next CSV row. The trailing slot is
    /// always the `1.0` sentinel the device expects.
    fn load_next_sample(&mut self) -> Result<bool, Error> {
        let Some(row) = self.dataset.next_row()? else {
            return Ok(false);
        };
        let width = row.len();
        self.sample[..width].copy_from_slice(&row);
        self.sample[width] = 1.0;
        Ok(true)
    }

    fn print_prediction(&mut self, results: &[f32]) -> Result<(), Error> {
        if !self.header_printed {
            self.header_printed = true;
            writeln!(
                self.out,
                "{}",
                format::header_line(self.task_type, self.columns_in_result as usize)
            )?;
        }
        writeln!(self.out, "{}", format::prediction_line(self.task_type, results))?;
        Ok(())
    }

    /// Send `message` and wait for a matching answer, retrying on silence.
    /// At most `max_retries + 1` requests leave the host before the state
    /// is declared dead.
    async fn request(
        &mut self,
        message: Message,
        expect: PacketKind,
        min_payload: usize,
    ) -> Result<RawPacket, Error> {
        let frame = Bytes::from(message.to_raw());
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!(state = %self.state, attempt, "no answer yet, retrying");
            }
            self.transport.send(&frame).await?;
            match self.await_answer(expect, min_payload).await? {
                Wait::Answer(packet) => return Ok(packet),
                Wait::TimedOut => continue,
            }
        }

        warn!(state = %self.state, "timeout waiting for device");
        Err(Error::RetriesExhausted {
            state: self.state,
            attempts: self.config.max_retries + 1,
        })
    }

    /// Wait for an answer of kind `expect` with at least `min_payload`
    /// bytes. Non-answers, foreign kinds, and short payloads are ignored;
    /// an ERROR-kind answer closes the window early so the caller retries
    /// after the configured delay.
    async fn await_answer(&mut self, expect: PacketKind, min_payload: usize) -> Result<Wait, Error> {
        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            while let Some(packet) = self.pending.pop_front() {
                if !packet.answer {
                    debug!(kind = ?packet.kind, "ignoring non-answer packet");
                    continue;
                }
                if packet.kind == PacketKind::Error {
                    warn!(code = %packet.error, state = %self.state, "device reported an error");
                    sleep(self.config.error_retry_delay).await;
                    return Ok(Wait::TimedOut);
                }
                if packet.kind != expect {
                    debug!(kind = ?packet.kind, expected = ?expect, "ignoring unexpected answer");
                    continue;
                }
                if packet.payload.len() < min_payload {
                    warn!(
                        got = packet.payload.len(),
                        expected = min_payload,
                        "answer payload too short, ignoring"
                    );
                    continue;
                }
                return Ok(Wait::Answer(packet));
            }

            let now = Instant::now();
            let Some(remaining) = deadline.checked_duration_since(now) else {
                return Ok(Wait::TimedOut);
            };
            let received = match timeout(remaining, self.transport.recv(&mut self.rx_buf)).await {
                Ok(result) => result?,
                Err(_) => return Ok(Wait::TimedOut),
            };
            for i in 0..received {
                if let Some(packet) = self.parser.push(self.rx_buf[i]) {
                    self.pending.push_back(packet);
                }
            }
        }
    }
}
