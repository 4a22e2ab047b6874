pub mod checksum;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod format;
pub mod message;
pub mod packet;
pub mod parser;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use dataset::CsvSource;
pub use error::Error;
pub use message::{DatasetInfo, Message, ModelInfo, PerformanceReport, TaskType};
pub use packet::{ErrorCode, PacketKind, RawPacket};
pub use parser::FrameParser;
pub use session::{Session, SessionConfig, SessionState};
pub use transport::{BaudRate, Transport};
