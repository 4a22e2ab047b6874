use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use inferlink_lib::{BaudRate, CsvSource, Session, SessionConfig, Transport};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Stream a CSV dataset to a remote inference device and print its
/// predictions on stdout.
#[derive(Parser, Debug)]
#[command(name = "inferlink", version, about, long_about = None)]
struct Args {
    /// Transport used to reach the device.
    #[arg(long, value_enum)]
    interface: Interface,

    /// CSV dataset with a header row.
    #[arg(long)]
    dataset: PathBuf,

    /// Local UDP port to bind (udp interface).
    #[arg(long, default_value_t = 50000)]
    listen_port: u16,

    /// UDP port the device listens on (udp interface).
    #[arg(long, default_value_t = 50005)]
    send_port: u16,

    /// Serial device path (serial interface).
    #[arg(long)]
    serial_port: Option<PathBuf>,

    /// Serial baud rate: 9600, 115200 or 230400.
    #[arg(long, default_value_t = 230_400)]
    baud_rate: u32,

    /// Delay in milliseconds before the first request.
    #[arg(long, default_value_t = 0)]
    pause: u64,

    /// Verbose logging (show wire traffic).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Interface {
    Udp,
    Serial,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "trace" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let transport = match args.interface {
        Interface::Udp => Transport::bind_udp(args.listen_port, args.send_port)
            .await
            .context("failed to set up UDP transport")?,
        Interface::Serial => {
            let Some(path) = &args.serial_port else {
                bail!("--serial-port is required with --interface=serial");
            };
            let path = path.to_str().context("serial port path is not valid UTF-8")?;
            let baud = BaudRate::try_from(args.baud_rate)?;
            Transport::open_serial(path, baud)
                .with_context(|| format!("failed to open serial port {path}"))?
        }
    };

    let dataset = CsvSource::open(&args.dataset)
        .with_context(|| format!("failed to open dataset {}", args.dataset.display()))?;

    let config = SessionConfig {
        pause: Duration::from_millis(args.pause),
        ..SessionConfig::default()
    };

    let mut session = Session::new(transport, dataset, config, io::stdout());
    session.run().await.context("session failed")?;

    Ok(())
}
