//! UDP and serial transports behind one async surface.
//!
//! Modeled as a sum type with uniform send/receive, so the session never
//! cares which wire it is talking over. UDP carries one frame per
//! datagram; serial is a raw 8N1 byte stream that the frame parser
//! re-segments.

use crate::error::Error;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UdpSocket;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, trace};

/// Baud rates the device side supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    B9600 = 9600,
    B115200 = 115_200,
    B230400 = 230_400,
}

impl BaudRate {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Error> {
        match value {
            9600 => Ok(BaudRate::B9600),
            115_200 => Ok(BaudRate::B115200),
            230_400 => Ok(BaudRate::B230400),
            other => Err(Error::UnsupportedBaud(other)),
        }
    }
}

/// Connection to the device over UDP loopback/LAN or a serial line.
pub enum Transport {
    Udp { socket: UdpSocket, peer: SocketAddr },
    Serial { port: SerialStream },
}

impl Transport {
    /// Bind an IPv4 loopback socket and aim at the device's port.
    pub async fn bind_udp(listen_port: u16, send_port: u16) -> Result<Self, Error> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, listen_port)).await?;
        let peer = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, send_port));
        debug!(local = %socket.local_addr()?, %peer, "udp transport ready");
        Ok(Transport::Udp { socket, peer })
    }

    /// Open the serial device in raw 8N1 mode at the configured baud rate.
    pub fn open_serial(path: &str, baud: BaudRate) -> Result<Self, Error> {
        let port = tokio_serial::new(path, baud.as_u32())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()?;
        debug!(path, baud = baud.as_u32(), "serial transport ready");
        Ok(Transport::Serial { port })
    }

    /// Transmit one framed packet as a single write.
    pub async fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        trace!("TX [{} bytes]: {:02x?}", frame.len(), frame);
        match self {
            Transport::Udp { socket, peer } => {
                socket.send_to(frame, *peer).await?;
            }
            Transport::Serial { port } => {
                port.write_all(frame).await?;
                port.flush().await?;
            }
        }
        Ok(())
    }

    /// Receive the next chunk of raw bytes (one datagram for UDP).
    pub async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let received = match self {
            Transport::Udp { socket, .. } => socket.recv_from(buf).await?.0,
            Transport::Serial { port } => port.read(buf).await?,
        };
        trace!("RX [{} bytes]: {:02x?}", received, &buf[..received]);
        Ok(received)
    }
}
