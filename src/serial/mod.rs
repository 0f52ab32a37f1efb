//! Serial transport layer
//!
//! Everything between a serial endpoint name and a byte stream that is ready
//! to carry RPC traffic lives here.
//!
//! # Components
//!
//! - [`Transport`] - Byte-stream contract the rest of the crate depends on
//! - [`SerialTransport`] - [`Transport`] over a `serialport` handle
//! - [`PortOpener`] / [`SerialPortOpener`] - Open a raw stream by endpoint name
//! - [`EndpointLocator`] - Find the device among enumerated endpoints
//! - [`SessionOpener`] - Perform the text handshake that starts an RPC session
//! - [`read_until`] - Multi-byte delimiter reader used by the handshake

pub mod locator;
pub mod reader;
pub mod session;

pub use locator::{
    EndpointIdentity, EndpointInfo, EndpointLocator, MultipleMatchPolicy, PortEnumerator,
    SystemPorts,
};
pub use reader::read_until;
pub use session::{SessionOpener, BOOT_PROMPT, START_RPC_SESSION};

use crate::error::Result;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// A bidirectional byte stream to the device
///
/// Reads are expected to honour a finite timeout and report it as
/// [`io::ErrorKind::TimedOut`] so callers can interleave cancellation checks.
pub trait Transport: Read + Write + Send {
    /// Endpoint name this stream was opened on
    fn name(&self) -> &str;

    /// Independent handle onto the same underlying stream
    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").field("name", &self.name()).finish()
    }
}

/// Opens raw byte streams by endpoint name
pub trait PortOpener: Send + Sync {
    fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>>;
}

/// [`Transport`] backed by a real serial port
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn new(name: impl Into<String>, port: Box<dyn SerialPort>) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
        let port = self.port.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(SerialTransport::new(self.name.clone(), port)))
    }
}

/// Opens endpoints with the `serialport` crate using default 8N1 framing
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialPortOpener {
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
        }
    }
}

impl PortOpener for SerialPortOpener {
    fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        tracing::debug!(
            "Opening serial port {} at {} baud (read timeout {:?})",
            endpoint,
            self.baud_rate,
            self.read_timeout
        );
        let port = serialport::new(endpoint, self.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.read_timeout)
            .open()?;
        Ok(Box::new(SerialTransport::new(endpoint, port)))
    }
}
