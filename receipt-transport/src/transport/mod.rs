//! Physical transport layer for printer connections.
//!
//! This module handles low-level connections to receipt printers: serial
//! ports, raw TCP sockets, OS printer queues, and plain files or device
//! nodes. Every variant implements [`Transport`], so callers can send bytes
//! without knowing which one they were handed. The [`resolver`] turns a
//! destination string into the right variant.

use async_trait::async_trait;
use bytes::Bytes;
use strum::Display;

use crate::error::Result;

pub mod file;
pub mod network;
pub mod printer;
pub mod resolver;
pub mod serial;

pub use file::FileTransport;
pub use network::NetworkTransport;
pub use printer::{LpSpooler, PrinterTransport, SpoolerDriver};
pub use resolver::{resolve, Destination, Endpoint};
pub use serial::SerialTransport;

/// Which kind of channel a transport drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransportKind {
    Network,
    Printer,
    Serial,
    File,
}

/// What `execute` waits for after sending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecuteMode {
    /// Resolve once the channel has accepted the bytes.
    #[default]
    WriteOnly,
    /// Resolve with the first chunk of data the printer sends back.
    WaitForResponse,
}

/// Capability contract shared by all transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Which kind of channel this is.
    fn kind(&self) -> TransportKind;

    /// Probe whether the printer is reachable. Never fails; any error
    /// reads as `false`.
    async fn is_connected(&self) -> bool;

    /// Send `data` to the printer.
    ///
    /// Returns `None` in [`ExecuteMode::WriteOnly`] and the first inbound
    /// chunk in [`ExecuteMode::WaitForResponse`].
    async fn execute(&self, data: &[u8], mode: ExecuteMode) -> Result<Option<Bytes>>;

    /// Release any held connection. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}
