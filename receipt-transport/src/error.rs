//! Common error types for receipt-transport.
//!
//! This module provides a centralized Error enum using thiserror. The serial
//! variants mirror the lifecycle of a link: it can fail to open, time out,
//! reject a write, or fault while an exchange is pending.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportKind;

/// Main error type for transport operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The device could not be opened (missing, permission denied, busy).
    /// The half-constructed handle has been discarded.
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    /// No write acknowledgement or response arrived in time. The link is
    /// kept and may be reused.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The channel rejected the write.
    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    /// The channel reported a fault while an exchange was pending.
    #[error("Channel error: {0}")]
    Channel(#[source] io::Error),

    /// I/O errors from sockets and files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Printer spooler errors
    #[error("Spooler error: {0}")]
    Spooler(String),

    /// The transport has no way to read a response back.
    #[error("{0} transport cannot wait for a response")]
    ResponseUnsupported(TransportKind),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
