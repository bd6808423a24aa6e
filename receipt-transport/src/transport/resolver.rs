//! Destination resolution.
//!
//! A destination is either a transport the caller already built or a
//! descriptor string. Descriptors are classified case-insensitively, first
//! match wins:
//!
//! | Shape                      | Transport |
//! |----------------------------|-----------|
//! | `tcp://host[:port][/]`     | Network   |
//! | `printer:name[/options]`   | Printer   |
//! | `COM<n>`                   | Serial    |
//! | anything else              | File      |
//!
//! Resolution never fails; an unrecognized string is a file path.

use regex::Regex;
use std::sync::{Arc, LazyLock};

use super::{
    FileTransport, NetworkTransport, PrinterTransport, SerialTransport, SpoolerDriver, Transport,
};
use crate::config::TransportOptions;

static NETWORK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^tcp://([^/:]+)(?::(\d+))?/?$").expect("invalid network pattern")
});

static PRINTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^printer:([^/]+)(?:/(.*))?$").expect("invalid printer pattern")
});

static SERIAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^COM\d+$").expect("invalid serial pattern"));

/// Where to send printer data.
pub enum Destination {
    /// A ready-made transport, used as is.
    Transport(Arc<dyn Transport>),
    /// A descriptor string to classify.
    Descriptor(String),
}

impl From<Arc<dyn Transport>> for Destination {
    fn from(transport: Arc<dyn Transport>) -> Self {
        Destination::Transport(transport)
    }
}

impl From<String> for Destination {
    fn from(descriptor: String) -> Self {
        Destination::Descriptor(descriptor)
    }
}

impl From<&str> for Destination {
    fn from(descriptor: &str) -> Self {
        Destination::Descriptor(descriptor.to_string())
    }
}

/// A classified descriptor string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Network { host: String, port: Option<u16> },
    Printer { name: String, options: Option<String> },
    Serial { path: String },
    File { path: String },
}

impl Endpoint {
    /// Classify a descriptor string.
    pub fn parse(descriptor: &str) -> Self {
        if let Some(caps) = NETWORK_PATTERN.captures(descriptor) {
            let port = caps.get(2).map(|m| m.as_str().parse::<u16>());
            // A port outside 0-65535 is not a network address; keep looking.
            if !matches!(port, Some(Err(_))) {
                return Endpoint::Network {
                    host: caps[1].to_string(),
                    port: port.and_then(|p| p.ok()),
                };
            }
        }

        if let Some(caps) = PRINTER_PATTERN.captures(descriptor) {
            return Endpoint::Printer {
                name: caps[1].to_string(),
                options: caps.get(2).map(|m| m.as_str().to_string()),
            };
        }

        if SERIAL_PATTERN.is_match(descriptor) {
            return Endpoint::Serial {
                path: descriptor.to_string(),
            };
        }

        Endpoint::File {
            path: descriptor.to_string(),
        }
    }

    /// Build the transport for this endpoint.
    pub fn into_transport(
        self,
        options: TransportOptions,
        driver: Option<Arc<dyn SpoolerDriver>>,
    ) -> Arc<dyn Transport> {
        match self {
            Endpoint::Network { host, port } => Arc::new(NetworkTransport::new(host, port, options)),
            Endpoint::Printer { name, options } => {
                Arc::new(PrinterTransport::new(name, options, driver))
            }
            Endpoint::Serial { path } => Arc::new(SerialTransport::new(path, options)),
            Endpoint::File { path } => Arc::new(FileTransport::new(path)),
        }
    }
}

/// Turn a destination into a transport.
///
/// `driver` is the spooler used by `printer:` destinations; other kinds
/// ignore it.
pub fn resolve(
    destination: impl Into<Destination>,
    options: TransportOptions,
    driver: Option<Arc<dyn SpoolerDriver>>,
) -> Arc<dyn Transport> {
    match destination.into() {
        Destination::Transport(transport) => transport,
        Destination::Descriptor(descriptor) => {
            Endpoint::parse(&descriptor).into_transport(options, driver)
        }
    }
}
