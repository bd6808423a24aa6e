//! Raw TCP transport (JetDirect / port 9100 style).
//!
//! Each exchange uses its own connection: connect, write, optionally read the
//! first reply chunk, shut down. Nothing is held between calls.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use super::{ExecuteMode, Transport, TransportKind};
use crate::config::TransportOptions;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Port used by raw-printing network printers when none is given.
pub const DEFAULT_PORT: u16 = 9100;

const READ_CHUNK: usize = 4096;

/// Transport to a printer listening on a TCP port.
pub struct NetworkTransport {
    host: String,
    port: u16,
    options: TransportOptions,
}

impl NetworkTransport {
    pub fn new(host: impl Into<String>, port: Option<u16>, options: TransportOptions) -> Self {
        Self {
            host: host.into(),
            port: port.unwrap_or(DEFAULT_PORT),
            options,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn exchange(&self, data: &[u8], mode: ExecuteMode) -> Result<Option<Bytes>> {
        let mut stream = self.connect().await?;
        stream.write_all(data).await.map_err(Error::Write)?;
        stream.flush().await.map_err(Error::Write)?;
        if self.options.debug {
            debug!(host = %self.host, port = self.port, bytes = data.len(), "Data sent.");
        }

        let response = match mode {
            ExecuteMode::WriteOnly => None,
            ExecuteMode::WaitForResponse => {
                let mut buf = BytesMut::with_capacity(READ_CHUNK);
                let n = stream.read_buf(&mut buf).await.map_err(Error::Channel)?;
                if n == 0 {
                    return Err(Error::Channel(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "printer closed the connection",
                    )));
                }
                Some(buf.freeze())
            }
        };

        // The printer may already have hung up; that is not a failed print.
        if let Err(e) = stream.shutdown().await {
            trace!(host = %self.host, error = %e, "Shutdown after exchange failed.");
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    async fn is_connected(&self) -> bool {
        match time::timeout(self.options.timeout(), self.connect()).await {
            Ok(Ok(mut stream)) => {
                let _ = stream.shutdown().await;
                true
            }
            Ok(Err(e)) => {
                if self.options.debug {
                    debug!(host = %self.host, port = self.port, error = %e, "Printer not reachable.");
                }
                false
            }
            Err(_) => false,
        }
    }

    async fn execute(&self, data: &[u8], mode: ExecuteMode) -> Result<Option<Bytes>> {
        let deadline = self.options.timeout();
        time::timeout(deadline, self.exchange(data, mode))
            .await
            .map_err(|_| Error::Timeout(deadline))?
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
