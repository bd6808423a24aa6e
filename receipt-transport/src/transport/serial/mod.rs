//! Serial printer transport.
//!
//! A [`SerialTransport`] owns at most one open link to its device. The link
//! is opened lazily by the first `execute` or `is_connected`, reused while it
//! stays open, and reopened if the device dropped it. Concurrent callers that
//! find an open already in flight wait for it instead of opening the device a
//! second time.
//!
//! ```text
//!   Closed ──acquire──► Opening ──ok──► Open ──close / device gone──► Closed
//!                          │
//!                          └──err──► Closed
//! ```
//!
//! Each `execute` is one write (and optionally one read) under a single
//! deadline. A timed-out exchange leaves the link open for the next call.
//! Only data arriving after the write answers it; anything already buffered,
//! such as a late reply to a timed-out request, is dropped first.
//! Overlapping `execute` calls on the same transport are not serialized; a
//! response may be picked up by whichever call reads first.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use super::{ExecuteMode, Transport, TransportKind};
use crate::config::TransportOptions;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

mod link;

pub use link::{LinkSettings, SerialDriver, SerialLink, TokioSerialDriver, TokioSerialLink};

/// How long a caller waits before re-checking an open started by someone else.
const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(50);

enum PortState<L> {
    Closed,
    Opening,
    Open(Arc<L>),
}

/// Transport over a serial port.
pub struct SerialTransport<D: SerialDriver = TokioSerialDriver> {
    path: String,
    options: TransportOptions,
    driver: D,
    state: Mutex<PortState<D::Link>>,
}

impl SerialTransport {
    /// Create a transport for the serial device at `path`. Nothing is opened
    /// until first use.
    pub fn new(path: impl Into<String>, options: TransportOptions) -> Self {
        Self::with_driver(path, options, TokioSerialDriver)
    }
}

impl<D: SerialDriver> SerialTransport<D> {
    /// Create a transport that opens its device through `driver`.
    pub fn with_driver(path: impl Into<String>, options: TransportOptions, driver: D) -> Self {
        Self {
            path: path.into(),
            options,
            driver,
            state: Mutex::new(PortState::Closed),
        }
    }

    /// Device path this transport opens.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Return the open link, opening the device if needed.
    async fn acquire(&self) -> Result<Arc<D::Link>> {
        let settings = LinkSettings::try_from(&self.options)?;

        loop {
            let must_wait = {
                let mut state = self.state.lock();
                match &*state {
                    PortState::Open(link) if link.is_open() => return Ok(Arc::clone(link)),
                    PortState::Opening => true,
                    PortState::Open(_) | PortState::Closed => {
                        *state = PortState::Opening;
                        false
                    }
                }
            };
            if !must_wait {
                break;
            }
            time::sleep(OPEN_RETRY_INTERVAL).await;
        }

        // If this future is dropped mid-open, the guard puts the state back to
        // Closed so later callers don't wait forever.
        let guard = OpeningGuard { state: &self.state };

        match self.driver.open(&self.path, &settings).await {
            Ok(link) => {
                let link = Arc::new(link);
                guard.finish(PortState::Open(Arc::clone(&link)));
                if self.options.debug {
                    debug!(path = %self.path, baud = settings.baud_rate, "Serial port opened.");
                }
                Ok(link)
            }
            Err(source) => {
                guard.finish(PortState::Closed);
                warn!(path = %self.path, error = %source, "Failed to open serial port.");
                Err(Error::Open {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}

struct OpeningGuard<'a, L> {
    state: &'a Mutex<PortState<L>>,
}

impl<L> OpeningGuard<'_, L> {
    fn finish(self, next: PortState<L>) {
        *self.state.lock() = next;
        std::mem::forget(self);
    }
}

impl<L> Drop for OpeningGuard<'_, L> {
    fn drop(&mut self) {
        *self.state.lock() = PortState::Closed;
    }
}

#[async_trait]
impl<D: SerialDriver> Transport for SerialTransport<D> {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    async fn is_connected(&self) -> bool {
        match self.acquire().await {
            Ok(link) => link.is_open(),
            Err(e) => {
                if self.options.debug {
                    debug!(path = %self.path, error = %e, "Serial port not connected.");
                }
                false
            }
        }
    }

    async fn execute(&self, data: &[u8], mode: ExecuteMode) -> Result<Option<Bytes>> {
        let link = self.acquire().await?;
        let deadline = self.options.timeout();

        let exchange = async {
            if mode == ExecuteMode::WaitForResponse {
                let stale = link.discard_pending().await.map_err(Error::Channel)?;
                if stale > 0 && self.options.debug {
                    debug!(path = %self.path, bytes = stale, "Dropped stale inbound data.");
                }
            }
            link.write(data).await.map_err(Error::Write)?;
            if self.options.debug {
                debug!(path = %self.path, bytes = data.len(), "Data sent.");
            }

            match mode {
                ExecuteMode::WriteOnly => Ok(None),
                ExecuteMode::WaitForResponse => match link.read().await {
                    Ok(Some(chunk)) => {
                        if self.options.debug {
                            debug!(path = %self.path, bytes = chunk.len(), "Response received.");
                        }
                        Ok(Some(chunk))
                    }
                    Ok(None) => Err(Error::Channel(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "serial stream closed",
                    ))),
                    Err(e) => Err(Error::Channel(e)),
                },
            }
        };

        match time::timeout(deadline, exchange).await {
            Ok(result) => result,
            Err(_) => {
                if self.options.debug {
                    debug!(path = %self.path, ?deadline, "Serial exchange timed out.");
                }
                Err(Error::Timeout(deadline))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        // An open in flight belongs to whoever started it; leave it alone.
        let previous = {
            let mut state = self.state.lock();
            if matches!(*state, PortState::Open(_)) {
                std::mem::replace(&mut *state, PortState::Closed)
            } else {
                PortState::Closed
            }
        };
        if let PortState::Open(link) = previous {
            if link.is_open() {
                link.close().await?;
                if self.options.debug {
                    debug!(path = %self.path, "Serial port closed.");
                }
            }
        }
        Ok(())
    }
}
