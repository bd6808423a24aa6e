//! Serial channel driver seam.
//!
//! [`SerialDriver`] opens a device and hands back a [`SerialLink`], an open
//! byte channel with write, read-next-chunk, and close. The production pair is
//! built on tokio-serial; tests substitute their own.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, SinkExt};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_stream::StreamExt;
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};

use crate::config::{self, TransportOptions};
use crate::error::{Error, Result};

/// Line parameters handed to a driver when opening a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
}

impl TryFrom<&TransportOptions> for LinkSettings {
    type Error = Error;

    fn try_from(options: &TransportOptions) -> Result<Self> {
        options.validate()?;

        let data_bits = match options.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match options.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };
        let parity = match options.parity {
            config::Parity::None => tokio_serial::Parity::None,
            config::Parity::Odd => tokio_serial::Parity::Odd,
            config::Parity::Even => tokio_serial::Parity::Even,
        };

        Ok(Self {
            baud_rate: options.baud_rate,
            data_bits,
            stop_bits,
            parity,
        })
    }
}

/// An open serial channel.
#[async_trait]
pub trait SerialLink: Send + Sync + 'static {
    /// Whether the channel is still usable.
    fn is_open(&self) -> bool;

    /// Write all of `data` and flush it to the device.
    async fn write(&self, data: &[u8]) -> io::Result<()>;

    /// Wait for the next chunk of inbound data. `None` means the device went
    /// away.
    async fn read(&self) -> io::Result<Option<Bytes>>;

    /// Drop inbound data that has already arrived, without waiting for more.
    /// Returns the number of bytes dropped.
    async fn discard_pending(&self) -> io::Result<usize>;

    /// Close the channel.
    async fn close(&self) -> io::Result<()>;
}

/// Opens serial devices.
#[async_trait]
pub trait SerialDriver: Send + Sync + 'static {
    type Link: SerialLink;

    async fn open(&self, path: &str, settings: &LinkSettings) -> io::Result<Self::Link>;
}

/// Driver for real serial ports, via tokio-serial.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSerialDriver;

#[async_trait]
impl SerialDriver for TokioSerialDriver {
    type Link = TokioSerialLink;

    async fn open(&self, path: &str, settings: &LinkSettings) -> io::Result<TokioSerialLink> {
        let stream = tokio_serial::new(path, settings.baud_rate)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .parity(settings.parity)
            .open_native_async()
            .map_err(io::Error::from)?;

        Ok(TokioSerialLink::new(stream))
    }
}

/// A serial stream split into independently locked reader and writer halves.
pub struct TokioSerialLink {
    writer: Mutex<Option<FramedWrite<WriteHalf<SerialStream>, BytesCodec>>>,
    reader: Mutex<Option<FramedRead<ReadHalf<SerialStream>, BytesCodec>>>,
    open: AtomicBool,
}

impl TokioSerialLink {
    /// Wrap an already open serial stream.
    pub fn new(stream: SerialStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            writer: Mutex::new(Some(FramedWrite::new(writer, BytesCodec::new()))),
            reader: Mutex::new(Some(FramedRead::new(reader, BytesCodec::new()))),
            open: AtomicBool::new(true),
        }
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "serial link is closed")
}

#[async_trait]
impl SerialLink for TokioSerialLink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn write(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or_else(not_connected)?;
        writer.send(Bytes::copy_from_slice(data)).await
    }

    async fn read(&self) -> io::Result<Option<Bytes>> {
        let mut reader = self.reader.lock().await;
        let reader = reader.as_mut().ok_or_else(not_connected)?;
        match reader.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk.freeze())),
            Some(Err(e)) => Err(e),
            None => {
                self.open.store(false, Ordering::Release);
                Ok(None)
            }
        }
    }

    async fn discard_pending(&self) -> io::Result<usize> {
        let mut reader = self.reader.lock().await;
        let reader = reader.as_mut().ok_or_else(not_connected)?;
        let mut dropped = 0;
        while let Some(item) = reader.next().now_or_never() {
            match item {
                Some(Ok(chunk)) => dropped += chunk.len(),
                Some(Err(e)) => return Err(e),
                None => {
                    self.open.store(false, Ordering::Release);
                    break;
                }
            }
        }
        Ok(dropped)
    }

    async fn close(&self) -> io::Result<()> {
        self.open.store(false, Ordering::Release);
        let writer = self.writer.lock().await.take();
        let result = match writer {
            Some(mut writer) => SinkExt::<Bytes>::close(&mut writer).await,
            None => Ok(()),
        };
        // Dropping the read half releases the file descriptor.
        self.reader.lock().await.take();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_options_map_to_8n1() {
        let settings = LinkSettings::try_from(&TransportOptions::default()).unwrap();
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.data_bits, tokio_serial::DataBits::Eight);
        assert_eq!(settings.stop_bits, tokio_serial::StopBits::One);
        assert_eq!(settings.parity, tokio_serial::Parity::None);
    }

    #[test_case(5, tokio_serial::DataBits::Five)]
    #[test_case(6, tokio_serial::DataBits::Six)]
    #[test_case(7, tokio_serial::DataBits::Seven)]
    #[test_case(8, tokio_serial::DataBits::Eight)]
    fn data_bits_mapping(bits: u8, expected: tokio_serial::DataBits) {
        let options = TransportOptions {
            data_bits: bits,
            ..Default::default()
        };
        assert_eq!(LinkSettings::try_from(&options).unwrap().data_bits, expected);
    }

    #[test]
    fn seven_e_two() {
        let options = TransportOptions {
            data_bits: 7,
            stop_bits: 2,
            parity: config::Parity::Even,
            baud_rate: 9600,
            ..Default::default()
        };
        let settings = LinkSettings::try_from(&options).unwrap();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.stop_bits, tokio_serial::StopBits::Two);
        assert_eq!(settings.parity, tokio_serial::Parity::Even);
    }

    #[test]
    fn invalid_options_are_config_errors() {
        let options = TransportOptions {
            stop_bits: 0,
            ..Default::default()
        };
        assert!(matches!(
            LinkSettings::try_from(&options),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn opening_a_missing_device_fails() {
        let settings = LinkSettings::try_from(&TransportOptions::default()).unwrap();
        let result = TokioSerialDriver
            .open("/nonexistent/receipt-transport-tty", &settings)
            .await;
        assert!(result.is_err());
    }
}
