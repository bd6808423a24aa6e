//! Transports for receipt and label printers.
//!
//! A destination descriptor such as `tcp://10.0.0.7:9100`,
//! `printer:receipts`, `COM3`, or `/dev/usb/lp0` resolves to a
//! [`Transport`](transport::Transport) that can probe the printer, send it
//! bytes, and optionally read back its first reply.
//!
//! ```rust,no_run
//! use receipt_transport::config::TransportOptions;
//! use receipt_transport::transport::{resolve, ExecuteMode};
//!
//! # async fn example() -> receipt_transport::error::Result<()> {
//! let printer = resolve("COM3", TransportOptions::default(), None);
//! if printer.is_connected().await {
//!     printer.execute(b"\x1b@Hello\n", ExecuteMode::WriteOnly).await?;
//! }
//! printer.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod tracing;
pub mod transport;
