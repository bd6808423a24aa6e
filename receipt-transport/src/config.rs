//! Transport options.
//!
//! Options arrive as a loose mapping (`{ "timeout": 500, "baudRate": 9600 }`)
//! and are merged over the defaults below. Every key is optional.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};

use crate::error::{Error, Result};

/// Default deadline for one write/response exchange, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Default serial line speed.
///
/// Some older printer setups run at 9600; those must set `baudRate`
/// explicitly.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Parity checking on a serial line.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Options shared by every transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportOptions {
    /// Emit diagnostic traces for opens and exchanges
    pub debug: bool,

    /// Write/response deadline in milliseconds
    pub timeout: u64,

    /// Serial line speed
    pub baud_rate: u32,

    /// Serial character size (5-8)
    pub data_bits: u8,

    /// Serial stop bits (1 or 2)
    pub stop_bits: u8,

    /// Serial parity
    pub parity: Parity,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            debug: false,
            timeout: DEFAULT_TIMEOUT_MS,
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
        }
    }
}

impl TransportOptions {
    /// Parse options from a JSON object, filling in defaults for missing keys.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid transport options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Check that the serial parameters describe a real line discipline.
    pub fn validate(&self) -> Result<()> {
        if !(5..=8).contains(&self.data_bits) {
            return Err(Error::Config(format!(
                "dataBits must be between 5 and 8, got {}",
                self.data_bits
            )));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(Error::Config(format!(
                "stopBits must be 1 or 2, got {}",
                self.stop_bits
            )));
        }
        if self.baud_rate == 0 {
            return Err(Error::Config("baudRate must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// The exchange deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}
