//! OS printer-queue transport.
//!
//! Jobs go to a named queue through a [`SpoolerDriver`], which the caller
//! supplies as driver context. [`LpSpooler`] talks to CUPS through the `lp`
//! and `lpstat` commands.

use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ExecuteMode, Transport, TransportKind};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Access to the operating system's print spooler.
#[async_trait]
pub trait SpoolerDriver: Send + Sync {
    /// Whether the queue exists and accepts jobs.
    async fn is_available(&self, queue: &str) -> Result<bool>;

    /// Submit `data` to `queue` as a raw job, passing `options` through to
    /// the spooler.
    async fn print_raw(&self, queue: &str, options: Option<&str>, data: &[u8]) -> Result<()>;
}

/// Transport to a named printer queue.
pub struct PrinterTransport {
    name: String,
    options: Option<String>,
    driver: Option<Arc<dyn SpoolerDriver>>,
}

impl PrinterTransport {
    pub fn new(
        name: impl Into<String>,
        options: Option<String>,
        driver: Option<Arc<dyn SpoolerDriver>>,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            driver,
        }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spooler options from the descriptor, if any.
    pub fn queue_options(&self) -> Option<&str> {
        self.options.as_deref()
    }

    fn driver(&self) -> Result<&Arc<dyn SpoolerDriver>> {
        self.driver.as_ref().ok_or_else(|| {
            Error::Spooler(format!("no spooler driver available for queue {}", self.name))
        })
    }
}

#[async_trait]
impl Transport for PrinterTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Printer
    }

    async fn is_connected(&self) -> bool {
        let Ok(driver) = self.driver() else {
            return false;
        };
        match driver.is_available(&self.name).await {
            Ok(available) => available,
            Err(e) => {
                debug!(queue = %self.name, error = %e, "Spooler query failed.");
                false
            }
        }
    }

    async fn execute(&self, data: &[u8], mode: ExecuteMode) -> Result<Option<Bytes>> {
        if mode == ExecuteMode::WaitForResponse {
            return Err(Error::ResponseUnsupported(TransportKind::Printer));
        }
        self.driver()?
            .print_raw(&self.name, self.options.as_deref(), data)
            .await?;
        Ok(None)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// CUPS spooler driven through the `lp` and `lpstat` commands.
#[derive(Debug, Clone)]
pub struct LpSpooler {
    lp: String,
    lpstat: String,
}

impl Default for LpSpooler {
    fn default() -> Self {
        Self {
            lp: "lp".to_string(),
            lpstat: "lpstat".to_string(),
        }
    }
}

impl LpSpooler {
    /// Use alternative `lp` and `lpstat` executables.
    pub fn with_commands(lp: impl Into<String>, lpstat: impl Into<String>) -> Self {
        Self {
            lp: lp.into(),
            lpstat: lpstat.into(),
        }
    }
}

#[async_trait]
impl SpoolerDriver for LpSpooler {
    async fn is_available(&self, queue: &str) -> Result<bool> {
        let output = Command::new(&self.lpstat)
            .args(["-p", queue])
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(output.status.success())
    }

    async fn print_raw(&self, queue: &str, options: Option<&str>, data: &[u8]) -> Result<()> {
        let mut command = Command::new(&self.lp);
        command.args(["-d", queue, "-o", "raw"]);
        if let Some(options) = options.filter(|o| !o.is_empty()) {
            command.args(["-o", options]);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // If lp hung up early its exit status says why.
            if let Err(e) = stdin.write_all(data).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
            // Dropping stdin closes the pipe so lp sees end of job.
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::Spooler(format!(
                "{} exited with {}: {}",
                self.lp,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(
            queue,
            bytes = data.len(),
            job = %String::from_utf8_lossy(&output.stdout).trim(),
            "Job submitted."
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSpooler {
        jobs: Mutex<Vec<(String, Option<String>, Vec<u8>)>>,
        offline: bool,
    }

    #[async_trait]
    impl SpoolerDriver for RecordingSpooler {
        async fn is_available(&self, _queue: &str) -> Result<bool> {
            if self.offline {
                return Err(Error::Spooler("spooler not running".to_string()));
            }
            Ok(true)
        }

        async fn print_raw(&self, queue: &str, options: Option<&str>, data: &[u8]) -> Result<()> {
            self.jobs
                .lock()
                .push((queue.to_string(), options.map(str::to_string), data.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn submits_raw_job_with_options() {
        let spooler = Arc::new(RecordingSpooler::default());
        let printer = PrinterTransport::new(
            "receipts",
            Some("copies=2".to_string()),
            Some(spooler.clone() as Arc<dyn SpoolerDriver>),
        );

        assert!(printer.is_connected().await);
        let result = printer.execute(b"\x1b@", ExecuteMode::WriteOnly).await.unwrap();

        assert!(result.is_none());
        assert_eq!(
            spooler.jobs.lock().as_slice(),
            &[(
                "receipts".to_string(),
                Some("copies=2".to_string()),
                b"\x1b@".to_vec()
            )]
        );
    }

    #[tokio::test]
    async fn no_driver_means_offline() {
        let printer = PrinterTransport::new("receipts", None, None);

        assert!(!printer.is_connected().await);
        assert!(matches!(
            printer.execute(b"x", ExecuteMode::WriteOnly).await,
            Err(Error::Spooler(_))
        ));
        printer.close().await.unwrap();
    }

    #[tokio::test]
    async fn spooler_failure_reads_as_disconnected() {
        let spooler = Arc::new(RecordingSpooler {
            offline: true,
            ..Default::default()
        });
        let printer = PrinterTransport::new("receipts", None, Some(spooler));
        assert!(!printer.is_connected().await);
    }

    #[tokio::test]
    async fn responses_are_unsupported() {
        let spooler = Arc::new(RecordingSpooler::default());
        let printer = PrinterTransport::new("receipts", None, Some(spooler.clone()));

        assert!(matches!(
            printer.execute(b"x", ExecuteMode::WaitForResponse).await,
            Err(Error::ResponseUnsupported(TransportKind::Printer))
        ));
        assert!(spooler.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn lp_spooler_without_binaries_reports_errors() {
        let spooler = LpSpooler::with_commands(
            "/nonexistent/receipt-transport-lp",
            "/nonexistent/receipt-transport-lpstat",
        );
        assert!(spooler.is_available("receipts").await.is_err());
        assert!(matches!(
            spooler.print_raw("receipts", None, b"x").await,
            Err(Error::Io(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lp_spooler_reports_failed_job() {
        let spooler = LpSpooler::with_commands("false", "false");
        assert!(!spooler.is_available("receipts").await.unwrap());
        assert!(matches!(
            spooler.print_raw("receipts", None, b"x").await,
            Err(Error::Spooler(_))
        ));
    }
}
