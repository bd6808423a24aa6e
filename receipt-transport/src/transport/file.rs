//! File and device-node transport.
//!
//! Writes the job to a path: a character device such as `/dev/usb/lp0`, a
//! named pipe, or an ordinary file for capture.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{ExecuteMode, Transport, TransportKind};
use crate::error::{Error, Result};

/// Transport that writes to a filesystem path.
pub struct FileTransport {
    path: PathBuf,
}

impl FileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for FileTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::File
    }

    async fn is_connected(&self) -> bool {
        if fs::try_exists(&self.path).await.unwrap_or(false) {
            return true;
        }
        // A file that does not exist yet is fine as long as it can be created.
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::try_exists(parent).await.unwrap_or(false)
            }
            _ => true,
        }
    }

    async fn execute(&self, data: &[u8], mode: ExecuteMode) -> Result<Option<Bytes>> {
        if mode == ExecuteMode::WaitForResponse {
            return Err(Error::ResponseUnsupported(TransportKind::File));
        }
        let mut file = fs::File::create(&self.path).await?;
        file.write_all(data).await.map_err(Error::Write)?;
        file.flush().await.map_err(Error::Write)?;
        Ok(None)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
