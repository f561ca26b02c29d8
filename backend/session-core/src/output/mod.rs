//! Shared append-only output log with bounded tail reads.
//!
//! Everything the bridge session prints lands in one file. Readers only ever
//! look at the last `max_bytes` of it: [`OutputChannel::tail`] seeks to the
//! suffix instead of reading the whole log, so read cost stays flat however
//! long the session runs.
//!
//! All operations on the file go through one async mutex, so a `tail` never
//! observes a half-written append or a half-applied `clear`.

pub mod poller;

pub use poller::{TailPoller, spawn_tail_poller};

use crate::error::output::OutputError;

use common::ErrorLocation;

use std::io::{ErrorKind, SeekFrom};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;
use tokio::fs::{File, OpenOptions, create_dir_all};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// Tail text together with the clear epoch it was read in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailSnapshot {
    /// Number of `clear()` calls that happened before this read.
    pub epoch: u64,
    pub text: String,
}

#[derive(Debug)]
pub struct OutputChannel {
    path: PathBuf,
    io_lock: Mutex<()>,
    epoch: AtomicU64,
}

impl OutputChannel {
    /// Channel backed by the file at `path`. Nothing is created until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current clear epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Append raw bytes to the end of the log.
    pub async fn append(&self, bytes: &[u8]) -> Result<(), OutputError> {
        if bytes.is_empty() {
            return Ok(());
        }

        let _guard = self.io_lock.lock().await;
        self.ensure_parent().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_failure(e))?;

        file.write_all(bytes).await.map_err(|e| self.write_failure(e))?;
        file.flush().await.map_err(|e| self.write_failure(e))?;

        trace!("Appended {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }

    /// Append a line of text, adding the trailing newline if missing.
    pub async fn append_line(&self, line: &str) -> Result<(), OutputError> {
        if line.ends_with('\n') {
            self.append(line.as_bytes()).await
        } else {
            self.append(format!("{line}\n").as_bytes()).await
        }
    }

    /// The last `min(max_bytes, len)` bytes of the log.
    ///
    /// A missing log yields an empty result.
    pub async fn tail(&self, max_bytes: usize) -> Result<Vec<u8>, OutputError> {
        let _guard = self.io_lock.lock().await;
        self.read_tail(max_bytes).await
    }

    /// [`tail`](Self::tail) decoded as text; invalid UTF-8 is replaced.
    pub async fn tail_text(&self, max_bytes: usize) -> Result<String, OutputError> {
        let bytes = self.tail(max_bytes).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Tail text and the epoch it belongs to, read atomically with respect to `clear`.
    pub async fn tail_snapshot(&self, max_bytes: usize) -> Result<TailSnapshot, OutputError> {
        let _guard = self.io_lock.lock().await;
        let epoch = self.epoch();
        let bytes = self.read_tail(max_bytes).await?;
        Ok(TailSnapshot {
            epoch,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    async fn read_tail(&self, max_bytes: usize) -> Result<Vec<u8>, OutputError> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.read_failure(e)),
        };

        let size = file
            .metadata()
            .await
            .map_err(|e| self.read_failure(e))?
            .len();
        let wanted = size.min(max_bytes as u64);

        if size > wanted {
            file.seek(SeekFrom::Start(size - wanted))
                .await
                .map_err(|e| self.read_failure(e))?;
        }

        let mut out = Vec::with_capacity(wanted as usize);
        file.take(wanted)
            .read_to_end(&mut out)
            .await
            .map_err(|e| self.read_failure(e))?;

        Ok(out)
    }

    /// Truncate the log to zero length.
    pub async fn clear(&self) -> Result<(), OutputError> {
        let _guard = self.io_lock.lock().await;
        self.ensure_parent().await?;

        File::create(&self.path)
            .await
            .map_err(|e| self.write_failure(e))?;
        self.epoch.fetch_add(1, Ordering::SeqCst);

        trace!("Cleared {}", self.path.display());
        Ok(())
    }

    async fn ensure_parent(&self) -> Result<(), OutputError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => create_dir_all(parent)
                .await
                .map_err(|e| self.write_failure(e)),
            _ => Ok(()),
        }
    }

    #[track_caller]
    fn read_failure(&self, source: std::io::Error) -> OutputError {
        OutputError::OutputReadFailure {
            path: self.path.clone(),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    }

    #[track_caller]
    fn write_failure(&self, source: std::io::Error) -> OutputError {
        OutputError::OutputWriteFailure {
            path: self.path.clone(),
            location: ErrorLocation::from(Location::caller()),
            source,
        }
    }
}
