//! Line-by-line following of a growing log file.
//!
//! [`FileFollower`] behaves like `tail -F` restricted to one file: it replays
//! the file from the start, waits for new data at EOF, and reopens the path
//! when s6-log rotates `current` away (inode change) or the file is truncated.
//!
//! ## Example
//!
//! ```no_run
//! use s6dash_core::follow::{FileFollower, FollowConfig, LineStream};
//!
//! # async fn demo() -> s6dash_core::Result<()> {
//! let mut follower = FileFollower::open(FollowConfig::new("/run/service/web/log/current")).await?;
//! while let Some(line) = follower.next_line().await? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, trace};

use crate::error::{DashError, Result};

/// Default wait between EOF checks in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// A source of log lines that may wait for more input.
#[async_trait]
pub trait LineStream: Send {
    /// Next complete line without its terminator.
    ///
    /// Waits when no line is available yet. `Ok(None)` means the stream has
    /// ended for good. Implementations must be cancellation safe: dropping
    /// the future loses no data.
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Configuration for a [`FileFollower`].
#[derive(Debug, Clone)]
pub struct FollowConfig {
    /// File to follow
    pub path: PathBuf,

    /// Wait between EOF checks
    pub poll_interval: Duration,
}

impl FollowConfig {
    /// Create a config that replays `path` from its start.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Set the EOF poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Follows one file, surviving rotation and truncation.
pub struct FileFollower {
    config: FollowConfig,
    reader: BufReader<File>,
    /// Bytes consumed from the current file
    position: u64,
    inode: Option<u64>,
    /// Bytes of a line whose newline has not arrived yet
    pending: Vec<u8>,
}

impl FileFollower {
    /// Open the file named in `config`.
    pub async fn open(config: FollowConfig) -> Result<Self> {
        let file = open_file(&config.path).await?;
        let inode = file_inode(&file, &config.path).await?;
        let reader = BufReader::new(file);

        debug!(path = %config.path.display(), "following log");
        Ok(Self {
            config,
            reader,
            position: 0,
            inode,
            pending: Vec::new(),
        })
    }

    /// Reopen the path if the file behind it was replaced or truncated.
    ///
    /// A missing path counts as mid-rotation and is retried later.
    async fn reopen_if_rotated(&mut self) -> Result<bool> {
        let path = &self.config.path;
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(read_error(path, e)),
        };

        let replaced = match (self.inode, metadata_inode(&metadata)) {
            (Some(old), Some(new)) => old != new,
            _ => false,
        };
        let truncated = metadata.len() < self.position;
        if !replaced && !truncated {
            return Ok(false);
        }

        let file = open_file(path).await?;
        let inode = file_inode(&file, path).await?;
        debug!(
            path = %path.display(),
            replaced,
            truncated,
            old_position = self.position,
            "log file rotated, reopening"
        );
        self.reader = BufReader::new(file);
        self.position = 0;
        self.inode = inode;
        self.pending.clear();
        Ok(true)
    }
}

#[async_trait]
impl LineStream for FileFollower {
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            let buf = self
                .reader
                .fill_buf()
                .await
                .map_err(|e| read_error(&self.config.path, e))?;

            if buf.is_empty() {
                if !self.reopen_if_rotated().await? {
                    trace!(path = %self.config.path.display(), "at end of log, waiting");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                continue;
            }

            let (consumed, complete) = match buf.iter().position(|b| *b == b'\n') {
                Some(i) => {
                    self.pending.extend_from_slice(&buf[..i]);
                    (i + 1, true)
                }
                None => {
                    self.pending.extend_from_slice(buf);
                    (buf.len(), false)
                }
            };
            self.reader.consume(consumed);
            self.position += consumed as u64;

            if complete {
                let mut line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                if line.ends_with('\r') {
                    line.pop();
                }
                return Ok(Some(line));
            }
        }
    }
}

async fn open_file(path: &Path) -> Result<File> {
    File::open(path).await.map_err(|e| read_error(path, e))
}

fn read_error(path: &Path, source: std::io::Error) -> DashError {
    DashError::LogRead {
        path: path.to_path_buf(),
        source,
    }
}

async fn file_inode(file: &File, path: &Path) -> Result<Option<u64>> {
    let metadata = file.metadata().await.map_err(|e| read_error(path, e))?;
    Ok(metadata_inode(&metadata))
}

#[cfg(unix)]
fn metadata_inode(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn metadata_inode(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}
