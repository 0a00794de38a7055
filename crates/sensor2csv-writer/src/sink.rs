//! Append-only CSV sink with one lock and one header flag per file.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, WriterError};
use crate::job::WriteJob;

/// What a successful append did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub header_written: bool,
    pub bytes: usize,
}

/// Destination for write jobs.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one job. A single call is a single attempt; retries are the
    /// caller's concern.
    async fn append(&self, job: &WriteJob) -> Result<AppendOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    /// Not yet inspected, or the last write failed part way.
    Unknown,
    Missing,
    Written,
}

/// Lock and header bookkeeping for one physical CSV file.
#[derive(Debug)]
pub struct CsvFileState {
    path: PathBuf,
    header: tokio::sync::Mutex<HeaderState>,
}

impl CsvFileState {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            header: tokio::sync::Mutex::new(HeaderState::Unknown),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the header is known to be on disk.
    pub async fn header_written(&self) -> bool {
        *self.header.lock().await == HeaderState::Written
    }

    async fn append(&self, job: &WriteJob) -> Result<AppendOutcome> {
        let mut header = self.header.lock().await;
        let result = self.append_locked(job, &mut header).await;
        if result.is_err() {
            // A partial write may have left bytes behind; look again next time.
            *header = HeaderState::Unknown;
        }
        result
    }

    async fn append_locked(
        &self,
        job: &WriteJob,
        header: &mut HeaderState,
    ) -> Result<AppendOutcome> {
        let endpoint = job.endpoint();
        let fail = |context: &str, e: std::io::Error| {
            WriterError::write_failure(endpoint, &self.path, format!("{}: {}", context, e))
        };

        if *header == HeaderState::Unknown {
            *header = inspect(&self.path)
                .await
                .map_err(|e| fail("stat failed", e))?;
        }
        let needs_header = *header == HeaderState::Missing;

        let mut buf = String::new();
        if needs_header {
            buf.push_str(&endpoint.csv_header());
        }
        buf.push_str(&job.record.csv_row());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| fail("create directory failed", e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| fail("open failed", e))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| fail("write failed", e))?;
        file.flush().await.map_err(|e| fail("flush failed", e))?;
        file.sync_data().await.map_err(|e| fail("fsync failed", e))?;
        if needs_header {
            // The file may be brand new; make its directory entry durable too.
            sync_parent_dir(&self.path)
                .await
                .map_err(|e| fail("directory fsync failed", e))?;
        }

        *header = HeaderState::Written;

        tracing::debug!(
            endpoint = %endpoint,
            path = %self.path.display(),
            header_written = needs_header,
            bytes = buf.len(),
            "Appended CSV row"
        );

        Ok(AppendOutcome {
            header_written: needs_header,
            bytes: buf.len(),
        })
    }
}

#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    tokio::fs::File::open(parent).await?.sync_all().await
}

// Directories cannot be opened for syncing here.
#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

async fn inspect(path: &Path) -> std::io::Result<HeaderState> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(HeaderState::Written),
        Ok(_) => Ok(HeaderState::Missing),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(HeaderState::Missing),
        Err(e) => Err(e),
    }
}

/// Filesystem sink. File states are created lazily and live as long as the
/// sink does.
#[derive(Debug, Default)]
pub struct CsvSink {
    files: Mutex<HashMap<PathBuf, Arc<CsvFileState>>>,
}

impl CsvSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `path`, created on first touch.
    pub fn file_state(&self, path: &Path) -> Arc<CsvFileState> {
        let mut files = self.files.lock();
        files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(CsvFileState::new(path.to_path_buf())))
            .clone()
    }

    pub fn tracked_files(&self) -> usize {
        self.files.lock().len()
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn append(&self, job: &WriteJob) -> Result<AppendOutcome> {
        // The registry lock is released before awaiting the file lock.
        let state = self.file_state(&job.path);
        state.append(job).await
    }
}
