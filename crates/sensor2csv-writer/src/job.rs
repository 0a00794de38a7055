use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use sensor2csv_core::{Endpoint, NormalizedRecord};

/// A validated record bound for one CSV file.
#[derive(Debug, Clone)]
pub struct WriteJob {
    pub record: NormalizedRecord,
    pub path: PathBuf,
    pub created_at: Instant,
    pub received_at: DateTime<Utc>,
}

impl WriteJob {
    /// Target the endpoint's CSV file inside `data_dir`.
    pub fn new(record: NormalizedRecord, data_dir: &Path) -> Self {
        let path = data_dir.join(record.endpoint().csv_file_name());
        Self {
            record,
            path,
            created_at: Instant::now(),
            received_at: Utc::now(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.record.endpoint()
    }
}
