use crate::error::{Result, ViewerError};
use crate::model::RawRow;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SNAPSHOT_PREFIX: &str = "price_data_";
const SNAPSHOT_SUFFIX: &str = ".csv";

/// Where snapshots come from. Implementations own the CSV handling.
pub trait SnapshotSource: Send + Sync {
    /// Newest first, at most `limit` names.
    fn list_recent(&self, limit: usize) -> Result<Vec<String>>;

    fn fetch_rows(&self, file_name: &str) -> Result<Vec<RawRow>>;

    fn latest(&self) -> Result<Option<String>> {
        Ok(self.list_recent(1)?.into_iter().next())
    }
}

/// Reads `price_data_YYYYMMDD_HH.csv` files from one directory.
pub struct DirSnapshotSource {
    dir: PathBuf,
}

impl DirSnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

pub fn is_snapshot_file(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_SUFFIX)
}

impl SnapshotSource for DirSnapshotSource {
    fn list_recent(&self, limit: usize) -> Result<Vec<String>> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            return Ok(Vec::new());
        }

        let mut files: Vec<String> = std::fs::read_dir(&self.dir)
            .map_err(|e| {
                ViewerError::SourceUnavailable(format!("{}: {e}", self.dir.display()))
            })?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_snapshot_file(name))
            .collect();

        // The fixed-width timestamp in the name makes this chronological.
        files.sort_by(|a, b| b.cmp(a));
        files.truncate(limit);
        Ok(files)
    }

    fn fetch_rows(&self, file_name: &str) -> Result<Vec<RawRow>> {
        // Only bare snapshot names; nothing that could walk out of the directory.
        if !is_snapshot_file(file_name) || file_name.contains(['/', '\\']) {
            return Err(ViewerError::SourceUnavailable(format!(
                "not a snapshot file: {file_name}"
            )));
        }
        let path = self.dir.join(file_name);
        if !path.exists() {
            return Err(ViewerError::SourceUnavailable(format!(
                "file does not exist: {}",
                path.display()
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)?;

        let mut rows = Vec::new();
        for (index, result) in reader.deserialize::<RawRow>().enumerate() {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => warn!(file = file_name, row = index + 1, error = %e, "skipping malformed CSV row"),
            }
        }
        debug!(file = file_name, rows = rows.len(), "read snapshot rows");
        Ok(rows)
    }
}

/// `price_data_20250402_17.csv` -> `2025-04-02 17:00`; other names unchanged.
pub fn display_name(file_name: &str) -> String {
    let stamp = file_name
        .strip_prefix(SNAPSHOT_PREFIX)
        .and_then(|rest| rest.strip_suffix(SNAPSHOT_SUFFIX));
    match stamp {
        Some(s) if s.len() == 11 && s.as_bytes()[8] == b'_' && all_digits(&s[..8]) && all_digits(&s[9..]) => {
            format!("{}-{}-{} {}:00", &s[0..4], &s[4..6], &s[6..8], &s[9..11])
        }
        _ => file_name.to_string(),
    }
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
