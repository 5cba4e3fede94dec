use crate::model::Snapshot;
use std::collections::HashMap;
use std::sync::Arc;

/// Normalized snapshots by file name. Snapshot files are never rewritten under
/// the same name, so entries live for the whole process.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: HashMap<String, Arc<Snapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file_name: &str) -> Option<Arc<Snapshot>> {
        self.entries.get(file_name).cloned()
    }

    pub fn put(&mut self, file_name: &str, snapshot: Arc<Snapshot>) {
        self.entries.insert(file_name.to_string(), snapshot);
    }

    #[cfg(test)]
    pub fn contains(&self, file_name: &str) -> bool {
        self.entries.contains_key(file_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Result, ViewerError};
    use crate::loader::SnapshotSource;
    use crate::metrics::SPECIAL_MARKER;
    use crate::model::RawRow;
    use crate::normalize::build_snapshot;
    use crate::normalize::tests::raw;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory source that counts fetches.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub(crate) files: Mutex<Vec<(String, Vec<RawRow>)>>,
        pub(crate) fetches: AtomicUsize,
    }

    impl FakeSource {
        pub(crate) fn with(files: Vec<(&str, Vec<RawRow>)>) -> Self {
            Self {
                files: Mutex::new(
                    files
                        .into_iter()
                        .map(|(name, rows)| (name.to_string(), rows))
                        .collect(),
                ),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl SnapshotSource for FakeSource {
        fn list_recent(&self, limit: usize) -> Result<Vec<String>> {
            let files = self.files.lock().unwrap();
            let mut names: Vec<String> = files.iter().map(|(n, _)| n.clone()).collect();
            names.sort_by(|a, b| b.cmp(a));
            names.truncate(limit);
            Ok(names)
        }

        fn fetch_rows(&self, file_name: &str) -> Result<Vec<RawRow>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let files = self.files.lock().unwrap();
            files
                .iter()
                .find(|(n, _)| n == file_name)
                .map(|(_, rows)| rows.clone())
                .ok_or_else(|| ViewerError::SourceUnavailable(file_name.to_string()))
        }
    }

    #[test]
    fn get_hands_out_the_stored_snapshot() {
        let mut cache = SnapshotCache::new();
        assert!(cache.get("a.csv").is_none());

        let a = Arc::new(build_snapshot("a.csv", &[raw("x", "c", "10", "1")], SPECIAL_MARKER));
        cache.put("a.csv", Arc::clone(&a));

        assert!(Arc::ptr_eq(&cache.get("a.csv").unwrap(), &a));
        assert!(Arc::ptr_eq(&cache.get("a.csv").unwrap(), &cache.get("a.csv").unwrap()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_overwrites() {
        let mut cache = SnapshotCache::new();
        let a = Arc::new(build_snapshot("a.csv", &[], SPECIAL_MARKER));
        let b = Arc::new(build_snapshot("a.csv", &[raw("x", "c", "1", "1")], SPECIAL_MARKER));

        cache.put("a.csv", a);
        cache.put("a.csv", Arc::clone(&b));
        assert!(Arc::ptr_eq(&cache.get("a.csv").unwrap(), &b));
        assert!(cache.contains("a.csv"));
        assert!(!cache.contains("b.csv"));
        assert_eq!(cache.len(), 1);
    }
}
