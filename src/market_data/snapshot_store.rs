//! Durable last-known-good snapshot of the aggregate data kinds.
//!
//! One JSON file, rewritten whole through a temp-file rename. All writes
//! are serialized through this store and happen off the query path; the
//! load path degrades to an empty snapshot on a missing or corrupt file
//! so cold start never fails on disk state.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::market_data::market_data_errors::SnapshotError;
use crate::market_data::market_data_model::{DataKind, SnapshotEntry};

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    entries: HashMap<String, SnapshotEntry>,
}

impl Default for SnapshotFile {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            entries: HashMap::new(),
        }
    }
}

pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// All persisted entries, keyed by kind. Missing or unreadable state
    /// is an empty snapshot, never a startup error.
    pub async fn load(&self) -> HashMap<DataKind, SnapshotEntry> {
        let file = self.read_file();
        file.entries
            .into_values()
            .map(|entry| (entry.kind, entry))
            .collect()
    }

    /// Persist one kind's entry. Skips quote payloads (not a snapshot
    /// kind) and entries older than what is already on disk.
    pub async fn save(&self, entry: SnapshotEntry) -> Result<(), SnapshotError> {
        if !entry.kind.is_snapshot_kind() {
            debug!("Skipping snapshot save for non-snapshot kind {}", entry.kind);
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut file = self.read_file();

        let key = entry.kind.as_str().to_string();
        if let Some(existing) = file.entries.get(&key) {
            if existing.captured_at >= entry.captured_at {
                debug!(
                    "Skipping snapshot save for {}: on-disk entry is newer",
                    entry.kind
                );
                return Ok(());
            }
        }
        file.entries.insert(key, entry);
        file.version = SNAPSHOT_FORMAT_VERSION;

        self.write_file(&file)
    }

    fn read_file(&self) -> SnapshotFile {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot file at {:?}", self.path);
                return SnapshotFile::default();
            }
            Err(e) => {
                warn!("Failed to read snapshot file {:?}: {}", self.path, e);
                return SnapshotFile::default();
            }
        };

        match serde_json::from_slice::<SnapshotFile>(&bytes) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    "Snapshot file {:?} is corrupt, starting empty: {}",
                    self.path, e
                );
                SnapshotFile::default()
            }
        }
    }

    fn write_file(&self, file: &SnapshotFile) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(file)?;
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::market_data_model::{MarketIndex, MarketPayload, Quote};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    static NEXT_FILE: AtomicU32 = AtomicU32::new(0);

    fn temp_store() -> SnapshotStore {
        let n = NEXT_FILE.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "stockdesk_snapshot_test_{}_{}.json",
            std::process::id(),
            n
        ));
        let _ = std::fs::remove_file(&path);
        SnapshotStore::new(path)
    }

    fn index_payload() -> MarketPayload {
        MarketPayload::IndexList(vec![MarketIndex {
            code: "sh000001".to_string(),
            name: "上证指数".to_string(),
            current: dec!(3231.41),
            change: dec!(-12.37),
            change_percent: dec!(-0.38),
        }])
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty_not_error() {
        let store = temp_store();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_empty_not_error() {
        let store = temp_store();
        std::fs::write(&store.path, b"{ this is not json").unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrips_payload() {
        let store = temp_store();
        let entry = SnapshotEntry::new(index_payload());
        store.save(entry.clone()).await.unwrap();

        let loaded = store.load().await;
        let back = loaded.get(&DataKind::MarketIndex).unwrap();
        assert_eq!(back.captured_at, entry.captured_at);

        let indices = back.payload.clone().into_index_list().unwrap();
        assert_eq!(indices[0].code, "sh000001");
        assert_eq!(indices[0].current, dec!(3231.41));
    }

    #[tokio::test]
    async fn test_kinds_are_independent_on_disk() {
        let store = temp_store();
        store.save(SnapshotEntry::new(index_payload())).await.unwrap();
        store
            .save(SnapshotEntry::new(MarketPayload::HotTopics(Vec::new())))
            .await
            .unwrap();

        let loaded = store.load().await;
        assert!(loaded.contains_key(&DataKind::MarketIndex));
        assert!(loaded.contains_key(&DataKind::HotTopics));
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn test_older_entry_never_overwrites_newer() {
        let store = temp_store();
        let mut newer = SnapshotEntry::new(index_payload());
        newer.captured_at = Utc::now();
        store.save(newer.clone()).await.unwrap();

        let mut older = SnapshotEntry::new(MarketPayload::IndexList(Vec::new()));
        older.captured_at = newer.captured_at - Duration::seconds(30);
        store.save(older).await.unwrap();

        let loaded = store.load().await;
        let kept = loaded.get(&DataKind::MarketIndex).unwrap();
        assert_eq!(kept.captured_at, newer.captured_at);
        assert!(!kept.payload.clone().into_index_list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quote_payloads_are_not_persisted() {
        let store = temp_store();
        store
            .save(SnapshotEntry::new(MarketPayload::Quotes(vec![Quote {
                code: "sh600000".to_string(),
                name: "浦发银行".to_string(),
                last: dec!(10.50),
                change: dec!(0.12),
                change_percent: dec!(1.2),
                open: dec!(10.40),
                high: dec!(10.66),
                low: dec!(10.30),
                prev_close: dec!(10.38),
                volume: dec!(1000),
                turnover: dec!(10500),
                timestamp: Utc::now(),
            }])))
            .await
            .unwrap();

        assert!(store.load().await.is_empty());
    }
}
