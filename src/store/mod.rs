//! Listening history storage with SQLite
//!
//! `HistoryStore` owns the connection. The ledger and the event table are
//! reached through borrowed views so that both can take part in the same
//! transaction when a file is committed.

mod events;
mod ledger;
mod schema;

use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StorageError;
use crate::event::Event;
use crate::fingerprint::Fingerprint;

pub use events::{EventFilter, EventStore};
pub use ledger::{ImportLedger, ImportRecord};
pub use schema::SCHEMA;

/// Where a batch of events came from
#[derive(Debug, Clone, Copy)]
pub struct FileSource<'a> {
    pub fingerprint: &'a Fingerprint,
    pub path: &'a Path,
    pub export_root: &'a Path,
    pub run_id: Uuid,
}

pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let store = Self { conn };
        store.init_schema()?;
        tracing::debug!(path = %path.display(), "opened history store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn ledger(&self) -> ImportLedger<'_> {
        ImportLedger::new(&self.conn)
    }

    pub fn events(&self) -> EventStore<'_> {
        EventStore::new(&self.conn)
    }

    /// Insert a batch of events in its own transaction.
    /// Returns the number of rows actually added.
    pub fn insert_batch(&mut self, events: &[Event]) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;
        let inserted = EventStore::new(&tx).insert_batch(events)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert a file's events and record the file in the ledger atomically.
    ///
    /// If anything fails the transaction rolls back, leaving the file
    /// unrecorded and retryable on the next run.
    pub fn commit_file(
        &mut self,
        events: &[Event],
        source: &FileSource<'_>,
    ) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;

        let inserted = EventStore::new(&tx).insert_batch(events)?;
        ImportLedger::new(&tx).record(&ImportRecord {
            fingerprint: source.fingerprint.clone(),
            imported_at: Utc::now(),
            row_count: inserted as u64,
            file_path: source.path.to_path_buf(),
            export_root: source.export_root.to_path_buf(),
            run_id: source.run_id,
        })?;

        tx.commit()?;
        Ok(inserted)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{reject_ledger_inserts, track};
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/listenlog.db");
        let store = HistoryStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.events().count(&EventFilter::default()).unwrap(), 0);
    }

    #[test]
    fn test_commit_file_records_ledger_with_inserted_count() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        let fp = Fingerprint::of_bytes(b"file-a");
        let path = PathBuf::from("/export/endsong_0.json");
        let root = PathBuf::from("/export");
        let source = FileSource {
            fingerprint: &fp,
            path: &path,
            export_root: &root,
            run_id: Uuid::new_v4(),
        };

        // Second event duplicates the first
        let batch = vec![
            track(1_600_000_000, "A", "x", 1000),
            track(1_600_000_000, "A", "x", 1000),
            track(1_600_000_500, "A", "y", 1000),
        ];
        let inserted = store.commit_file(&batch, &source).unwrap();
        assert_eq!(inserted, 2);

        let record = store.ledger().get(&fp).unwrap().unwrap();
        assert_eq!(record.row_count, 2);
        assert_eq!(record.file_path, path);
        assert!(store.ledger().has(&fp).unwrap());
    }

    #[test]
    fn test_insert_batch_across_calls_is_idempotent() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        let batch = vec![track(1_600_000_000, "A", "x", 1000)];
        assert_eq!(store.insert_batch(&batch).unwrap(), 1);
        assert_eq!(store.insert_batch(&batch).unwrap(), 0);
        assert_eq!(store.events().count(&EventFilter::default()).unwrap(), 1);
    }

    #[test]
    fn test_commit_file_rolls_back_events_when_ledger_fails() {
        let mut store = HistoryStore::open_in_memory().unwrap();
        store
            .insert_batch(&[track(1_600_000_000, "A", "x", 1000)])
            .unwrap();
        reject_ledger_inserts(&store);

        let fp = Fingerprint::of_bytes(b"file-b");
        let path = PathBuf::from("/export/endsong_1.json");
        let root = PathBuf::from("/export");
        let source = FileSource {
            fingerprint: &fp,
            path: &path,
            export_root: &root,
            run_id: Uuid::new_v4(),
        };

        let batch = vec![
            track(1_600_000_100, "A", "y", 1000),
            track(1_600_000_200, "A", "z", 1000),
        ];
        let err = store.commit_file(&batch, &source).unwrap_err();
        assert!(matches!(err, StorageError::Sqlite(_)));

        assert_eq!(store.events().count(&EventFilter::default()).unwrap(), 1);
        assert!(!store.ledger().has(&fp).unwrap());
    }
}
