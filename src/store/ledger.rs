//! Import ledger: which source files have been fully processed

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::StorageError;
use crate::fingerprint::Fingerprint;

/// One source file already processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub fingerprint: Fingerprint,
    pub imported_at: DateTime<Utc>,
    /// Rows this file contributed (informational)
    pub row_count: u64,
    pub file_path: PathBuf,
    pub export_root: PathBuf,
    pub run_id: Uuid,
}

/// Sole writer of the `imports` table
pub struct ImportLedger<'c> {
    conn: &'c Connection,
}

impl<'c> ImportLedger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn has(&self, fingerprint: &Fingerprint) -> Result<bool, StorageError> {
        let found = self
            .conn
            .prepare_cached("SELECT 1 FROM imports WHERE fingerprint = ? LIMIT 1")?
            .exists(params![fingerprint.as_str()])?;
        Ok(found)
    }

    /// Mark a file as done. Returns false when another run already recorded it.
    pub fn record(&self, record: &ImportRecord) -> Result<bool, StorageError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO imports
             (fingerprint, imported_at, row_count, file_path, export_root, run_id)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.fingerprint.as_str(),
                record.imported_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                record.row_count as i64,
                record.file_path.to_string_lossy().to_string(),
                record.export_root.to_string_lossy().to_string(),
                record.run_id.to_string(),
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<ImportRecord>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT fingerprint, imported_at, row_count, file_path, export_root, run_id
                 FROM imports WHERE fingerprint = ?",
                params![fingerprint.as_str()],
                LedgerRow::from_row,
            )
            .optional()?;

        row.map(LedgerRow::into_record).transpose()
    }

    /// All records, oldest first
    pub fn list(&self) -> Result<Vec<ImportRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT fingerprint, imported_at, row_count, file_path, export_root, run_id
             FROM imports
             ORDER BY imported_at, file_path",
        )?;

        let rows = stmt
            .query_map([], LedgerRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(LedgerRow::into_record).collect()
    }

    pub fn count(&self) -> Result<u64, StorageError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM imports", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

struct LedgerRow {
    fingerprint: String,
    imported_at: String,
    row_count: i64,
    file_path: String,
    export_root: String,
    run_id: String,
}

impl LedgerRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            fingerprint: row.get(0)?,
            imported_at: row.get(1)?,
            row_count: row.get(2)?,
            file_path: row.get(3)?,
            export_root: row.get(4)?,
            run_id: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<ImportRecord, StorageError> {
        let imported_at = DateTime::parse_from_rfc3339(&self.imported_at)
            .map_err(|_| StorageError::Corrupt {
                column: "imports.imported_at",
                value: self.imported_at.clone(),
            })?
            .with_timezone(&Utc);

        let run_id = Uuid::parse_str(&self.run_id).map_err(|_| StorageError::Corrupt {
            column: "imports.run_id",
            value: self.run_id.clone(),
        })?;

        Ok(ImportRecord {
            fingerprint: Fingerprint::from_hex(self.fingerprint),
            imported_at,
            row_count: self.row_count.max(0) as u64,
            file_path: PathBuf::from(self.file_path),
            export_root: PathBuf::from(self.export_root),
            run_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HistoryStore;

    fn record(fp: &Fingerprint, rows: u64) -> ImportRecord {
        ImportRecord {
            fingerprint: fp.clone(),
            imported_at: DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            row_count: rows,
            file_path: PathBuf::from("/data/StreamingHistory_music_0.json"),
            export_root: PathBuf::from("/data"),
            run_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_has_and_record() {
        let store = HistoryStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        let fp = Fingerprint::of_bytes(b"one");

        assert!(!ledger.has(&fp).unwrap());
        assert!(ledger.record(&record(&fp, 3)).unwrap());
        assert!(ledger.has(&fp).unwrap());
        assert_eq!(ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_record_same_fingerprint_twice_keeps_first() {
        let store = HistoryStore::open_in_memory().unwrap();
        let ledger = store.ledger();
        let fp = Fingerprint::of_bytes(b"one");

        assert!(ledger.record(&record(&fp, 3)).unwrap());
        assert!(!ledger.record(&record(&fp, 0)).unwrap());

        let stored = ledger.get(&fp).unwrap().unwrap();
        assert_eq!(stored.row_count, 3);
        assert_eq!(ledger.list().unwrap().len(), 1);
    }

    #[test]
    fn test_get_unknown_fingerprint() {
        let store = HistoryStore::open_in_memory().unwrap();
        let fp = Fingerprint::of_bytes(b"missing");
        assert!(store.ledger().get(&fp).unwrap().is_none());
    }
}
