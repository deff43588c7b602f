//! Import orchestration
//!
//! Per file: `Discovered -> SkippedAlreadyImported | Parsed -> Stored -> Recorded | Failed`.
//!
//! Two independent guards keep re-imports idempotent: the ledger skips files
//! whose content was already recorded, and the event table's UNIQUE
//! constraint suppresses duplicate events when a file is retried after an
//! interruption or when overlapping exports share events.

use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{FormatError, ImportError};
use crate::event::{normalize, WallClock};
use crate::fingerprint::Fingerprint;
use crate::format::{self, SourceFormat};
use crate::store::{FileSource, HistoryStore};

/// Engine settings, resolved from configuration
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub zone: Tz,
    pub legacy_wall_clock: WallClock,
    /// Events shorter than this are dropped and counted as filtered
    pub min_ms_played: u64,
    pub follow_links: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            zone: chrono_tz::Europe::Paris,
            legacy_wall_clock: WallClock::Local,
            min_ms_played: 0,
            follow_links: false,
        }
    }
}

/// A file that matched one of the export name patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub format: SourceFormat,
}

/// Terminal state of one file in a run
#[derive(Debug)]
pub enum FileOutcome {
    SkippedAlreadyImported {
        fingerprint: Fingerprint,
    },
    Recorded {
        fingerprint: Fingerprint,
        rows_inserted: usize,
        records_invalid: usize,
        records_filtered: usize,
    },
    /// Not recorded in the ledger; the next run retries it
    Failed(FormatError),
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of one import run
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub export_root: PathBuf,
    pub files_found: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub rows_inserted: usize,
    pub records_invalid: usize,
    pub records_filtered: usize,
    pub failures: Vec<FileFailure>,
}

impl ImportSummary {
    fn new(run_id: Uuid, export_root: PathBuf) -> Self {
        Self {
            run_id,
            export_root,
            files_found: 0,
            files_processed: 0,
            files_skipped: 0,
            files_failed: 0,
            rows_inserted: 0,
            records_invalid: 0,
            records_filtered: 0,
            failures: vec![],
        }
    }

    fn absorb(&mut self, path: &Path, outcome: FileOutcome) {
        match outcome {
            FileOutcome::SkippedAlreadyImported { .. } => self.files_skipped += 1,
            FileOutcome::Recorded {
                rows_inserted,
                records_invalid,
                records_filtered,
                ..
            } => {
                self.files_processed += 1;
                self.rows_inserted += rows_inserted;
                self.records_invalid += records_invalid;
                self.records_filtered += records_filtered;
            }
            FileOutcome::Failed(err) => {
                self.files_failed += 1;
                self.failures.push(FileFailure {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                });
            }
        }
    }
}

/// Find export files under `root`, recursively, in lexical path order.
/// Files not matching an export name pattern are ignored.
pub fn discover(root: &Path, follow_links: bool) -> Result<Vec<Candidate>, ImportError> {
    let mut paths = BTreeSet::new();

    for entry in WalkDir::new(root).follow_links(follow_links) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) if source.depth() == 0 => {
                return Err(ImportError::Walk {
                    root: root.to_path_buf(),
                    source,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_file() {
            paths.insert(entry.into_path());
        }
    }

    Ok(paths
        .into_iter()
        .filter_map(|path| {
            SourceFormat::classify(&path).map(|format| Candidate { path, format })
        })
        .collect())
}

pub struct Importer<'s> {
    store: &'s mut HistoryStore,
    options: ImportOptions,
}

impl<'s> Importer<'s> {
    pub fn new(store: &'s mut HistoryStore, options: ImportOptions) -> Self {
        Self { store, options }
    }

    /// Import every export file under `export_root`.
    ///
    /// Only storage failures abort the run; unreadable or corrupt files are
    /// counted under `files_failed` and left for the next run.
    pub fn run(&mut self, export_root: &Path) -> Result<ImportSummary, ImportError> {
        let export_root = std::fs::canonicalize(export_root)
            .unwrap_or_else(|_| export_root.to_path_buf());
        let run_id = Uuid::new_v4();

        let candidates = discover(&export_root, self.options.follow_links)?;
        tracing::info!(
            run_id = %run_id,
            root = %export_root.display(),
            files = candidates.len(),
            "starting import"
        );

        let mut summary = ImportSummary::new(run_id, export_root.clone());
        summary.files_found = candidates.len();

        for candidate in &candidates {
            let outcome = self.import_file(candidate, &export_root, run_id)?;
            summary.absorb(&candidate.path, outcome);
        }

        tracing::info!(
            run_id = %run_id,
            processed = summary.files_processed,
            skipped = summary.files_skipped,
            failed = summary.files_failed,
            rows = summary.rows_inserted,
            invalid = summary.records_invalid,
            "import finished"
        );

        Ok(summary)
    }

    /// Take one file from `Discovered` to its terminal state
    pub fn import_file(
        &mut self,
        candidate: &Candidate,
        export_root: &Path,
        run_id: Uuid,
    ) -> Result<FileOutcome, ImportError> {
        let path = &candidate.path;

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = FormatError::Read {
                    path: path.clone(),
                    source,
                };
                tracing::warn!(path = %path.display(), error = %err, "file failed");
                return Ok(FileOutcome::Failed(err));
            }
        };

        let fingerprint = Fingerprint::of_bytes(&bytes);
        let storage_err = |source| ImportError::Storage {
            path: path.clone(),
            fingerprint: fingerprint.to_string(),
            source,
        };

        if self.store.ledger().has(&fingerprint).map_err(storage_err)? {
            tracing::info!(
                path = %path.display(),
                fingerprint = fingerprint.short(),
                "already imported, skipping"
            );
            return Ok(FileOutcome::SkippedAlreadyImported { fingerprint });
        }

        let records = match format::parse(path, &bytes, candidate.format) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "file failed");
                return Ok(FileOutcome::Failed(err));
            }
        };
        let format = records.format();
        let wall_clock = format.wall_clock(self.options.legacy_wall_clock);
        tracing::debug!(
            path = %path.display(),
            fingerprint = fingerprint.short(),
            format = format.as_str(),
            "parsing"
        );

        let mut events = Vec::with_capacity(records.size_hint().0);
        let mut records_invalid = 0;
        let mut records_filtered = 0;

        for (index, item) in records.enumerate() {
            let normalized = item.and_then(|(raw, kind)| {
                normalize(raw, kind, wall_clock, self.options.zone, &fingerprint)
            });

            match normalized {
                Ok(event) if event.ms_played < self.options.min_ms_played => {
                    records_filtered += 1
                }
                Ok(event) => events.push(event),
                Err(err) => {
                    records_invalid += 1;
                    tracing::warn!(
                        path = %path.display(),
                        record = index,
                        error = %err,
                        "dropping invalid record"
                    );
                }
            }
        }

        let rows_inserted = self
            .store
            .commit_file(
                &events,
                &FileSource {
                    fingerprint: &fingerprint,
                    path,
                    export_root,
                    run_id,
                },
            )
            .map_err(storage_err)?;

        tracing::info!(
            path = %path.display(),
            fingerprint = fingerprint.short(),
            parsed = events.len(),
            rows = rows_inserted,
            invalid = records_invalid,
            "recorded"
        );

        Ok(FileOutcome::Recorded {
            fingerprint,
            rows_inserted,
            records_invalid,
            records_filtered,
        })
    }
}
