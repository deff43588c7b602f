//! Import command implementation

use anyhow::{Context, Result};
use std::path::Path;

use crate::import::{ImportOptions, ImportSummary, Importer};
use crate::store::HistoryStore;

pub fn run(
    store: &mut HistoryStore,
    options: ImportOptions,
    export_root: &Path,
    json: bool,
) -> Result<()> {
    let summary = Importer::new(store, options)
        .run(export_root)
        .with_context(|| format!("Import of {} aborted", export_root.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("Import finished: {}", summary.export_root.display());
    println!("- files_found: {}", summary.files_found);
    println!("- files_processed: {}", summary.files_processed);
    println!("- files_skipped: {}", summary.files_skipped);
    println!("- files_failed: {}", summary.files_failed);
    println!("- rows_inserted: {}", summary.rows_inserted);
    println!("- records_invalid: {}", summary.records_invalid);
    if summary.records_filtered > 0 {
        println!("- records_filtered: {}", summary.records_filtered);
    }

    for failure in &summary.failures {
        println!("  ✗ {}: {}", failure.path.display(), failure.message);
    }
}
