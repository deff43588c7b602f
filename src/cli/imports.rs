//! Imports command implementation

use anyhow::Result;

use crate::store::HistoryStore;

pub fn run(store: &HistoryStore) -> Result<()> {
    let records = store.ledger().list()?;

    if records.is_empty() {
        println!("No files imported. Run 'listenlog import <folder>' first.");
        return Ok(());
    }

    println!(
        "{:<14} {:<22} {:>8} {}",
        "Fingerprint", "Imported", "Rows", "Path"
    );
    println!("{}", "-".repeat(90));

    for record in records {
        println!(
            "{:<14} {:<22} {:>8} {}",
            record.fingerprint.short(),
            record.imported_at.format("%Y-%m-%d %H:%M:%S"),
            record.row_count,
            record.file_path.display(),
        );
    }

    Ok(())
}
