//! Init command implementation

use anyhow::Result;
use std::path::Path;

use crate::store::HistoryStore;

pub fn run(db_path: &Path) -> Result<()> {
    let store = HistoryStore::open(db_path)?;
    let imports = store.ledger().count()?;
    println!("Database ready: {} ({} files imported)", db_path.display(), imports);
    Ok(())
}
