//! Report command implementation

use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::path::Path;

use crate::report;
use crate::stats::ListeningStats;
use crate::store::{EventFilter, HistoryStore};

pub fn run(
    store: &HistoryStore,
    filter: &EventFilter,
    zone: Tz,
    top_n: usize,
    out_dir: &Path,
) -> Result<()> {
    let stats = ListeningStats::collect(&store.events(), filter, zone, top_n)?;
    let path = report::write_report(out_dir, &stats)
        .with_context(|| format!("Failed to write report to {}", out_dir.display()))?;
    println!("Report written: {}", path.display());
    Ok(())
}
