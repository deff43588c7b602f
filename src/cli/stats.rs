//! Stats command implementation

use anyhow::Result;
use chrono_tz::Tz;

use crate::stats::ListeningStats;
use crate::store::{EventFilter, HistoryStore};

pub fn run(store: &HistoryStore, filter: &EventFilter, zone: Tz, top_n: usize) -> Result<()> {
    let events = store.events();
    let stats = ListeningStats::collect(&events, filter, zone, top_n)?;

    println!("events: {}", stats.events);
    println!("imports: {}", store.ledger().count()?);

    if stats.events == 0 {
        return Ok(());
    }

    println!("music: {}", stats.music_events);
    println!("podcast: {}", stats.podcast_events);
    println!("minutes: {:.0}", stats.total_minutes());
    println!("days: {}", stats.days_covered);
    println!("minutes/day: {:.1}", stats.average_minutes_per_day());

    if let (Some(first), Some(last)) = (stats.first_played, stats.last_played) {
        println!(
            "period: {} → {}",
            first.with_timezone(&zone).format("%Y-%m-%d %H:%M"),
            last.with_timezone(&zone).format("%Y-%m-%d %H:%M")
        );
    }

    if !stats.top_artists.is_empty() {
        println!("\nTop artists:");
        for (rank, (artist, ms)) in stats.top_artists.iter().enumerate() {
            println!(
                "{:>3}. {:<40} {:>8.1} min",
                rank + 1,
                artist,
                crate::stats::ms_to_minutes(*ms)
            );
        }
    }

    Ok(())
}
