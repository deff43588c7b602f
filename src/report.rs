//! Markdown report rendering

use chrono::Weekday;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::stats::{ms_to_minutes, ListeningStats, WEEKDAYS};

pub const REPORT_FILE: &str = "report.md";

pub fn render_markdown(stats: &ListeningStats) -> String {
    let mut out = String::from("# Listening History Report\n\n");

    if stats.events == 0 {
        out.push_str("No data.\n");
        return out;
    }

    out.push_str("## Summary\n");
    let _ = writeln!(out, "- Total minutes: **{:.0}**", stats.total_minutes());
    let _ = writeln!(out, "- Days covered: **{}**", stats.days_covered);
    let _ = writeln!(
        out,
        "- Average minutes/day: **{:.1}**",
        stats.average_minutes_per_day()
    );
    let _ = writeln!(
        out,
        "- Events: **{}** ({} music, {} podcast)",
        stats.events, stats.music_events, stats.podcast_events
    );
    if let (Some(first), Some(last)) = (stats.first_played, stats.last_played) {
        let _ = writeln!(
            out,
            "- Period: {} to {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        );
    }

    out.push_str("\n## Listening by hour\n\n| Hour | Minutes |\n|---:|---:|\n");
    for (hour, ms) in stats.by_hour.iter().enumerate() {
        let _ = writeln!(out, "| {:02}:00 | {:.1} |", hour, ms_to_minutes(*ms));
    }

    out.push_str("\n## Listening by weekday\n\n| Day | Minutes |\n|---|---:|\n");
    for (day, ms) in WEEKDAYS.iter().zip(stats.by_weekday.iter()) {
        let _ = writeln!(out, "| {} | {:.1} |", weekday_name(*day), ms_to_minutes(*ms));
    }

    out.push_str("\n## Top artists\n\n| # | Artist | Minutes |\n|---:|---|---:|\n");
    for (rank, (artist, ms)) in stats.top_artists.iter().enumerate() {
        let _ = writeln!(
            out,
            "| {} | {} | {:.1} |",
            rank + 1,
            escape_cell(artist),
            ms_to_minutes(*ms)
        );
    }

    out
}

/// Write `report.md` into `out_dir`, creating the directory if needed
pub fn write_report(out_dir: &Path, stats: &ListeningStats) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(REPORT_FILE);
    std::fs::write(&path, render_markdown(stats))?;
    Ok(path)
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
