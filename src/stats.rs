//! Listening statistics over stored events
//!
//! Read-only: everything here goes through [`EventStore::for_each`].

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::collections::{BTreeSet, HashMap};

use crate::error::StorageError;
use crate::event::{Identity, MediaKind};
use crate::store::{EventFilter, EventStore};

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, PartialEq)]
pub struct ListeningStats {
    pub events: u64,
    pub music_events: u64,
    pub podcast_events: u64,
    pub total_ms: u64,
    /// Distinct local calendar days with at least one event
    pub days_covered: usize,
    /// Milliseconds per local hour of day
    pub by_hour: [u64; 24],
    /// Milliseconds per weekday, Monday first
    pub by_weekday: [u64; 7],
    /// Music artists by cumulative milliseconds, longest first
    pub top_artists: Vec<(String, u64)>,
    pub first_played: Option<DateTime<Utc>>,
    pub last_played: Option<DateTime<Utc>>,
}

impl ListeningStats {
    /// Aggregate events matching `filter`, bucketing by local time in `zone`.
    pub fn collect(
        events: &EventStore<'_>,
        filter: &EventFilter,
        zone: Tz,
        top_n: usize,
    ) -> Result<Self, StorageError> {
        let mut stats = Self {
            events: 0,
            music_events: 0,
            podcast_events: 0,
            total_ms: 0,
            days_covered: 0,
            by_hour: [0; 24],
            by_weekday: [0; 7],
            top_artists: vec![],
            first_played: None,
            last_played: None,
        };
        let mut days: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut artists: HashMap<String, u64> = HashMap::new();

        events.for_each(filter, |event| {
            let local = event.played_at_utc.with_timezone(&zone);

            stats.events += 1;
            match event.media_kind() {
                MediaKind::Music => stats.music_events += 1,
                MediaKind::Podcast => stats.podcast_events += 1,
            }
            stats.total_ms += event.ms_played;
            stats.by_hour[local.hour() as usize] += event.ms_played;
            stats.by_weekday[local.weekday().num_days_from_monday() as usize] += event.ms_played;
            days.insert(local.date_naive());

            if let Identity::Track { artist, .. } = &event.identity {
                if !artist.is_empty() {
                    *artists.entry(artist.clone()).or_insert(0) += event.ms_played;
                }
            }

            // Rows arrive in time order
            if stats.first_played.is_none() {
                stats.first_played = Some(event.played_at_utc);
            }
            stats.last_played = Some(event.played_at_utc);
        })?;

        stats.days_covered = days.len();
        stats.top_artists = top_n_by_duration(artists, top_n);
        Ok(stats)
    }

    pub fn total_minutes(&self) -> f64 {
        ms_to_minutes(self.total_ms)
    }

    pub fn average_minutes_per_day(&self) -> f64 {
        if self.days_covered == 0 {
            0.0
        } else {
            self.total_minutes() / self.days_covered as f64
        }
    }
}

pub fn ms_to_minutes(ms: u64) -> f64 {
    ms as f64 / 60_000.0
}

/// Ties are broken by name so output is stable
fn top_n_by_duration(totals: HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}
