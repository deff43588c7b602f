//! Deduplicating event store
//!
//! Uniqueness is enforced by the table's UNIQUE constraint; inserts use
//! `INSERT OR IGNORE` and report how many rows were actually added.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection};

use crate::error::StorageError;
use crate::event::{Event, Identity, MediaKind, PlaybackExtras};
use crate::fingerprint::Fingerprint;

/// Read filter for analytics consumers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Inclusive lower bound
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub to: Option<DateTime<Utc>>,
    pub media_kind: Option<MediaKind>,
}

impl EventFilter {
    pub fn kind(media_kind: MediaKind) -> Self {
        Self {
            media_kind: Some(media_kind),
            ..Default::default()
        }
    }

    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses = vec![];
        let mut values = vec![];

        if let Some(from) = self.from {
            clauses.push("played_at_utc >= ?");
            values.push(utc_key(&from));
        }
        if let Some(to) = self.to {
            clauses.push("played_at_utc < ?");
            values.push(utc_key(&to));
        }
        if let Some(kind) = self.media_kind {
            clauses.push("media_kind = ?");
            values.push(kind.as_str().to_string());
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

/// Canonical text form of an instant. Fixed width, so text order is time order.
fn utc_key(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sole writer of the `events` table
pub struct EventStore<'c> {
    conn: &'c Connection,
}

impl<'c> EventStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert each event unless its identity tuple is already stored.
    /// Returns the number of rows added. The caller owns the transaction.
    pub fn insert_batch(&self, events: &[Event]) -> Result<usize, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            r#"INSERT OR IGNORE INTO events
               (played_at_utc, played_at_local, media_kind,
                track_name, artist_name, album_name, show_name, episode_name,
                ms_played, platform, content_uri, reason_end, shuffle, skipped,
                source_fingerprint)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )?;

        let mut inserted = 0;
        for event in events {
            let (track, artist, album, show, episode) = match &event.identity {
                Identity::Track {
                    track,
                    artist,
                    album,
                } => (track.as_str(), artist.as_str(), album.as_str(), "", ""),
                Identity::Episode { show, episode } => ("", "", "", show.as_str(), episode.as_str()),
            };

            inserted += stmt.execute(params![
                utc_key(&event.played_at_utc),
                event
                    .played_at_local
                    .to_rfc3339_opts(SecondsFormat::Millis, false),
                event.media_kind().as_str(),
                track,
                artist,
                album,
                show,
                episode,
                event.ms_played as i64,
                event.extras.platform,
                event.extras.content_uri,
                event.extras.reason_end,
                event.extras.shuffle,
                event.extras.skipped,
                event.source_fingerprint.as_str(),
            ])?;
        }

        Ok(inserted)
    }

    pub fn count(&self, filter: &EventFilter) -> Result<u64, StorageError> {
        let (where_sql, values) = filter.where_clause();
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM events{}", where_sql),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    /// Stream matching events in time order without collecting them.
    pub fn for_each<F>(&self, filter: &EventFilter, mut f: F) -> Result<(), StorageError>
    where
        F: FnMut(Event),
    {
        let (where_sql, values) = filter.where_clause();
        let mut stmt = self.conn.prepare(&format!(
            r#"SELECT played_at_utc, played_at_local, media_kind,
                      track_name, artist_name, album_name, show_name, episode_name,
                      ms_played, platform, content_uri, reason_end, shuffle, skipped,
                      source_fingerprint
               FROM events{}
               ORDER BY played_at_utc, id"#,
            where_sql
        ))?;

        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        while let Some(row) = rows.next()? {
            f(event_from_row(row)?);
        }
        Ok(())
    }

    pub fn query(&self, filter: &EventFilter) -> Result<Vec<Event>, StorageError> {
        let mut events = vec![];
        self.for_each(filter, |e| events.push(e))?;
        Ok(events)
    }
}

fn event_from_row(row: &rusqlite::Row) -> Result<Event, StorageError> {
    let utc: String = row.get(0)?;
    let local: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let ms_played: i64 = row.get(8)?;

    let played_at_utc = DateTime::parse_from_rfc3339(&utc)
        .map_err(|_| StorageError::Corrupt {
            column: "events.played_at_utc",
            value: utc.clone(),
        })?
        .with_timezone(&Utc);
    let played_at_local =
        DateTime::parse_from_rfc3339(&local).map_err(|_| StorageError::Corrupt {
            column: "events.played_at_local",
            value: local.clone(),
        })?;

    let identity = match kind.parse::<MediaKind>() {
        Ok(MediaKind::Music) => Identity::Track {
            track: row.get(3)?,
            artist: row.get(4)?,
            album: row.get(5)?,
        },
        Ok(MediaKind::Podcast) => Identity::Episode {
            show: row.get(6)?,
            episode: row.get(7)?,
        },
        Err(_) => {
            return Err(StorageError::Corrupt {
                column: "events.media_kind",
                value: kind,
            })
        }
    };

    let ms_played = u64::try_from(ms_played).map_err(|_| StorageError::Corrupt {
        column: "events.ms_played",
        value: ms_played.to_string(),
    })?;

    Ok(Event {
        played_at_utc,
        played_at_local,
        ms_played,
        identity,
        extras: PlaybackExtras {
            platform: row.get(9)?,
            content_uri: row.get(10)?,
            reason_end: row.get(11)?,
            shuffle: row.get(12)?,
            skipped: row.get(13)?,
        },
        source_fingerprint: Fingerprint::from_hex(row.get::<_, String>(14)?),
    })
}
