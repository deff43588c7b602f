//! Canonical listening event, independent of the export format
//!
//! Format parsers produce [`RawRecord`]s; [`normalize`] turns one into an
//! [`Event`] or rejects that single record with a [`ValidationError`].

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::fingerprint::Fingerprint;

/// Kind of media played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Music,
    Podcast,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Music => "music",
            MediaKind::Podcast => "podcast",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "music" => Ok(MediaKind::Music),
            "podcast" => Ok(MediaKind::Podcast),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Identity fields of an event. Missing source values are stored as "".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Track {
        track: String,
        artist: String,
        album: String,
    },
    Episode {
        show: String,
        episode: String,
    },
}

impl Identity {
    pub fn media_kind(&self) -> MediaKind {
        match self {
            Identity::Track { .. } => MediaKind::Music,
            Identity::Episode { .. } => MediaKind::Podcast,
        }
    }
}

/// Playback details carried by the extended format. Never part of identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackExtras {
    pub platform: Option<String>,
    pub content_uri: Option<String>,
    pub reason_end: Option<String>,
    pub shuffle: Option<bool>,
    pub skipped: Option<bool>,
}

/// How a timestamp without an explicit offset should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallClock {
    /// Naive values are wall-clock time in the configured zone
    Local,
    /// Naive values are already UTC
    Utc,
}

/// One record as read from a source file, before validation
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub timestamp: Option<String>,
    pub ms_played: Option<Value>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    pub show_name: Option<String>,
    pub episode_name: Option<String>,
    pub extras: PlaybackExtras,
}

/// One normalized listening occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub played_at_utc: DateTime<Utc>,
    /// Same instant rendered in the configured zone at import time
    pub played_at_local: DateTime<FixedOffset>,
    pub ms_played: u64,
    pub identity: Identity,
    pub extras: PlaybackExtras,
    pub source_fingerprint: Fingerprint,
}

impl Event {
    pub fn media_kind(&self) -> MediaKind {
        self.identity.media_kind()
    }
}

/// Turn a raw record into an event.
///
/// Missing identity fields become empty strings. A missing, unparsable or
/// negative timestamp or duration rejects the record.
pub fn normalize(
    raw: RawRecord,
    kind: MediaKind,
    wall_clock: WallClock,
    zone: Tz,
    source: &Fingerprint,
) -> Result<Event, ValidationError> {
    let timestamp = raw.timestamp.as_deref().ok_or(ValidationError::MissingTimestamp)?;
    let played_at_utc = parse_timestamp(timestamp, wall_clock, zone)?;
    let ms_played = parse_ms_played(raw.ms_played.as_ref())?;

    let identity = match kind {
        MediaKind::Music => Identity::Track {
            track: raw.track_name.unwrap_or_default(),
            artist: raw.artist_name.unwrap_or_default(),
            album: raw.album_name.unwrap_or_default(),
        },
        MediaKind::Podcast => Identity::Episode {
            show: raw.show_name.unwrap_or_default(),
            episode: raw.episode_name.unwrap_or_default(),
        },
    };

    Ok(Event {
        played_at_utc,
        played_at_local: to_local(played_at_utc, zone),
        ms_played,
        identity,
        extras: raw.extras,
        source_fingerprint: source.clone(),
    })
}

/// Render a UTC instant in `zone` with the offset in force at that instant.
pub fn to_local(instant: DateTime<Utc>, zone: Tz) -> DateTime<FixedOffset> {
    let local = instant.with_timezone(&zone);
    local.with_timezone(&local.offset().fix())
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse either an RFC 3339 instant or a naive wall-clock value.
pub fn parse_timestamp(
    value: &str,
    wall_clock: WallClock,
    zone: Tz,
) -> Result<DateTime<Utc>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingTimestamp);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| ValidationError::InvalidTimestamp(value.to_string()))?;

    match wall_clock {
        WallClock::Utc => Ok(Utc.from_utc_datetime(&naive)),
        WallClock::Local => resolve_local(naive, zone)
            .ok_or_else(|| ValidationError::InvalidTimestamp(value.to_string())),
    }
}

/// Ambiguous times take the earlier instant; times inside a DST gap use the
/// offset in force just before the gap.
pub fn resolve_local(naive: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let hour = chrono::Duration::hours(1);
            zone.from_local_datetime(&(naive - hour))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc) + hour)
        }
    }
}

fn parse_ms_played(value: Option<&Value>) -> Result<u64, ValidationError> {
    let ms = match value {
        None | Some(Value::Null) => return Err(ValidationError::MissingMsPlayed),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ValidationError::InvalidMsPlayed(n.to_string()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidMsPlayed(s.clone()))?,
        Some(other) => return Err(ValidationError::InvalidMsPlayed(other.to_string())),
    };

    u64::try_from(ms).map_err(|_| ValidationError::NegativeMsPlayed(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paris() -> Tz {
        chrono_tz::Europe::Paris
    }

    fn fp() -> Fingerprint {
        Fingerprint::of_bytes(b"test")
    }

    fn music(ts: &str, ms: Value) -> RawRecord {
        RawRecord {
            timestamp: Some(ts.to_string()),
            ms_played: Some(ms),
            track_name: Some("Song".into()),
            artist_name: Some("Artist".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_identity_fields_become_empty() {
        let event = normalize(
            music("2021-06-01T10:00:00Z", json!(1000)),
            MediaKind::Music,
            WallClock::Utc,
            paris(),
            &fp(),
        )
        .unwrap();
        assert_eq!(
            event.identity,
            Identity::Track {
                track: "Song".into(),
                artist: "Artist".into(),
                album: String::new(),
            }
        );
        assert_eq!(event.media_kind(), MediaKind::Music);
    }

    #[test]
    fn test_rejects_missing_or_bad_fields() {
        let mut raw = music("2021-06-01T10:00:00Z", json!(1000));
        raw.timestamp = None;
        assert_eq!(
            normalize(raw, MediaKind::Music, WallClock::Utc, paris(), &fp()),
            Err(ValidationError::MissingTimestamp)
        );

        let raw = music("not a date", json!(1000));
        assert!(matches!(
            normalize(raw, MediaKind::Music, WallClock::Utc, paris(), &fp()),
            Err(ValidationError::InvalidTimestamp(_))
        ));

        let raw = music("2021-06-01T10:00:00Z", json!(-5));
        assert_eq!(
            normalize(raw, MediaKind::Music, WallClock::Utc, paris(), &fp()),
            Err(ValidationError::NegativeMsPlayed(-5))
        );

        let raw = music("2021-06-01T10:00:00Z", Value::Null);
        assert_eq!(
            normalize(raw, MediaKind::Music, WallClock::Utc, paris(), &fp()),
            Err(ValidationError::MissingMsPlayed)
        );

        let raw = music("2021-06-01T10:00:00Z", json!("12x"));
        assert!(matches!(
            normalize(raw, MediaKind::Music, WallClock::Utc, paris(), &fp()),
            Err(ValidationError::InvalidMsPlayed(_))
        ));
    }

    #[test]
    fn test_ms_played_accepts_numeric_strings_and_zero() {
        let event = normalize(
            music("2021-06-01T10:00:00Z", json!("42")),
            MediaKind::Music,
            WallClock::Utc,
            paris(),
            &fp(),
        )
        .unwrap();
        assert_eq!(event.ms_played, 42);

        let event = normalize(
            music("2021-06-01T10:00:00Z", json!(0)),
            MediaKind::Music,
            WallClock::Utc,
            paris(),
            &fp(),
        )
        .unwrap();
        assert_eq!(event.ms_played, 0);
    }

    #[test]
    fn test_local_offset_follows_dst() {
        // Paris switches to summer time at 2021-03-28 01:00 UTC
        let before = parse_timestamp("2021-03-28T00:59:00Z", WallClock::Utc, paris()).unwrap();
        let after = parse_timestamp("2021-03-28T01:00:00Z", WallClock::Utc, paris()).unwrap();

        assert_eq!(to_local(before, paris()).offset().local_minus_utc(), 3600);
        assert_eq!(to_local(after, paris()).offset().local_minus_utc(), 7200);
        assert_eq!(
            to_local(after, paris()).to_rfc3339(),
            "2021-03-28T03:00:00+02:00"
        );
    }

    #[test]
    fn test_naive_local_wall_clock() {
        let winter = parse_timestamp("2021-01-10 12:30", WallClock::Local, paris()).unwrap();
        assert_eq!(winter.to_rfc3339(), "2021-01-10T11:30:00+00:00");

        let summer = parse_timestamp("2021-07-10 12:30", WallClock::Local, paris()).unwrap();
        assert_eq!(summer.to_rfc3339(), "2021-07-10T10:30:00+00:00");

        let as_utc = parse_timestamp("2021-07-10 12:30", WallClock::Utc, paris()).unwrap();
        assert_eq!(as_utc.to_rfc3339(), "2021-07-10T12:30:00+00:00");
    }

    #[test]
    fn test_naive_local_gap_and_overlap() {
        // 02:30 does not exist on 2021-03-28 in Paris
        let gap = parse_timestamp("2021-03-28 02:30", WallClock::Local, paris()).unwrap();
        assert_eq!(gap.to_rfc3339(), "2021-03-28T01:30:00+00:00");

        // 02:30 happens twice on 2021-10-31 in Paris; take the earlier
        let overlap = parse_timestamp("2021-10-31 02:30", WallClock::Local, paris()).unwrap();
        assert_eq!(overlap.to_rfc3339(), "2021-10-31T00:30:00+00:00");
    }

    #[test]
    fn test_media_kind_from_str() {
        assert_eq!("Podcast".parse::<MediaKind>(), Ok(MediaKind::Podcast));
        assert!("video".parse::<MediaKind>().is_err());
    }
}
