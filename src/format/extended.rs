//! Extended streaming history (`endsong*.json`) records
//!
//! Each record carries both music and podcast metadata columns; the
//! podcast columns are non-null for episodes.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::event::{MediaKind, PlaybackExtras, RawRecord};

#[derive(Debug, Deserialize)]
struct ExtendedRecord {
    ts: Option<String>,
    #[serde(alias = "msPlayed")]
    ms_played: Option<Value>,
    platform: Option<String>,
    master_metadata_track_name: Option<String>,
    master_metadata_album_artist_name: Option<String>,
    master_metadata_album_album_name: Option<String>,
    spotify_track_uri: Option<String>,
    episode_name: Option<String>,
    episode_show_name: Option<String>,
    spotify_episode_uri: Option<String>,
    // Hybrid exports carry legacy-style names next to `ts`
    #[serde(rename = "trackName")]
    track_name: Option<String>,
    #[serde(rename = "artistName")]
    artist_name: Option<String>,
    #[serde(rename = "albumName")]
    album_name: Option<String>,
    episode_title: Option<String>,
    show_name: Option<String>,
    reason_end: Option<String>,
    // Loosely typed across export generations
    shuffle: Option<Value>,
    skipped: Option<Value>,
}

impl ExtendedRecord {
    fn media_kind(&self) -> MediaKind {
        let present = |v: &Option<String>| v.as_deref().map_or(false, |s| !s.is_empty());
        if present(&self.spotify_episode_uri)
            || present(&self.episode_name)
            || present(&self.episode_show_name)
            || present(&self.episode_title)
            || present(&self.show_name)
        {
            MediaKind::Podcast
        } else {
            MediaKind::Music
        }
    }
}

/// First non-empty value, preferring the canonical field
fn either(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary.filter(|s| !s.is_empty()).or(fallback)
}

pub(super) fn read_record(item: Value) -> Result<(RawRecord, MediaKind), ValidationError> {
    let record: ExtendedRecord =
        serde_json::from_value(item).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    let kind = record.media_kind();

    let content_uri = match kind {
        MediaKind::Music => record.spotify_track_uri,
        MediaKind::Podcast => record.spotify_episode_uri,
    };

    let raw = RawRecord {
        timestamp: record.ts,
        ms_played: record.ms_played,
        track_name: either(record.master_metadata_track_name, record.track_name),
        artist_name: either(record.master_metadata_album_artist_name, record.artist_name),
        album_name: either(record.master_metadata_album_album_name, record.album_name),
        show_name: either(record.episode_show_name, record.show_name),
        episode_name: either(record.episode_name, record.episode_title),
        extras: PlaybackExtras {
            platform: record.platform,
            content_uri,
            reason_end: record.reason_end,
            shuffle: record.shuffle.as_ref().and_then(Value::as_bool),
            skipped: record.skipped.as_ref().and_then(Value::as_bool),
        },
    };

    Ok((raw, kind))
}
