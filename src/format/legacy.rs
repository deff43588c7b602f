//! Legacy `StreamingHistory*.json` records
//!
//! Music: `{"endTime", "artistName", "trackName", "msPlayed"}`
//! Podcast: `{"endTime", "podcastName", "episodeName", "msPlayed"}`

use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::event::{PlaybackExtras, RawRecord};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    end_time: Option<String>,
    ms_played: Option<Value>,
    artist_name: Option<String>,
    track_name: Option<String>,
    podcast_name: Option<String>,
    episode_name: Option<String>,
}

pub(super) fn read_record(item: Value) -> Result<RawRecord, ValidationError> {
    let record: LegacyRecord =
        serde_json::from_value(item).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    Ok(RawRecord {
        timestamp: record.end_time,
        ms_played: record.ms_played,
        track_name: record.track_name,
        artist_name: record.artist_name,
        album_name: None,
        show_name: record.podcast_name,
        episode_name: record.episode_name,
        extras: PlaybackExtras::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_music_record() {
        let raw = read_record(json!({
            "endTime": "2022-02-01 21:14",
            "artistName": "Daft Punk",
            "trackName": "Voyager",
            "msPlayed": 227000
        }))
        .unwrap();
        assert_eq!(raw.timestamp.as_deref(), Some("2022-02-01 21:14"));
        assert_eq!(raw.artist_name.as_deref(), Some("Daft Punk"));
        assert_eq!(raw.ms_played, Some(json!(227000)));
        assert!(raw.album_name.is_none());
    }

    #[test]
    fn test_podcast_record() {
        let raw = read_record(json!({
            "endTime": "2022-02-01 07:02",
            "podcastName": "Morning News",
            "episodeName": "Tuesday",
            "msPlayed": 900000
        }))
        .unwrap();
        assert_eq!(raw.show_name.as_deref(), Some("Morning News"));
        assert_eq!(raw.episode_name.as_deref(), Some("Tuesday"));
    }

    #[test]
    fn test_wrong_field_type_is_malformed() {
        let err = read_record(json!({"endTime": 12, "msPlayed": 1})).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }
}
