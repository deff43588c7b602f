//! Export format detection and parsing
//!
//! Two shapes are supported:
//! - Legacy: `StreamingHistory*.json`, one media kind per file, naive `endTime`
//! - Extended: `endsong*.json` / `Streaming_History_Audio*.json`, mixed kinds, RFC 3339 `ts`
//!
//! The file name gives a first guess; the keys of the first recognizable
//! record decide.

mod extended;
mod legacy;

use glob::{MatchOptions, Pattern};
use serde_json::Value;
use std::path::Path;

use crate::error::{FormatError, ValidationError};
use crate::event::{MediaKind, RawRecord, WallClock};

const LEGACY_PATTERNS: &[&str] = &["StreamingHistory*.json"];
const EXTENDED_PATTERNS: &[&str] = &["endsong*.json", "Streaming_History_Audio*.json"];

// Keys that mark an object as belonging to a format even without a timestamp
const LEGACY_KEYS: &[&str] = &[
    "endTime",
    "msPlayed",
    "trackName",
    "artistName",
    "podcastName",
    "episodeName",
];
const EXTENDED_KEYS: &[&str] = &[
    "ts",
    "ms_played",
    "master_metadata_track_name",
    "master_metadata_album_artist_name",
    "episode_name",
    "episode_show_name",
    "spotify_track_uri",
    "spotify_episode_uri",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Old export, split into music and podcast files
    Legacy(MediaKind),
    /// Extended streaming history, media kind per record
    Extended,
}

impl SourceFormat {
    /// Classify a candidate by file name. `None` means the file is not an
    /// export file and should be ignored.
    pub fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;

        if matches_any(EXTENDED_PATTERNS, name) {
            return Some(SourceFormat::Extended);
        }

        if matches_any(LEGACY_PATTERNS, name) {
            let kind = if name.to_ascii_lowercase().contains("podcast") {
                MediaKind::Podcast
            } else {
                MediaKind::Music
            };
            return Some(SourceFormat::Legacy(kind));
        }

        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Legacy(MediaKind::Music) => "legacy-music",
            SourceFormat::Legacy(MediaKind::Podcast) => "legacy-podcast",
            SourceFormat::Extended => "extended",
        }
    }

    /// How naive timestamps in this format are read.
    /// Extended `ts` values are always UTC.
    pub fn wall_clock(&self, legacy: WallClock) -> WallClock {
        match self {
            SourceFormat::Legacy(_) => legacy,
            SourceFormat::Extended => WallClock::Utc,
        }
    }

    /// Structural probe over one object of a file
    fn probe(item: &Value, hint: SourceFormat) -> Option<Self> {
        let obj = item.as_object()?;

        if obj.contains_key("ts") {
            return Some(SourceFormat::Extended);
        }

        if obj.contains_key("endTime") {
            if obj.contains_key("podcastName") || obj.contains_key("episodeName") {
                return Some(SourceFormat::Legacy(MediaKind::Podcast));
            }
            if obj.contains_key("trackName") || obj.contains_key("artistName") {
                return Some(SourceFormat::Legacy(MediaKind::Music));
            }
            return Some(match hint {
                SourceFormat::Legacy(kind) => SourceFormat::Legacy(kind),
                SourceFormat::Extended => SourceFormat::Legacy(MediaKind::Music),
            });
        }

        None
    }

    /// Whether an unprobed object carries any field this format knows
    fn resembles(&self, item: &Value) -> bool {
        let keys = match self {
            SourceFormat::Legacy(_) => LEGACY_KEYS,
            SourceFormat::Extended => EXTENDED_KEYS,
        };
        item.as_object()
            .map_or(false, |obj| keys.iter().any(|k| obj.contains_key(*k)))
    }
}

fn matches_any(patterns: &[&str], name: &str) -> bool {
    patterns.iter().any(|p| {
        Pattern::new(p)
            .map(|pattern| pattern.matches_with(name, MATCH_OPTIONS))
            .unwrap_or(false)
    })
}

/// Parse file content into a lazy sequence of raw records.
///
/// The first object with a recognizable shape decides the format. When no
/// object is recognizable the file name decides, as long as some object
/// looks like that format. Fails for the whole file only when the content
/// is not a JSON array or nothing in it resembles an export record.
/// Individual bad records surface as `Err` items of the returned iterator.
pub fn parse(path: &Path, bytes: &[u8], hint: SourceFormat) -> Result<Records, FormatError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|source| FormatError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let items = match value {
        Value::Array(items) => items,
        _ => {
            return Err(FormatError::NotAnArray {
                path: path.to_path_buf(),
            })
        }
    };

    let format = match items.iter().find_map(|v| SourceFormat::probe(v, hint)) {
        Some(format) => format,
        None if items.is_empty() || items.iter().any(|v| hint.resembles(v)) => hint,
        None => {
            return Err(FormatError::UnrecognizedShape {
                path: path.to_path_buf(),
            })
        }
    };

    if format != hint {
        tracing::debug!(
            path = %path.display(),
            named = hint.as_str(),
            detected = format.as_str(),
            "content shape overrides file name"
        );
    }

    Ok(Records {
        format,
        items: items.into_iter(),
    })
}

/// Records of one file, converted on demand
pub struct Records {
    format: SourceFormat,
    items: std::vec::IntoIter<Value>,
}

impl Records {
    pub fn format(&self) -> SourceFormat {
        self.format
    }
}

impl Iterator for Records {
    type Item = Result<(RawRecord, MediaKind), ValidationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.next()?;
        if !item.is_object() {
            return Some(Err(ValidationError::NotAnObject));
        }

        Some(match self.format {
            SourceFormat::Legacy(kind) => legacy::read_record(item).map(|raw| (raw, kind)),
            SourceFormat::Extended => extended::read_record(item),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn p(name: &str) -> PathBuf {
        PathBuf::from("/export/MyData").join(name)
    }

    #[test]
    fn test_classify_by_name() {
        assert_eq!(
            SourceFormat::classify(&p("StreamingHistory_music_0.json")),
            Some(SourceFormat::Legacy(MediaKind::Music))
        );
        assert_eq!(
            SourceFormat::classify(&p("StreamingHistory_podcast_0.json")),
            Some(SourceFormat::Legacy(MediaKind::Podcast))
        );
        assert_eq!(
            SourceFormat::classify(&p("StreamingHistory0.json")),
            Some(SourceFormat::Legacy(MediaKind::Music))
        );
        assert_eq!(
            SourceFormat::classify(&p("endsong_3.json")),
            Some(SourceFormat::Extended)
        );
        assert_eq!(
            SourceFormat::classify(&p("Streaming_History_Audio_2019-2021_0.json")),
            Some(SourceFormat::Extended)
        );
        assert_eq!(SourceFormat::classify(&p("Userdata.json")), None);
        assert_eq!(SourceFormat::classify(&p("endsong_0.txt")), None);
    }

    #[test]
    fn test_corrupt_and_non_array_files() {
        let hint = SourceFormat::Extended;
        assert!(matches!(
            parse(&p("endsong_0.json"), b"{not json", hint),
            Err(FormatError::Json { .. })
        ));
        assert!(matches!(
            parse(&p("endsong_0.json"), br#"{"ts": "x"}"#, hint),
            Err(FormatError::NotAnArray { .. })
        ));
        assert!(matches!(
            parse(&p("endsong_0.json"), br#"[{"foo": 1}]"#, hint),
            Err(FormatError::UnrecognizedShape { .. })
        ));
    }

    #[test]
    fn test_probe_overrides_name() {
        let body = br#"[{"endTime":"2021-01-01 10:00","podcastName":"Show","episodeName":"Ep","msPlayed":1}]"#;
        let records = parse(&p("StreamingHistory_music_1.json"), body, SourceFormat::Legacy(MediaKind::Music))
            .unwrap();
        assert_eq!(records.format(), SourceFormat::Legacy(MediaKind::Podcast));
    }

    #[test]
    fn test_shape_comes_from_first_recognizable_record() {
        let body = br#"[
            {"ms_played": 1000, "master_metadata_track_name": "no ts"},
            {"ts": "2021-01-01T00:00:00Z", "ms_played": 5}
        ]"#;
        let results: Vec<_> = parse(&p("endsong_0.json"), body, SourceFormat::Extended)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results[1].is_ok());

        let body = br#"[
            {"trackName": "no end time", "artistName": "A", "msPlayed": 10},
            {"endTime": "2021-01-01 10:00", "podcastName": "Show", "episodeName": "Ep", "msPlayed": 1}
        ]"#;
        let records = parse(
            &p("StreamingHistory_music_0.json"),
            body,
            SourceFormat::Legacy(MediaKind::Music),
        )
        .unwrap();
        assert_eq!(records.format(), SourceFormat::Legacy(MediaKind::Podcast));
    }

    #[test]
    fn test_no_timestamps_anywhere_falls_back_to_name() {
        let body = br#"[{"msPlayed": 10, "trackName": "t"}]"#;
        let records = parse(
            &p("StreamingHistory_music_0.json"),
            body,
            SourceFormat::Legacy(MediaKind::Music),
        )
        .unwrap();
        assert_eq!(records.format(), SourceFormat::Legacy(MediaKind::Music));

        // Legacy keys under an extended name contradict the name
        assert!(matches!(
            parse(&p("endsong_0.json"), body, SourceFormat::Extended),
            Err(FormatError::UnrecognizedShape { .. })
        ));
        assert!(matches!(
            parse(&p("endsong_0.json"), b"[1, 2]", SourceFormat::Extended),
            Err(FormatError::UnrecognizedShape { .. })
        ));
    }

    #[test]
    fn test_empty_array_uses_hint() {
        let records = parse(&p("endsong_0.json"), b"[]", SourceFormat::Extended).unwrap();
        assert_eq!(records.format(), SourceFormat::Extended);
        assert_eq!(records.count(), 0);
    }

    #[test]
    fn test_non_object_items_are_record_errors() {
        let body = br#"[{"ts":"2021-01-01T00:00:00Z","ms_played":5}, 7]"#;
        let results: Vec<_> = parse(&p("endsong_0.json"), body, SourceFormat::Extended)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err(), &ValidationError::NotAnObject);
    }
}
