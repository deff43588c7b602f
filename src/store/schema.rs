//! SQLite schema definition
//!
//! Two tables with independent owners:
//! - imports: one row per fully processed source file, keyed by content fingerprint
//! - events: one row per listening event, unique over the identity tuple
//!
//! Identity columns are NOT NULL with '' for unknown values so the UNIQUE
//! constraint also covers records with missing metadata.

pub const SCHEMA: &str = r#"
-- ============================================
-- IMPORT LEDGER
-- ============================================

CREATE TABLE IF NOT EXISTS imports (
    fingerprint TEXT PRIMARY KEY,          -- SHA-256 of file content (hex)
    imported_at TEXT NOT NULL,             -- RFC 3339, UTC
    row_count INTEGER NOT NULL,            -- rows this file added
    file_path TEXT NOT NULL,               -- path at the time of import
    export_root TEXT NOT NULL,
    run_id TEXT NOT NULL                   -- UUID of the recording run
);

-- ============================================
-- EVENTS
-- ============================================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY,
    played_at_utc TEXT NOT NULL,           -- RFC 3339, millisecond precision, 'Z'
    played_at_local TEXT NOT NULL,         -- RFC 3339 with offset of the configured zone
    media_kind TEXT NOT NULL,              -- 'music' | 'podcast'
    track_name TEXT NOT NULL DEFAULT '',
    artist_name TEXT NOT NULL DEFAULT '',
    album_name TEXT NOT NULL DEFAULT '',
    show_name TEXT NOT NULL DEFAULT '',
    episode_name TEXT NOT NULL DEFAULT '',
    ms_played INTEGER NOT NULL CHECK (ms_played >= 0),
    platform TEXT,
    content_uri TEXT,
    reason_end TEXT,
    shuffle BOOLEAN,
    skipped BOOLEAN,
    source_fingerprint TEXT NOT NULL,      -- traceability only, not identity
    UNIQUE (played_at_utc, media_kind, track_name, artist_name, album_name,
            show_name, episode_name, ms_played)
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_events_played_at ON events(played_at_utc);
CREATE INDEX IF NOT EXISTS idx_events_kind ON events(media_kind);
CREATE INDEX IF NOT EXISTS idx_events_artist ON events(artist_name);
CREATE INDEX IF NOT EXISTS idx_events_source ON events(source_fingerprint);
"#;
