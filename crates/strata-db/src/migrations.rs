//! Schema history of the application database.
//!
//! Append new entries at the end with a later timestamp prefix. Never edit or
//! remove an entry that has shipped.

use crate::registry::Migration;

pub const CREATE_SETTINGS: Migration = Migration {
    id: "20240301090000_create_settings",
    up: &["CREATE TABLE settings (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"],
    down: &["DROP TABLE settings"],
};

pub const CREATE_TRANSCRIPTS: Migration = Migration {
    id: "20240301090500_create_transcripts",
    up: &[
        "CREATE TABLE transcripts (
            id TEXT PRIMARY KEY NOT NULL,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        "CREATE INDEX idx_transcripts_created_at ON transcripts(created_at)",
    ],
    down: &[
        "DROP INDEX idx_transcripts_created_at",
        "DROP TABLE transcripts",
    ],
};

pub const ADD_TRANSCRIPT_MODEL_ID: Migration = Migration {
    id: "20240412143000_add_transcript_model_id",
    up: &["ALTER TABLE transcripts ADD COLUMN model_id TEXT"],
    down: &["ALTER TABLE transcripts DROP COLUMN model_id"],
};

pub const ADD_TRANSCRIPT_DURATION: Migration = Migration {
    id: "20240520081500_add_transcript_duration",
    up: &["ALTER TABLE transcripts ADD COLUMN duration_ms INTEGER NOT NULL DEFAULT 0"],
    down: &["ALTER TABLE transcripts DROP COLUMN duration_ms"],
};

// Per-provider model selection, edited from the settings screen.
pub const CREATE_MODEL_SETTINGS: Migration = Migration {
    id: "20240611120000_create_model_settings",
    up: &["CREATE TABLE model_settings (
            name TEXT PRIMARY KEY NOT NULL,
            model_id TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"],
    down: &["DROP TABLE model_settings"],
};

pub const ALL: &[Migration] = &[
    CREATE_SETTINGS,
    CREATE_TRANSCRIPTS,
    ADD_TRANSCRIPT_MODEL_ID,
    ADD_TRANSCRIPT_DURATION,
    CREATE_MODEL_SETTINGS,
];
