//! SQL schema for the casebot SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per channel identity; dialogues overwrite the personal fields.
CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    identity     TEXT NOT NULL UNIQUE,
    handle       TEXT,
    full_name    TEXT NOT NULL,
    id_number    TEXT NOT NULL,
    age          INTEGER NOT NULL,
    birth_date   TEXT NOT NULL,      -- YYYY-MM-DD
    address      TEXT NOT NULL,
    profession   TEXT NOT NULL,
    phone_number TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cases (
    case_id     TEXT PRIMARY KEY,
    case_number TEXT NOT NULL UNIQUE,
    user_id     TEXT NOT NULL REFERENCES users(user_id),
    category    TEXT NOT NULL,       -- 'phishing' | 'whatsapp_hack' | ...
    status      TEXT NOT NULL DEFAULT 'new',
    description TEXT NOT NULL,
    incident_at TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Messages are strictly append-only.
CREATE TABLE IF NOT EXISTS messages (
    message_id    TEXT PRIMARY KEY,
    case_id       TEXT NOT NULL REFERENCES cases(case_id),
    sender_id     TEXT REFERENCES users(user_id),   -- NULL for system/operator
    body          TEXT NOT NULL,
    from_operator INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

-- Phone numbers reported as used in a crime, keyed by their normalized form.
CREATE TABLE IF NOT EXISTS reported_numbers (
    number       TEXT PRIMARY KEY,
    report_count INTEGER NOT NULL DEFAULT 0,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS cases_user_idx    ON cases(user_id, created_at);
CREATE INDEX IF NOT EXISTS messages_case_idx ON messages(case_id, created_at);

PRAGMA user_version = 2;
";
