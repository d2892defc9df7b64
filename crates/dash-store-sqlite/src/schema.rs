//! Versioned SQL schema for the dashboard store.
//!
//! The applied version is tracked in `PRAGMA user_version`. Each migration
//! carries an `up` and a `down` script; [`SqliteStore::migrate_to`] walks them
//! in either direction, one transaction per step.
//!
//! [`SqliteStore::migrate_to`]: crate::SqliteStore::migrate_to

/// Pragmas applied on every connection; not part of any migration.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

pub struct Migration {
  pub version: u32,
  pub up:      &'static str,
  pub down:    &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
  Migration { version: 1, up: INIT_UP, down: INIT_DOWN },
  Migration { version: 2, up: KLOUT_UP, down: KLOUT_DOWN },
  Migration { version: 3, up: TWEETS_UP, down: TWEETS_DOWN },
];

pub const LATEST_VERSION: u32 = 3;

const INIT_UP: &str = "
CREATE TABLE user (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    email          TEXT NOT NULL UNIQUE,
    name           TEXT,
    password       TEXT,            -- argon2 PHC string
    password_reset TEXT,            -- argon2 PHC string of the reset token
    last_login_at  TEXT,
    created_at     TEXT NOT NULL,   -- RFC 3339 UTC, fixed microsecond width
    updated_at     TEXT NOT NULL
);

CREATE TABLE camp (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE handle (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    uid        INTEGER NOT NULL UNIQUE,
    username   TEXT NOT NULL UNIQUE,
    name       TEXT NOT NULL,
    profile    TEXT NOT NULL DEFAULT '{}',
    camp_id    INTEGER REFERENCES camp(id) ON UPDATE CASCADE ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE topic (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT,
    keywords    TEXT NOT NULL DEFAULT '[]',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE handle_topic (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    handle_id  INTEGER NOT NULL REFERENCES handle(id) ON UPDATE CASCADE ON DELETE CASCADE,
    topic_id   INTEGER NOT NULL REFERENCES topic(id) ON UPDATE CASCADE ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (handle_id, topic_id)
);

CREATE INDEX handle_camp_idx  ON handle(camp_id);
CREATE INDEX handle_topic_idx ON handle_topic(topic_id);
";

const INIT_DOWN: &str = "
DROP TABLE handle_topic;
DROP TABLE topic;
DROP TABLE handle;
DROP TABLE camp;
DROP TABLE user;
";

// Score samples are append-only; only cascading handle deletion removes them.
const KLOUT_UP: &str = "
ALTER TABLE handle ADD COLUMN klout_id TEXT;
ALTER TABLE handle ADD COLUMN klout_score REAL;
ALTER TABLE handle ADD COLUMN klout_checked_at TEXT;

CREATE TABLE klout_score (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    handle_id   INTEGER NOT NULL REFERENCES handle(id) ON UPDATE CASCADE ON DELETE CASCADE,
    value       REAL NOT NULL,
    delta_day   REAL NOT NULL DEFAULT 0,
    delta_week  REAL NOT NULL DEFAULT 0,
    delta_month REAL NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE INDEX klout_score_handle_idx ON klout_score(handle_id, created_at);
";

const KLOUT_DOWN: &str = "
DROP TABLE klout_score;
ALTER TABLE handle DROP COLUMN klout_checked_at;
ALTER TABLE handle DROP COLUMN klout_score;
ALTER TABLE handle DROP COLUMN klout_id;
";

const TWEETS_UP: &str = "
CREATE TABLE tweet (
    id         TEXT PRIMARY KEY,   -- status id on the social network
    handle_id  INTEGER REFERENCES handle(id) ON UPDATE CASCADE ON DELETE CASCADE,
    parent_id  TEXT,               -- status this one replies to; may be unknown locally
    text       TEXT NOT NULL,
    retweeted  INTEGER NOT NULL DEFAULT 0,
    favorited  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX tweet_handle_idx ON tweet(handle_id);
CREATE INDEX tweet_parent_idx ON tweet(parent_id);

CREATE TABLE infographic (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE,   -- file name in file storage
    file_size  INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
";

const TWEETS_DOWN: &str = "
DROP TABLE infographic;
DROP TABLE tweet;
";
