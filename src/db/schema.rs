//! Versioned schema for the local key-value store.
//!
//! Migrations are additive only: a newer version may create collections
//! and tables, never drop them.

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 2;

/// Migration steps. Entry `n` upgrades a database from version `n` to `n + 1`.
pub const MIGRATIONS: &[&str] = &[
  // v1: collection registry, entries, products and cart
  r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS entries (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, key),
    FOREIGN KEY (collection) REFERENCES collections(name)
);

INSERT OR IGNORE INTO collections (name) VALUES ('products');
INSERT OR IGNORE INTO collections (name) VALUES ('cart');
"#,
  // v2: metadata collection (generation cursor)
  r#"
INSERT OR IGNORE INTO collections (name) VALUES ('metadata');
"#,
];
