//! SQL migration definitions for the Sheetwright database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: history, satellites, products, relations",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Append-only generation audit trail
CREATE TABLE IF NOT EXISTS history (
    id          TEXT PRIMARY KEY,
    task_type   TEXT NOT NULL,
    model       TEXT NOT NULL,
    domain      TEXT NOT NULL,
    parameters  TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    output      TEXT NOT NULL,
    source      TEXT NOT NULL,
    origin      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_created ON history(created_at);
CREATE INDEX IF NOT EXISTS idx_history_fingerprint ON history(fingerprint);

-- Satellite domains publishing a subset of the catalog
CREATE TABLE IF NOT EXISTS satellites (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    title  TEXT NOT NULL,
    domain TEXT NOT NULL UNIQUE
);

-- Product catalog
CREATE TABLE IF NOT EXISTS products (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    title          TEXT NOT NULL UNIQUE,
    base_link      TEXT,
    satellite_path TEXT,
    description    TEXT NOT NULL DEFAULT ''
);

-- Which satellites publish which products
CREATE TABLE IF NOT EXISTS satellite_links (
    product_id   INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    satellite_id INTEGER NOT NULL REFERENCES satellites(id) ON DELETE CASCADE,
    PRIMARY KEY (product_id, satellite_id)
);

-- Directed product-to-product relations
CREATE TABLE IF NOT EXISTS product_relations (
    product_id  INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    related_id  INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    description TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (product_id, related_id)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
    ]
}
