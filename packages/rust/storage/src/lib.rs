//! libSQL storage layer for Sheetwright.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the generation
//! history (append-only) and the product catalog used as prompt context.
//!
//! **Access rules:**
//! - batch runs: read-write via [`Storage::open`]
//! - history inspection: read-only via [`Storage::open_readonly`]
//!
//! Catalog tables are maintained outside Sheetwright; the write helpers for
//! them exist for seeding and tests.

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use libsql::{Connection, Database, params};
use sheetwright_shared::{
    HistoryRecord, MAIN_DOMAIN, ProductScope, RelatedProduct, Result, SheetwrightError,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn db_err(e: libsql::Error) -> SheetwrightError {
    SheetwrightError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SheetwrightError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SheetwrightError::not_found(format!(
                "database {} does not exist",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SheetwrightError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SheetwrightError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Append a history record. Records are never updated afterwards.
    pub async fn insert_history(&self, record: &HistoryRecord) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO history (id, task_type, model, domain, parameters, fingerprint, output, source, origin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id.as_str(),
                    record.task_type.as_str(),
                    record.model.as_str(),
                    record.domain.as_str(),
                    record.parameters.as_str(),
                    record.fingerprint.as_str(),
                    record.output.as_str(),
                    record.source.as_str(),
                    record.origin.as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Most recent history records first.
    pub async fn list_history(&self, limit: u32) -> Result<Vec<HistoryRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, task_type, model, domain, parameters, fingerprint, output, source, origin, created_at
                 FROM history ORDER BY created_at DESC, id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_history(&row)?);
        }
        Ok(results)
    }

    /// Number of stored history records.
    pub async fn count_history(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM history", params![])
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Product catalog (read side)
    // -----------------------------------------------------------------------

    /// Products related to any of `names`, keyed by related product title.
    ///
    /// On the main domain only related products with a base link are listed;
    /// on a satellite domain only those published there with a satellite path.
    /// Unknown products and domains yield an empty map.
    pub async fn related_products(
        &self,
        domain: &str,
        names: &[String],
    ) -> Result<BTreeMap<String, RelatedProduct>> {
        let mut result = BTreeMap::new();

        for name in names {
            let mut rows = if is_main(domain) {
                self.conn
                    .query(
                        "SELECT r.title, '', r.base_link, rel.description
                         FROM product_relations rel
                         JOIN products p ON p.id = rel.product_id
                         JOIN products r ON r.id = rel.related_id
                         WHERE p.title = ?1 AND r.base_link IS NOT NULL AND r.base_link != ''
                         ORDER BY r.title",
                        params![name.as_str()],
                    )
                    .await
            } else {
                self.conn
                    .query(
                        "SELECT r.title, s.domain, r.satellite_path, rel.description
                         FROM product_relations rel
                         JOIN products p ON p.id = rel.product_id
                         JOIN products r ON r.id = rel.related_id
                         JOIN satellite_links sl ON sl.product_id = r.id
                         JOIN satellites s ON s.id = sl.satellite_id
                         WHERE p.title = ?1 AND s.domain = ?2
                           AND r.satellite_path IS NOT NULL AND r.satellite_path != ''
                         ORDER BY r.title",
                        params![name.as_str(), domain.trim()],
                    )
                    .await
            }
            .map_err(db_err)?;

            while let Some(row) = rows.next().await.map_err(db_err)? {
                let title: String = row.get(0).map_err(db_err)?;
                let description: String = row.get(3).unwrap_or_default();
                result.insert(
                    title,
                    RelatedProduct {
                        link: link_from_row(&row)?,
                        description,
                    },
                );
            }
        }

        Ok(result)
    }

    /// Product links on `domain`, keyed by product title.
    pub async fn product_links(
        &self,
        domain: &str,
        scope: ProductScope<'_>,
    ) -> Result<BTreeMap<String, String>> {
        let main = is_main(domain);
        let sql = match (main, scope) {
            (true, ProductScope::All) => {
                "SELECT title, '', base_link FROM products
                 WHERE base_link IS NOT NULL AND base_link != '' ORDER BY title"
            }
            (true, ProductScope::Named(_)) => {
                "SELECT title, '', base_link FROM products
                 WHERE base_link IS NOT NULL AND base_link != '' AND title = ?1"
            }
            (false, ProductScope::All) => {
                "SELECT p.title, s.domain, p.satellite_path
                 FROM products p
                 JOIN satellite_links sl ON sl.product_id = p.id
                 JOIN satellites s ON s.id = sl.satellite_id
                 WHERE s.domain = ?1 AND p.satellite_path IS NOT NULL AND p.satellite_path != ''
                 ORDER BY p.title"
            }
            (false, ProductScope::Named(_)) => {
                "SELECT p.title, s.domain, p.satellite_path
                 FROM products p
                 JOIN satellite_links sl ON sl.product_id = p.id
                 JOIN satellites s ON s.id = sl.satellite_id
                 WHERE s.domain = ?1 AND p.satellite_path IS NOT NULL AND p.satellite_path != ''
                   AND p.title = ?2"
            }
        };

        let domain = domain.trim();
        let mut result = BTreeMap::new();
        let names: Vec<Option<&str>> = match scope {
            ProductScope::All => vec![None],
            ProductScope::Named(names) => names.iter().map(|n| Some(n.as_str())).collect(),
        };

        for name in names {
            let mut rows = match (main, name) {
                (true, None) => self.conn.query(sql, params![]).await,
                (true, Some(name)) => self.conn.query(sql, params![name]).await,
                (false, None) => self.conn.query(sql, params![domain]).await,
                (false, Some(name)) => self.conn.query(sql, params![domain, name]).await,
            }
            .map_err(db_err)?;

            while let Some(row) = rows.next().await.map_err(db_err)? {
                let title: String = row.get(0).map_err(db_err)?;
                result.insert(title, link_from_row(&row)?);
            }
        }

        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Product catalog (seeding)
    // -----------------------------------------------------------------------

    /// Insert a satellite domain. Returns its row ID.
    pub async fn insert_satellite(&self, title: &str, domain: &str) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO satellites (title, domain) VALUES (?1, ?2)",
                params![title, domain],
            )
            .await
            .map_err(db_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert a product. Returns its row ID.
    pub async fn insert_product(
        &self,
        title: &str,
        base_link: Option<&str>,
        satellite_path: Option<&str>,
        description: &str,
    ) -> Result<i64> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO products (title, base_link, satellite_path, description)
                 VALUES (?1, ?2, ?3, ?4)",
                params![title, base_link, satellite_path, description],
            )
            .await
            .map_err(db_err)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Publish a product on a satellite domain.
    pub async fn publish_on_satellite(&self, product_id: i64, satellite_id: i64) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO satellite_links (product_id, satellite_id) VALUES (?1, ?2)",
                params![product_id, satellite_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Record that `related_id` is related to `product_id`.
    pub async fn relate_products(
        &self,
        product_id: i64,
        related_id: i64,
        description: &str,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO product_relations (product_id, related_id, description)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(product_id, related_id) DO UPDATE SET description = excluded.description",
                params![product_id, related_id, description],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

fn is_main(domain: &str) -> bool {
    let domain = domain.trim();
    domain.is_empty() || domain == MAIN_DOMAIN
}

/// Columns 1 and 2 of a catalog row hold `(satellite domain, path)`; the
/// domain is empty for base links, which are stored whole.
fn link_from_row(row: &libsql::Row) -> Result<String> {
    let domain: String = row.get(1).map_err(db_err)?;
    let path: String = row.get(2).map_err(db_err)?;
    if domain.is_empty() {
        Ok(path)
    } else {
        Ok(join_url(&domain, &path))
    }
}

/// Join a domain and a path with exactly one slash between them.
fn join_url(domain: &str, path: &str) -> String {
    match (domain.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{domain}{}", &path[1..]),
        (false, false) => format!("{domain}/{path}"),
        _ => format!("{domain}{path}"),
    }
}

/// Convert a database row to a [`HistoryRecord`].
fn row_to_history(row: &libsql::Row) -> Result<HistoryRecord> {
    let task_type: String = row.get(1).map_err(db_err)?;
    let origin: String = row.get(8).map_err(db_err)?;
    let created_at: String = row.get(9).map_err(db_err)?;

    Ok(HistoryRecord {
        id: row.get::<String>(0).map_err(db_err)?,
        task_type: task_type
            .parse()
            .map_err(|e| SheetwrightError::Storage(format!("corrupt history row: {e}")))?,
        model: row.get::<String>(2).map_err(db_err)?,
        domain: row.get::<String>(3).map_err(db_err)?,
        parameters: row.get::<String>(4).map_err(db_err)?,
        fingerprint: row.get::<String>(5).map_err(db_err)?,
        output: row.get::<String>(6).map_err(db_err)?,
        source: row.get::<String>(7).map_err(db_err)?,
        origin: origin
            .parse()
            .map_err(|e| SheetwrightError::Storage(format!("corrupt history row: {e}")))?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| SheetwrightError::Storage(format!("invalid date: {e}")))?,
    })
}
