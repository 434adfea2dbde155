//! Minimal async ORM over sqlite + sqlx.
//!
//! Usage:
//! let db = Db::connect_with("sqlite::memory:", 1).await?;
//! db.execute("CREATE TABLE ...").await?;
//! db.fetch_all("SELECT ...").await?
//!
//! Schema management comes in two flavours that share one bookkeeping table:
//! models implementing [`Model`] register themselves with `inventory` and are
//! created or extended by [`auto_migrate`], while plain `*.sql` files (seed
//! data, one-off fixes) are applied in filename order by
//! [`apply_migration_files`].
pub use futures::future::BoxFuture;
use log::{debug, info};
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::Row;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, SqlitePool};
use std::fs;
use std::sync::Arc;
use walkdir::WalkDir;

const MIGRATIONS_TABLE: &str = "__registrar_migrations";

/// An async database pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

pub struct Migration(pub fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>);

impl std::ops::Deref for Migration {
    type Target = fn(Arc<Db>) -> BoxFuture<'static, Result<(), sqlx::Error>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

async fn ensure_migrations_table(db: &Db) -> Result<(), sqlx::Error> {
    db.execute(&format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            schema_sql TEXT,
            hash TEXT,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (kind, name)
        )"
    ))
    .await
}

#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn create_table_sql() -> String;
    fn columns() -> Vec<(String, String)>;

    async fn migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql();
        let schema_hash = hash(&create_sql);

        ensure_migrations_table(&db).await?;

        let recorded: Option<String> = sqlx::query_scalar(&format!(
            "SELECT hash FROM {MIGRATIONS_TABLE} WHERE kind = 'model' AND name = ?"
        ))
        .bind(table_name)
        .fetch_optional(db.pool())
        .await?;

        let Some(recorded) = recorded else {
            db.execute(&create_sql).await?;
            sqlx::query(&format!(
                "INSERT INTO {MIGRATIONS_TABLE} (kind, name, schema_sql, hash) VALUES ('model', ?, ?, ?)"
            ))
            .bind(table_name)
            .bind(&create_sql)
            .bind(&schema_hash)
            .execute(db.pool())
            .await?;
            info!("Migrated `{}` (table created, initial schema applied).", table_name);
            return Ok(());
        };

        if recorded == schema_hash {
            info!("No schema changes detected for `{}`.", table_name);
            return Ok(());
        }

        // Columns currently present in the database
        let existing: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", table_name))
            .fetch_all(db.pool())
            .await?
            .into_iter()
            .map(|row: SqliteRow| row.get::<String, _>("name"))
            .collect();

        let mut added = Vec::new();
        for (name, sqltype) in Self::columns() {
            if !existing.contains(&name) {
                db.execute(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    table_name, name, sqltype
                ))
                .await?;
                added.push((name, sqltype));
            }
        }

        if added.is_empty() {
            info!("Schema of `{}` changed without new columns; hash updated.", table_name);
        } else {
            info!("Schema changes detected for `{}`, added columns:", table_name);
            for (name, sqltype) in &added {
                info!("  - {} {}", name, sqltype);
            }
        }
        sqlx::query(&format!(
            "UPDATE {MIGRATIONS_TABLE} \
             SET schema_sql = ?, hash = ?, applied_at = CURRENT_TIMESTAMP \
             WHERE kind = 'model' AND name = ?"
        ))
        .bind(&create_sql)
        .bind(&schema_hash)
        .bind(table_name)
        .execute(db.pool())
        .await?;
        Ok(())
    }
}

fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI. In-memory
    /// databases should use a pool of 1 so every query sees the same database.
    pub async fn connect_with(uri: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        info!("Connecting to SQLite database at URI: {}", uri);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(uri)
            .await?;
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute an arbitrary SQL statement, e.g. DDL, INSERT, UPDATE.
    pub async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        match &result {
            Ok(_) => debug!("SQL executed successfully"),
            Err(e) => log::error!("SQL execution failed: {}", e),
        }
        result.map(|_| ())
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>, sqlx::Error> {
        debug!("Fetching rows with SQL: {}", sql);
        let result = sqlx::query_as(sql).fetch_all(&self.pool).await;
        match &result {
            Ok(rows) => debug!("Fetched {} rows successfully", rows.len()),
            Err(e) => log::error!("Row fetch failed: {}", e),
        }
        result
    }
}

/// Migrate all registered models using the inventory pattern.
pub async fn auto_migrate(db: Arc<Db>) -> Result<(), sqlx::Error> {
    info!("Starting auto migration of all registered models...");
    let mut total = 0;
    for m in inventory::iter::<Migration> {
        total += 1;
        if let Err(e) = m(db.clone()).await {
            log::error!("Auto-migration failed for a model: {}", e);
            return Err(e);
        }
    }
    info!("Auto migration completed for {} models.", total);
    Ok(())
}

/// Applies `*.sql` files found directly in `migrations_dir`, in filename order.
/// Files already recorded in the migrations table are skipped; a missing
/// directory applies nothing. Returns the names of the files applied.
pub async fn apply_migration_files(
    db: Arc<Db>,
    migrations_dir: &str,
) -> Result<Vec<String>, sqlx::Error> {
    ensure_migrations_table(&db).await?;

    let mut files: Vec<_> = WalkDir::new(migrations_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|f| f.file_type().is_file())
        .filter(|f| f.path().extension().map(|e| e == "sql").unwrap_or(false))
        .collect();
    files.sort_by_key(|f| f.file_name().to_os_string());

    let mut applied = Vec::new();
    for entry in files {
        let filename = entry.file_name().to_string_lossy().to_string();
        let seen: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM {MIGRATIONS_TABLE} WHERE kind = 'file' AND name = ?"
        ))
        .bind(&filename)
        .fetch_optional(db.pool())
        .await?;
        if seen.is_some() {
            info!("Migration `{}` already applied.", filename);
            continue;
        }

        let sql = fs::read_to_string(entry.path()).map_err(sqlx::Error::Io)?;
        info!("Applying migration file: {}", filename);
        db.execute(&sql).await?;
        sqlx::query(&format!(
            "INSERT INTO {MIGRATIONS_TABLE} (kind, name, hash) VALUES ('file', ?, ?)"
        ))
        .bind(&filename)
        .bind(hash(&sql))
        .execute(db.pool())
        .await?;
        info!("Migration `{}` applied.", filename);
        applied.push(filename);
    }

    Ok(applied)
}
