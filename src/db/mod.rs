// Database layer: storage for recorded analyses and running totals.
//
// SQLite (rusqlite, "bundled" so there's no system dependency) is the
// default. The file lives wherever SKEPTIC_DB_PATH points (defaults to
// ./skeptic.db). PostgreSQL is available behind the `postgres` feature.

pub mod models;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod queries;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use traits::Database;

#[cfg(feature = "sqlite")]
use anyhow::Context;
use anyhow::Result;
use std::sync::Arc;

/// Open (or create) the SQLite database and run migrations.
#[cfg(feature = "sqlite")]
pub fn initialize_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    let conn = initialize(db_path)?;
    Ok(Arc::new(sqlite::SqliteDatabase::new(conn)))
}

/// Open an existing SQLite database (fails if it doesn't exist yet).
///
/// Migrations still run so a store created by an older build gets new columns.
#[cfg(feature = "sqlite")]
pub fn open_sqlite(db_path: &str) -> Result<Arc<dyn Database>> {
    if !std::path::Path::new(db_path).exists() {
        anyhow::bail!("Database not found at {db_path}. Run `skeptic init` first.");
    }
    let conn = initialize(db_path)?;
    Ok(Arc::new(sqlite::SqliteDatabase::new(conn)))
}

/// In-memory store, used by tests and `analyze --no-save` style callers.
#[cfg(feature = "sqlite")]
pub fn in_memory_sqlite() -> Result<Arc<dyn Database>> {
    let conn = rusqlite::Connection::open_in_memory()?;
    schema::create_tables(&conn)?;
    Ok(Arc::new(sqlite::SqliteDatabase::new(conn)))
}

#[cfg(feature = "sqlite")]
fn initialize(db_path: &str) -> Result<rusqlite::Connection> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {db_path}"))?;
        }
    }

    let conn = rusqlite::Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {db_path}"))?;

    // WAL for concurrent readers while the web server writes
    conn.pragma_update(None, "journal_mode", "WAL")?;
    schema::create_tables(&conn)?;

    Ok(conn)
}

/// Connect to PostgreSQL and run pending migrations.
#[cfg(feature = "postgres")]
pub async fn connect_postgres(database_url: &str) -> Result<Arc<dyn Database>> {
    let db = postgres::PgDatabase::connect(database_url).await?;
    Ok(Arc::new(db))
}
