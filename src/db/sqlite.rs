// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Send.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{AnalysisRecord, NewAnalysis, SystemStats};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn record_analysis(&self, row: &NewAnalysis<'_>) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::record_analysis(&conn, row)
    }

    async fn recent_analyses(&self, limit: u32, offset: u32) -> Result<Vec<AnalysisRecord>> {
        let conn = self.conn.lock().await;
        super::queries::recent_analyses(&conn, limit, offset)
    }

    async fn get_analysis(&self, id: i64) -> Result<Option<AnalysisRecord>> {
        let conn = self.conn.lock().await;
        super::queries::get_analysis(&conn, id)
    }

    async fn count_analyses(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::count_analyses(&conn)
    }

    async fn get_stats(&self) -> Result<SystemStats> {
        let conn = self.conn.lock().await;
        super::queries::get_stats(&conn)
    }
}
