// Database trait: backend-agnostic async interface for the analysis store.
//
// Implementors: SqliteDatabase (wraps rusqlite), PgDatabase (wraps sqlx).
// All methods are async so both sync (rusqlite via Mutex) and native async
// (sqlx) backends fit behind a single interface.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{AnalysisRecord, NewAnalysis, SystemStats};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    /// Short backend name for status output ("sqlite", "postgres").
    fn backend_name(&self) -> &'static str;

    // --- Analyses ---

    /// Append an analysis and update the running totals atomically.
    async fn record_analysis(&self, row: &NewAnalysis<'_>) -> Result<i64>;

    /// Recent analyses, newest first.
    async fn recent_analyses(&self, limit: u32, offset: u32) -> Result<Vec<AnalysisRecord>>;

    async fn get_analysis(&self, id: i64) -> Result<Option<AnalysisRecord>>;

    async fn count_analyses(&self) -> Result<i64>;

    // --- Stats ---

    async fn get_stats(&self) -> Result<SystemStats>;
}
