// PgDatabase: PostgreSQL backend implementing the Database trait.
//
// Uses sqlx PgPool for native async queries. All queries use runtime
// parameter binding (not compile-time macros) to avoid requiring
// DATABASE_URL at compile time.
//
// Differences from SQLite: TIMESTAMPTZ for timestamps, $1/$2 parameters,
// and GENERATED ALWAYS AS IDENTITY for row IDs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_postgres::{PgRow, Postgres};

use super::models::{AnalysisRecord, NewAnalysis, SystemStats};
use super::traits::Database;

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

const RECORD_COLUMNS: &str = "id, title, content, prediction, confidence, fake_probability,
    real_probability, suspicion_score, pipeline_score, token_diversity, text_length, method,
    source, ip_address, to_char(created_at, 'YYYY-MM-DD HH24:MI:SS') AS created_at";

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending migrations.
    ///
    /// Holds a session-level advisory lock for the whole sequence so two
    /// processes starting together don't apply the same migration. The lock
    /// and unlock must run on the same physical connection, so a dedicated
    /// connection is held for it. The unlock runs even if a migration fails.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "SKEPTIC\0" as a big-endian i64.
        const MIGRATION_LOCK_KEY: i64 = 0x534B_4550_5449_4300_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [
                (
                    1,
                    include_str!("../../migrations/postgres/0001_initial.sql"),
                ),
                (
                    2,
                    include_str!("../../migrations/postgres/0002_ip_address.sql"),
                ),
            ];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .unwrap_or(false);

                if !applied {
                    // Schema change and schema_version insert commit together.
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql).execute(&mut *tx).await?;
                    tx.commit().await?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        // Migration error takes priority over unlock error.
        migration_result?;
        unlock_result?;

        Ok(())
    }
}

fn row_to_record(row: &PgRow) -> AnalysisRecord {
    AnalysisRecord {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        prediction: row.get("prediction"),
        confidence: row.get("confidence"),
        fake_probability: row.get("fake_probability"),
        real_probability: row.get("real_probability"),
        suspicion_score: row.get("suspicion_score"),
        pipeline_score: row.get("pipeline_score"),
        token_diversity: row.get("token_diversity"),
        text_length: row.get("text_length"),
        method: row.get("method"),
        source: row.get("source"),
        ip_address: row.get("ip_address"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn table_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn record_analysis(&self, row: &NewAnalysis<'_>) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx_core::query::query(
            "INSERT INTO analyses (
                title, content, prediction, confidence, fake_probability, real_probability,
                suspicion_score, pipeline_score, token_diversity, text_length, method, source,
                ip_address
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING id",
        )
        .bind(row.title)
        .bind(row.content)
        .bind(row.prediction)
        .bind(row.confidence)
        .bind(row.fake_probability)
        .bind(row.real_probability)
        .bind(row.suspicion_score)
        .bind(row.pipeline_score)
        .bind(row.token_diversity)
        .bind(row.text_length)
        .bind(row.method)
        .bind(row.source)
        .bind(row.ip_address)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert analysis")?;
        let id: i64 = inserted.get(0);

        let (fake, real) = if row.is_fake { (1_i64, 0_i64) } else { (0, 1) };
        sqlx_core::query::query(
            "INSERT INTO system_stats (id, total_analyses, fake_detected, real_detected, last_updated)
             VALUES (1, 1, $1, $2, NOW())
             ON CONFLICT(id) DO UPDATE SET
                total_analyses = system_stats.total_analyses + 1,
                fake_detected = system_stats.fake_detected + $1,
                real_detected = system_stats.real_detected + $2,
                last_updated = NOW()",
        )
        .bind(fake)
        .bind(real)
        .execute(&mut *tx)
        .await
        .context("Failed to update running totals")?;

        tx.commit().await?;
        Ok(id)
    }

    async fn recent_analyses(&self, limit: u32, offset: u32) -> Result<Vec<AnalysisRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM analyses
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2"
        );
        let rows = sqlx_core::query::query(&sql)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn get_analysis(&self, id: i64) -> Result<Option<AnalysisRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM analyses WHERE id = $1");
        let row = sqlx_core::query::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn count_analyses(&self) -> Result<i64> {
        let row = sqlx_core::query::query("SELECT COUNT(*)::bigint FROM analyses")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn get_stats(&self) -> Result<SystemStats> {
        let row = sqlx_core::query::query(
            "SELECT total_analyses, fake_detected, real_detected,
                    to_char(last_updated, 'YYYY-MM-DD HH24:MI:SS') AS last_updated
             FROM system_stats WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => SystemStats::from_totals(
                r.get::<i64, _>("total_analyses"),
                r.get::<i64, _>("fake_detected"),
                r.get::<i64, _>("real_detected"),
                r.get::<Option<String>, _>("last_updated"),
            ),
            None => SystemStats::from_totals(0, 0, 0, None),
        })
    }
}
