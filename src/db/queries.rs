// Database queries: every SQL statement against the SQLite store.
//
// Free functions over a borrowed Connection so tests can run them against
// an in-memory database without the async wrapper.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{AnalysisRecord, NewAnalysis, SystemStats};

// --- Analyses ---

/// Append an analysis and bump the running totals in one transaction.
/// Returns the new row ID.
pub fn record_analysis(conn: &Connection, row: &NewAnalysis<'_>) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO analyses (
            title, content, prediction, confidence, fake_probability, real_probability,
            suspicion_score, pipeline_score, token_diversity, text_length, method, source,
            ip_address
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            row.title,
            row.content,
            row.prediction,
            row.confidence,
            row.fake_probability,
            row.real_probability,
            row.suspicion_score,
            row.pipeline_score,
            row.token_diversity,
            row.text_length,
            row.method,
            row.source,
            row.ip_address,
        ],
    )?;
    let id = tx.last_insert_rowid();

    let (fake, real) = if row.is_fake { (1, 0) } else { (0, 1) };
    tx.execute(
        "INSERT INTO system_stats (id, total_analyses, fake_detected, real_detected, last_updated)
         VALUES (1, 1, ?1, ?2, datetime('now'))
         ON CONFLICT(id) DO UPDATE SET
            total_analyses = total_analyses + 1,
            fake_detected = fake_detected + ?1,
            real_detected = real_detected + ?2,
            last_updated = datetime('now')",
        params![fake, real],
    )?;

    tx.commit()?;
    Ok(id)
}

/// Most recent analyses first. Ties on timestamp fall back to insertion order.
pub fn recent_analyses(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<AnalysisRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, content, prediction, confidence, fake_probability, real_probability,
                suspicion_score, pipeline_score, token_diversity, text_length, method, source,
                ip_address, created_at
         FROM analyses
         ORDER BY created_at DESC, id DESC
         LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt
        .query_map(params![limit, offset], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Look up a single analysis by ID.
pub fn get_analysis(conn: &Connection, id: i64) -> Result<Option<AnalysisRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, content, prediction, confidence, fake_probability, real_probability,
                suspicion_score, pipeline_score, token_diversity, text_length, method, source,
                ip_address, created_at
         FROM analyses WHERE id = ?1",
    )?;
    let record = stmt.query_row(params![id], row_to_record).optional()?;
    Ok(record)
}

pub fn count_analyses(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))?;
    Ok(count)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    Ok(AnalysisRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        prediction: row.get(3)?,
        confidence: row.get(4)?,
        fake_probability: row.get(5)?,
        real_probability: row.get(6)?,
        suspicion_score: row.get(7)?,
        pipeline_score: row.get(8)?,
        token_diversity: row.get(9)?,
        text_length: row.get(10)?,
        method: row.get(11)?,
        source: row.get(12)?,
        ip_address: row.get(13)?,
        created_at: row.get(14)?,
    })
}

// --- Stats ---

pub fn get_stats(conn: &Connection) -> Result<SystemStats> {
    let totals = conn
        .query_row(
            "SELECT total_analyses, fake_detected, real_detected, last_updated
             FROM system_stats WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    let (total, fake, real, last_updated) = totals.unwrap_or((0, 0, 0, None));
    Ok(SystemStats::from_totals(total, fake, real, last_updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;
    use crate::detector::{Breakdown, Verdict};
    use crate::input::{AnalysisInput, InputLimits};
    use crate::signals::tokens::TokenFeatures;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn verdict(fake_probability: f64) -> Verdict {
        Verdict::from_probability(
            fake_probability,
            "Fallback Analysis".to_string(),
            Breakdown {
                suspicion_patterns: 0.2,
                pipeline_score: 0.35,
                bert_features: Some(TokenFeatures {
                    token_diversity: 0.75,
                    text_length: 12,
                }),
            },
        )
    }

    fn record(conn: &Connection, title: &str, fake_probability: f64) -> i64 {
        let input = AnalysisInput::new(title, "Some body text", &InputLimits::default()).unwrap();
        let verdict = verdict(fake_probability);
        let row = NewAnalysis::from_verdict(&input, &verdict, "cli").unwrap();
        record_analysis(conn, &row).unwrap()
    }

    #[test]
    fn test_record_and_read_back() {
        let conn = setup();
        let id = record(&conn, "Headline", 0.8);

        let stored = get_analysis(&conn, id).unwrap().unwrap();
        assert_eq!(stored.title, "Headline");
        assert_eq!(stored.prediction, "Fake");
        assert_eq!(stored.token_diversity, Some(0.75));
        assert_eq!(stored.text_length, Some(12));
        assert_eq!(stored.source, "cli");
        assert_eq!(stored.ip_address, None);
        assert!((stored.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_caller_address_is_stored() {
        let conn = setup();
        let input = AnalysisInput::new("Headline", "Body", &InputLimits::default()).unwrap();
        let verdict = verdict(0.3);
        let row = NewAnalysis::from_verdict(&input, &verdict, "web")
            .unwrap()
            .with_ip_address(Some("198.51.100.4"));
        let id = record_analysis(&conn, &row).unwrap();

        let stored = get_analysis(&conn, id).unwrap().unwrap();
        assert_eq!(stored.ip_address.as_deref(), Some("198.51.100.4"));
        // Listing JSON never carries it
        let json = serde_json::to_value(&stored).unwrap();
        assert!(json.get("ip_address").is_none());
    }

    #[test]
    fn test_missing_analysis_is_none() {
        let conn = setup();
        assert!(get_analysis(&conn, 42).unwrap().is_none());
    }

    #[test]
    fn test_stats_track_recorded_verdicts() {
        let conn = setup();
        assert_eq!(get_stats(&conn).unwrap().total_analyses, 0);

        record(&conn, "one", 0.9);
        record(&conn, "two", 0.1);
        record(&conn, "three", 0.2);

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.total_analyses, 3);
        assert_eq!(stats.fake_detected, 1);
        assert_eq!(stats.real_detected, 2);
        assert_eq!(stats.fake_percentage, 33.3);
        assert!(stats.last_updated.is_some());
        assert_eq!(count_analyses(&conn).unwrap(), 3);
    }

    #[test]
    fn test_recent_analyses_newest_first_with_paging() {
        let conn = setup();
        for title in ["a", "b", "c"] {
            record(&conn, title, 0.3);
        }

        let first_page = recent_analyses(&conn, 2, 0).unwrap();
        let titles: Vec<&str> = first_page.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);

        let second_page = recent_analyses(&conn, 2, 2).unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].title, "a");
    }
}
