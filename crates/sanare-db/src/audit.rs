//! Append-only audit trail.
//!
//! Every security-relevant action in the pipeline (verification attempts,
//! webhook transitions, admin overrides, finalize) writes a row here,
//! including on failure paths. Rows are never updated or deleted.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A single audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier
    pub id: String,
    /// Who acted: "system", "webhook", "admin:<id>", "user"
    pub actor: String,
    /// What happened, e.g. "license_lookup", "webhook_ingest", "admin_approve"
    pub action: String,
    /// Token or session id the action concerned
    pub subject_id: String,
    /// "ok", "denied", "error", "discrepancy", ...
    pub outcome: String,
    /// Free-form detail
    pub detail: Option<String>,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
}

/// Append an audit event.
pub async fn record(
    pool: &Pool<Sqlite>,
    actor: &str,
    action: &str,
    subject_id: &str,
    outcome: &str,
    detail: Option<&str>,
) -> Result<AuditEvent> {
    let id = uuid::Uuid::new_v4().to_string();
    let timestamp = Utc::now();

    sqlx::query(
        "INSERT INTO audit_log (id, actor, action, subject_id, outcome, detail, timestamp)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(actor)
    .bind(action)
    .bind(subject_id)
    .bind(outcome)
    .bind(detail)
    .bind(timestamp.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::debug!(actor, action, subject_id, outcome, "audit event recorded");

    Ok(AuditEvent {
        id,
        actor: actor.to_string(),
        action: action.to_string(),
        subject_id: subject_id.to_string(),
        outcome: outcome.to_string(),
        detail: detail.map(String::from),
        timestamp,
    })
}

/// Fetch events for a subject, newest first.
pub async fn for_subject(pool: &Pool<Sqlite>, subject_id: &str) -> Result<Vec<AuditEvent>> {
    let rows = sqlx::query(
        "SELECT id, actor, action, subject_id, outcome, detail, timestamp
         FROM audit_log WHERE subject_id = ? ORDER BY timestamp DESC",
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parse_row).collect()
}

/// Fetch the most recent events across all subjects.
pub async fn recent(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<AuditEvent>> {
    let rows = sqlx::query(
        "SELECT id, actor, action, subject_id, outcome, detail, timestamp
         FROM audit_log ORDER BY timestamp DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parse_row).collect()
}

fn parse_row(row: sqlx::sqlite::SqliteRow) -> Result<AuditEvent> {
    let ts_str: String = row.try_get("timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&ts_str)
        .map_err(|e| DatabaseError::Decode(format!("bad timestamp: {e}")))?
        .with_timezone(&Utc);

    Ok(AuditEvent {
        id: row.try_get("id")?,
        actor: row.try_get("actor")?,
        action: row.try_get("action")?,
        subject_id: row.try_get("subject_id")?,
        outcome: row.try_get("outcome")?,
        detail: row.try_get("detail")?,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    #[tokio::test]
    async fn test_record_and_query() {
        let pool = test_pool().await;
        record(&pool, "webhook", "webhook_ingest", "S1", "ok", None)
            .await
            .expect("record");
        record(
            &pool,
            "admin:42",
            "admin_approve",
            "S1",
            "denied",
            Some("status was Approved, not In Review"),
        )
        .await
        .expect("record");
        record(&pool, "system", "finalize", "token-1", "ok", None)
            .await
            .expect("record");

        let events = for_subject(&pool, "S1").await.expect("query");
        assert_eq!(events.len(), 2);

        let all = recent(&pool, 10).await.expect("recent");
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_paths_are_recorded_too() {
        let pool = test_pool().await;
        record(
            &pool,
            "system",
            "license_lookup",
            "token-1",
            "error",
            Some("registry unreachable"),
        )
        .await
        .expect("record failure");

        let events = for_subject(&pool, "token-1").await.expect("query");
        assert_eq!(events[0].outcome, "error");
    }
}
