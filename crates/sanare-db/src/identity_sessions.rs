//! Identity verification session storage.
//!
//! Sessions are written through a single guarded upsert. The guard encodes
//! the terminal-state rule: once a session is stored as Approved, Declined
//! or Expired, no later write changes it. Because the guard lives in the
//! SQL itself, concurrent and duplicate webhook deliveries need no external
//! locking.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Statuses that must never be overwritten by a later write.
pub const TERMINAL_STATUSES: [&str; 3] = ["Approved", "Declined", "Expired"];

/// Whether a stored status string is terminal.
#[must_use]
pub fn is_terminal(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// A stored identity verification session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySessionRecord {
    /// Provider-assigned session id
    pub session_id: String,
    /// Provider workflow the session runs
    pub workflow_id: Option<String>,
    /// Correlation value linking back to a registration draft
    pub vendor_data: Option<String>,
    /// Current status string, provider vocabulary
    pub status: String,
    /// Decision bundle JSON as delivered by the provider
    pub decision: Option<serde_json::Value>,
    /// Whether the latest write came from the authoritative webhook path
    pub authoritative: bool,
    /// First time we saw the session
    pub created_at: DateTime<Utc>,
    /// Last accepted write
    pub updated_at: DateTime<Utc>,
}

/// What a guarded upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Row inserted or status accepted
    Applied,
    /// Row exists in a terminal status; the write was refused by the guard
    RefusedTerminal,
}

/// Idempotent, terminal-guarded status upsert.
///
/// Repeated delivery of an identical payload converges on one row; a
/// non-terminal status arriving after a terminal one is silently refused.
pub async fn upsert_status(
    pool: &Pool<Sqlite>,
    session_id: &str,
    workflow_id: Option<&str>,
    vendor_data: Option<&str>,
    status: &str,
    decision: Option<&serde_json::Value>,
    authoritative: bool,
) -> Result<UpsertOutcome> {
    let now = Utc::now().to_rfc3339();
    let decision_json = decision
        .map(|d| {
            serde_json::to_string(d)
                .map_err(|e| DatabaseError::Decode(format!("decision not serializable: {e}")))
        })
        .transpose()?;

    let result = sqlx::query(
        "INSERT INTO identity_sessions
             (session_id, workflow_id, vendor_data, status, decision,
              authoritative, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (session_id) DO UPDATE SET
             workflow_id = COALESCE(excluded.workflow_id, identity_sessions.workflow_id),
             vendor_data = COALESCE(excluded.vendor_data, identity_sessions.vendor_data),
             status = excluded.status,
             decision = COALESCE(excluded.decision, identity_sessions.decision),
             authoritative = MAX(identity_sessions.authoritative, excluded.authoritative),
             updated_at = excluded.updated_at
         WHERE identity_sessions.status NOT IN ('Approved', 'Declined', 'Expired')",
    )
    .bind(session_id)
    .bind(workflow_id)
    .bind(vendor_data)
    .bind(status)
    .bind(decision_json)
    .bind(authoritative)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        Ok(UpsertOutcome::RefusedTerminal)
    } else {
        Ok(UpsertOutcome::Applied)
    }
}

/// Fetch a session by id.
pub async fn get(pool: &Pool<Sqlite>, session_id: &str) -> Result<Option<IdentitySessionRecord>> {
    let row = sqlx::query(
        "SELECT session_id, workflow_id, vendor_data, status, decision,
                authoritative, created_at, updated_at
         FROM identity_sessions WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    row.map(parse_row).transpose()
}

fn parse_row(row: sqlx::sqlite::SqliteRow) -> Result<IdentitySessionRecord> {
    let decision: Option<String> = row.try_get("decision")?;
    let decision = decision
        .map(|s| {
            serde_json::from_str(&s)
                .map_err(|e| DatabaseError::Decode(format!("bad decision JSON: {e}")))
        })
        .transpose()?;

    Ok(IdentitySessionRecord {
        session_id: row.try_get("session_id")?,
        workflow_id: row.try_get("workflow_id")?,
        vendor_data: row.try_get("vendor_data")?,
        status: row.try_get("status")?,
        decision,
        authoritative: row.try_get::<i64, _>("authoritative")? != 0,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("bad timestamp: {e}")))
}
