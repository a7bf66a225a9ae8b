//! License lookup result cache.
//!
//! Rows are insert-only: a result is immutable once written for a given
//! fetch, and a newer fetch supersedes it by inserting a fresh row. Reads
//! take the newest row within the TTL.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A cached registry lookup result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedLookup {
    /// Row id
    pub id: String,
    /// Normalized document number the lookup was keyed by
    pub document_number: String,
    /// Whether the registry returned a record
    pub found: bool,
    /// Professional's name as printed by the registry
    pub holder_name: Option<String>,
    /// Raw profession text
    pub profession: Option<String>,
    /// Raw specialty text, if the registry listed one
    pub specialty: Option<String>,
    /// Registry license number
    pub license_number: Option<String>,
    /// Registration date as printed by the registry
    pub registration_date: Option<String>,
    /// Diagnostic for degraded lookups (`found = false`)
    pub error: Option<String>,
    /// Which registry produced the row
    pub source: String,
    /// When the scrape ran
    pub fetched_at: DateTime<Utc>,
    /// How long the scrape took
    pub processing_time_ms: i64,
}

/// Insert a lookup result. Never updates an existing row.
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    pool: &Pool<Sqlite>,
    document_number: &str,
    found: bool,
    holder_name: Option<&str>,
    profession: Option<&str>,
    specialty: Option<&str>,
    license_number: Option<&str>,
    registration_date: Option<&str>,
    error: Option<&str>,
    source: &str,
    processing_time_ms: i64,
) -> Result<CachedLookup> {
    let id = uuid::Uuid::new_v4().to_string();
    let fetched_at = Utc::now();

    sqlx::query(
        "INSERT INTO license_cache
             (id, document_number, found, holder_name, profession, specialty,
              license_number, registration_date, error, source, fetched_at,
              processing_time_ms)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(document_number)
    .bind(found)
    .bind(holder_name)
    .bind(profession)
    .bind(specialty)
    .bind(license_number)
    .bind(registration_date)
    .bind(error)
    .bind(source)
    .bind(fetched_at.to_rfc3339())
    .bind(processing_time_ms)
    .execute(pool)
    .await?;

    Ok(CachedLookup {
        id,
        document_number: document_number.to_string(),
        found,
        holder_name: holder_name.map(String::from),
        profession: profession.map(String::from),
        specialty: specialty.map(String::from),
        license_number: license_number.map(String::from),
        registration_date: registration_date.map(String::from),
        error: error.map(String::from),
        source: source.to_string(),
        fetched_at,
        processing_time_ms,
    })
}

/// Fetch the freshest cached result within the TTL, if any.
pub async fn get_fresh(
    pool: &Pool<Sqlite>,
    document_number: &str,
    ttl_hours: i64,
) -> Result<Option<CachedLookup>> {
    let cutoff = Utc::now() - Duration::hours(ttl_hours);

    let row = sqlx::query(
        "SELECT id, document_number, found, holder_name, profession, specialty,
                license_number, registration_date, error, source, fetched_at,
                processing_time_ms
         FROM license_cache
         WHERE document_number = ? AND fetched_at >= ?
         ORDER BY fetched_at DESC
         LIMIT 1",
    )
    .bind(document_number)
    .bind(cutoff.to_rfc3339())
    .fetch_optional(pool)
    .await?;

    row.map(parse_row).transpose()
}

fn parse_row(row: sqlx::sqlite::SqliteRow) -> Result<CachedLookup> {
    let fetched_at_str: String = row.try_get("fetched_at")?;
    let fetched_at = DateTime::parse_from_rfc3339(&fetched_at_str)
        .map_err(|e| DatabaseError::Decode(format!("bad fetched_at: {e}")))?
        .with_timezone(&Utc);

    Ok(CachedLookup {
        id: row.try_get("id")?,
        document_number: row.try_get("document_number")?,
        found: row.try_get::<i64, _>("found")? != 0,
        holder_name: row.try_get("holder_name")?,
        profession: row.try_get("profession")?,
        specialty: row.try_get("specialty")?,
        license_number: row.try_get("license_number")?,
        registration_date: row.try_get("registration_date")?,
        error: row.try_get("error")?,
        source: row.try_get("source")?,
        fetched_at,
        processing_time_ms: row.try_get("processing_time_ms")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    #[tokio::test]
    async fn test_insert_and_get_fresh() {
        let pool = test_pool().await;
        insert(
            &pool,
            "12345678-9",
            true,
            Some("ANA SILVA ROJAS"),
            Some("MÉDICO(A) CIRUJANO(A)"),
            None,
            Some("123456"),
            Some("2015-03-10"),
            None,
            "national-registry",
            4200,
        )
        .await
        .expect("insert");

        let cached = get_fresh(&pool, "12345678-9", 12)
            .await
            .expect("query")
            .expect("fresh hit");
        assert!(cached.found);
        assert_eq!(cached.profession.as_deref(), Some("MÉDICO(A) CIRUJANO(A)"));
    }

    #[tokio::test]
    async fn test_miss_for_unknown_document() {
        let pool = test_pool().await;
        let cached = get_fresh(&pool, "99999999-9", 12).await.expect("query");
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_newer_fetch_supersedes() {
        let pool = test_pool().await;
        let first = insert(
            &pool, "12345678-9", false, None, None, None, None, None,
            Some("registry unreachable"), "national-registry", 90_000,
        )
        .await
        .expect("insert degraded result");

        // Push the first fetch into the past so ordering is deterministic.
        sqlx::query("UPDATE license_cache SET fetched_at = ? WHERE id = ?")
            .bind((Utc::now() - Duration::minutes(5)).to_rfc3339())
            .bind(&first.id)
            .execute(&pool)
            .await
            .expect("age row");

        insert(
            &pool, "12345678-9", true, Some("ANA SILVA ROJAS"),
            Some("MÉDICO(A) CIRUJANO(A)"), None, None, None, None,
            "national-registry", 4100,
        )
        .await
        .expect("insert fresh result");

        let cached = get_fresh(&pool, "12345678-9", 12)
            .await
            .expect("query")
            .expect("hit");
        assert!(cached.found, "newest row wins");
    }

    #[tokio::test]
    async fn test_expired_rows_are_not_returned() {
        let pool = test_pool().await;
        let row = insert(
            &pool, "12345678-9", true, Some("ANA"), Some("MÉDICO(A) CIRUJANO(A)"),
            None, None, None, None, "national-registry", 100,
        )
        .await
        .expect("insert");

        sqlx::query("UPDATE license_cache SET fetched_at = ? WHERE id = ?")
            .bind((Utc::now() - Duration::hours(48)).to_rfc3339())
            .bind(&row.id)
            .execute(&pool)
            .await
            .expect("age row");

        assert!(get_fresh(&pool, "12345678-9", 12)
            .await
            .expect("query")
            .is_none());
    }
}
