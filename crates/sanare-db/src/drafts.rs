//! Registration draft storage.
//!
//! A draft is the in-flight registration record keyed by its verification
//! token. Every pipeline step (email code, license check, identity check,
//! finalize) reads and mutates the draft here; nothing pipeline-related is
//! held in process memory.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Lifetime of a draft before it expires.
const DRAFT_TTL_HOURS: i64 = 24;

/// Status of a registration draft.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Created; waiting for the email code to be confirmed
    PendingEmail,
    /// Email code confirmed
    EmailVerified,
    /// Registry lookup classified the holder as a valid professional
    LicenseVerified,
    /// KYC session approved with passing sub-checks
    IdentityVerified,
    /// Finalized into permanent records
    Completed,
    /// Cancelled by the user
    Cancelled,
    /// TTL elapsed before completion
    Expired,
}

impl DraftStatus {
    /// Terminal statuses admit no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    /// Stable string form stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingEmail => "pending_email",
            Self::EmailVerified => "email_verified",
            Self::LicenseVerified => "license_verified",
            Self::IdentityVerified => "identity_verified",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Parse from the stored string form.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending_email" => Ok(Self::PendingEmail),
            "email_verified" => Ok(Self::EmailVerified),
            "license_verified" => Ok(Self::LicenseVerified),
            "identity_verified" => Ok(Self::IdentityVerified),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(DatabaseError::Decode(format!(
                "unknown draft status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registration draft row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationDraft {
    /// Opaque token keying the draft
    pub verification_token: String,
    /// Registrant email (lowercased)
    pub email: String,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Document type used for the license lookup
    pub document_type: Option<String>,
    /// Normalized document number
    pub document_number: Option<String>,
    /// Current status
    pub status: DraftStatus,
    /// SHA-256 of the outstanding email code
    pub email_code_hash: Option<String>,
    /// When the outstanding email code stops being accepted
    pub email_code_expires_at: Option<DateTime<Utc>>,
    /// Whether a registry lookup has produced a result for this draft
    pub license_checked: bool,
    /// Whether the classifier judged the holder a valid professional
    pub license_valid: bool,
    /// Raw profession text from the registry
    pub profession: Option<String>,
    /// Assigned specialty
    pub specialty: Option<String>,
    /// Primary dashboard from the classification
    pub primary_dashboard: Option<String>,
    /// Full classification JSON
    pub classification: Option<serde_json::Value>,
    /// KYC session currently linked to the draft
    pub identity_session_id: Option<String>,
    /// Whether the identity step fully passed
    pub identity_verified: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Expiry time (24 h after creation)
    pub expires_at: DateTime<Utc>,
}

/// Create a new draft in `pending_email` status.
///
/// The partial unique index on active emails enforces the "one non-terminal
/// draft per email" invariant; a second active draft for the same email
/// surfaces as `DatabaseError::Conflict`.
pub async fn create(
    pool: &Pool<Sqlite>,
    token: &str,
    email: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<RegistrationDraft> {
    let created_at = Utc::now();
    let expires_at = created_at + Duration::hours(DRAFT_TTL_HOURS);

    let result = sqlx::query(
        "INSERT INTO registration_drafts
             (verification_token, email, first_name, last_name, status, created_at, expires_at)
         VALUES (?, ?, ?, ?, 'pending_email', ?, ?)",
    )
    .bind(token)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(created_at.to_rfc3339())
    .bind(expires_at.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(RegistrationDraft {
            verification_token: token.to_string(),
            email: email.to_string(),
            first_name: first_name.map(String::from),
            last_name: last_name.map(String::from),
            document_type: None,
            document_number: None,
            status: DraftStatus::PendingEmail,
            email_code_hash: None,
            email_code_expires_at: None,
            license_checked: false,
            license_valid: false,
            profession: None,
            specialty: None,
            primary_dashboard: None,
            classification: None,
            identity_session_id: None,
            identity_verified: false,
            created_at,
            expires_at,
        }),
        Err(e) if DatabaseError::is_unique_violation(&e) => Err(DatabaseError::Conflict(format!(
            "an active registration already exists for {email}"
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Fetch a draft by token.
pub async fn get(pool: &Pool<Sqlite>, token: &str) -> Result<Option<RegistrationDraft>> {
    let row = sqlx::query(
        "SELECT verification_token, email, first_name, last_name, document_type,
                document_number, status, email_code_hash, email_code_expires_at,
                license_checked, license_valid, profession, specialty,
                primary_dashboard, classification, identity_session_id,
                identity_verified, created_at, expires_at
         FROM registration_drafts WHERE verification_token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    row.map(parse_row).transpose()
}

/// Fetch the active (non-terminal) draft for an email, if any.
pub async fn get_active_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<RegistrationDraft>> {
    let row = sqlx::query(
        "SELECT verification_token, email, first_name, last_name, document_type,
                document_number, status, email_code_hash, email_code_expires_at,
                license_checked, license_valid, profession, specialty,
                primary_dashboard, classification, identity_session_id,
                identity_verified, created_at, expires_at
         FROM registration_drafts
         WHERE email = ? AND status NOT IN ('completed', 'cancelled', 'expired')",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.map(parse_row).transpose()
}

/// Fetch the draft linked to a KYC session, if any.
pub async fn get_by_session_id(
    pool: &Pool<Sqlite>,
    session_id: &str,
) -> Result<Option<RegistrationDraft>> {
    let row = sqlx::query(
        "SELECT verification_token, email, first_name, last_name, document_type,
                document_number, status, email_code_hash, email_code_expires_at,
                license_checked, license_valid, profession, specialty,
                primary_dashboard, classification, identity_session_id,
                identity_verified, created_at, expires_at
         FROM registration_drafts WHERE identity_session_id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    row.map(parse_row).transpose()
}

/// Store a freshly issued email code hash and its expiry.
pub async fn set_email_code(
    pool: &Pool<Sqlite>,
    token: &str,
    code_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE registration_drafts
         SET email_code_hash = ?, email_code_expires_at = ?
         WHERE verification_token = ?",
    )
    .bind(code_hash)
    .bind(expires_at.to_rfc3339())
    .bind(token)
    .execute(pool)
    .await?;

    ensure_updated(result.rows_affected(), token)
}

/// Move a draft to a new status.
pub async fn set_status(pool: &Pool<Sqlite>, token: &str, status: DraftStatus) -> Result<()> {
    let result = sqlx::query(
        "UPDATE registration_drafts SET status = ? WHERE verification_token = ?",
    )
    .bind(status.as_str())
    .bind(token)
    .execute(pool)
    .await?;

    ensure_updated(result.rows_affected(), token)
}

/// Record the license lookup outcome and its classification on the draft.
#[allow(clippy::too_many_arguments)]
pub async fn set_license_result(
    pool: &Pool<Sqlite>,
    token: &str,
    document_type: &str,
    document_number: &str,
    valid: bool,
    profession: Option<&str>,
    specialty: Option<&str>,
    primary_dashboard: Option<&str>,
    classification: &serde_json::Value,
) -> Result<()> {
    let classification_json = serde_json::to_string(classification)
        .map_err(|e| DatabaseError::Decode(format!("classification not serializable: {e}")))?;

    let result = sqlx::query(
        "UPDATE registration_drafts
         SET document_type = ?, document_number = ?, license_checked = 1,
             license_valid = ?, profession = ?, specialty = ?,
             primary_dashboard = ?, classification = ?,
             status = CASE WHEN ? AND status = 'email_verified'
                           THEN 'license_verified' ELSE status END
         WHERE verification_token = ?",
    )
    .bind(document_type)
    .bind(document_number)
    .bind(valid)
    .bind(profession)
    .bind(specialty)
    .bind(primary_dashboard)
    .bind(classification_json)
    .bind(valid)
    .bind(token)
    .execute(pool)
    .await?;

    ensure_updated(result.rows_affected(), token)
}

/// Link a KYC session to the draft.
pub async fn set_identity_session(
    pool: &Pool<Sqlite>,
    token: &str,
    session_id: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE registration_drafts SET identity_session_id = ? WHERE verification_token = ?",
    )
    .bind(session_id)
    .bind(token)
    .execute(pool)
    .await?;

    ensure_updated(result.rows_affected(), token)
}

/// Mark the identity step verified (or explicitly unverified).
pub async fn set_identity_verified(
    pool: &Pool<Sqlite>,
    token: &str,
    verified: bool,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE registration_drafts
         SET identity_verified = ?,
             status = CASE WHEN ? AND status IN ('license_verified', 'email_verified')
                           THEN 'identity_verified' ELSE status END
         WHERE verification_token = ?",
    )
    .bind(verified)
    .bind(verified)
    .bind(token)
    .execute(pool)
    .await?;

    ensure_updated(result.rows_affected(), token)
}

/// Atomically mark a draft completed.
///
/// Returns `Conflict` if the draft was already in a terminal state; this is
/// the exactly-once mechanism behind the completion gate. Generic over the
/// executor so the gate can run it inside the same transaction that creates
/// the permanent records.
pub async fn complete<'e, E>(executor: E, token: &str) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE registration_drafts SET status = 'completed'
         WHERE verification_token = ?
           AND status NOT IN ('completed', 'cancelled', 'expired')",
    )
    .bind(token)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::Conflict(format!(
            "draft '{token}' is already finalized or terminated"
        )));
    }
    Ok(())
}

/// Expire all non-terminal drafts past their TTL. Returns how many changed.
pub async fn expire_stale(pool: &Pool<Sqlite>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE registration_drafts SET status = 'expired'
         WHERE status NOT IN ('completed', 'cancelled', 'expired')
           AND expires_at < ?",
    )
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn ensure_updated(rows_affected: u64, token: &str) -> Result<()> {
    if rows_affected == 0 {
        return Err(DatabaseError::NotFound(format!("draft '{token}'")));
    }
    Ok(())
}

fn parse_row(row: sqlx::sqlite::SqliteRow) -> Result<RegistrationDraft> {
    let status_str: String = row.try_get("status")?;
    let classification: Option<String> = row.try_get("classification")?;
    let classification = classification
        .map(|s| {
            serde_json::from_str(&s)
                .map_err(|e| DatabaseError::Decode(format!("bad classification JSON: {e}")))
        })
        .transpose()?;

    Ok(RegistrationDraft {
        verification_token: row.try_get("verification_token")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        document_type: row.try_get("document_type")?,
        document_number: row.try_get("document_number")?,
        status: DraftStatus::parse(&status_str)?,
        email_code_hash: row.try_get("email_code_hash")?,
        email_code_expires_at: parse_optional_ts(row.try_get("email_code_expires_at")?),
        license_checked: row.try_get::<i64, _>("license_checked")? != 0,
        license_valid: row.try_get::<i64, _>("license_valid")? != 0,
        profession: row.try_get("profession")?,
        specialty: row.try_get("specialty")?,
        primary_dashboard: row.try_get("primary_dashboard")?,
        classification,
        identity_session_id: row.try_get("identity_session_id")?,
        identity_verified: row.try_get::<i64, _>("identity_verified")? != 0,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?),
        expires_at: parse_ts(&row.try_get::<String, _>("expires_at")?),
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

fn parse_optional_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
