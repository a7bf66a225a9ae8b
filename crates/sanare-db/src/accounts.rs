//! Permanent user accounts and professional profiles.
//!
//! Rows here are only ever created by the completion gate, after every
//! verification step has passed. There is no update path; corrections go
//! through support tooling, not this crate.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A permanent user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Account id
    pub id: String,
    /// Unique login email
    pub email: String,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

/// A verified professional profile attached to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    /// Profile id
    pub id: String,
    /// Owning account
    pub user_id: String,
    /// Normalized identity document number
    pub document_number: String,
    /// Raw profession text from the registry
    pub profession: String,
    /// Raw specialty text, if any
    pub specialty: Option<String>,
    /// Dashboard the profession maps to
    pub primary_dashboard: String,
    /// JSON array of dashboards the profile may access
    pub allowed_dashboards: Vec<String>,
    /// Whether an admin must sign off before first login
    pub requires_approval: bool,
    /// Registry license number
    pub license_number: Option<String>,
    /// Registry registration date as printed
    pub registration_date: Option<String>,
    /// When the profile was created
    pub created_at: DateTime<Utc>,
}

/// Everything the completion gate persists for one finished registration.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    /// Login email
    pub email: &'a str,
    /// Given name
    pub first_name: Option<&'a str>,
    /// Family name
    pub last_name: Option<&'a str>,
    /// Normalized document number
    pub document_number: &'a str,
    /// Profession as verified against the registry
    pub profession: &'a str,
    /// Specialty, if listed
    pub specialty: Option<&'a str>,
    /// Dashboard routing from classification
    pub primary_dashboard: &'a str,
    /// Dashboards the account may open
    pub allowed_dashboards: &'a [String],
    /// Admin sign-off required before first login
    pub requires_approval: bool,
    /// Registry license number
    pub license_number: Option<&'a str>,
    /// Registry registration date
    pub registration_date: Option<&'a str>,
}

/// Create a user and its professional profile in one transaction.
///
/// A duplicate email surfaces as [`DatabaseError::Conflict`].
pub async fn create_account(
    pool: &Pool<Sqlite>,
    account: &NewAccount<'_>,
) -> Result<(User, ProfessionalProfile)> {
    let mut tx = pool.begin().await?;
    let created = create_account_in(&mut tx, account).await?;
    tx.commit().await?;
    Ok(created)
}

/// Run the account inserts inside a caller-owned transaction.
///
/// The completion gate uses this to commit the draft's terminal status and
/// the permanent records together, so neither can exist without the other.
pub async fn create_account_in(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    account: &NewAccount<'_>,
) -> Result<(User, ProfessionalProfile)> {
    let user_id = uuid::Uuid::new_v4().to_string();
    let profile_id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();
    let dashboards_json = serde_json::to_string(account.allowed_dashboards)
        .map_err(|e| DatabaseError::Decode(format!("dashboards not serializable: {e}")))?;

    sqlx::query(
        "INSERT INTO users (id, email, first_name, last_name, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(account.email)
    .bind(account.first_name)
    .bind(account.last_name)
    .bind(created_at.to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if DatabaseError::is_unique_violation(&e) {
            DatabaseError::Conflict(format!("account already exists for {}", account.email))
        } else {
            DatabaseError::Sqlx(e)
        }
    })?;

    sqlx::query(
        "INSERT INTO professional_profiles
             (id, user_id, document_number, profession, specialty,
              primary_dashboard, allowed_dashboards, requires_approval,
              license_number, registration_date, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&profile_id)
    .bind(&user_id)
    .bind(account.document_number)
    .bind(account.profession)
    .bind(account.specialty)
    .bind(account.primary_dashboard)
    .bind(&dashboards_json)
    .bind(account.requires_approval)
    .bind(account.license_number)
    .bind(account.registration_date)
    .bind(created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    tracing::info!(email = account.email, profession = account.profession, "account created");

    Ok((
        User {
            id: user_id.clone(),
            email: account.email.to_string(),
            first_name: account.first_name.map(String::from),
            last_name: account.last_name.map(String::from),
            created_at,
        },
        ProfessionalProfile {
            id: profile_id,
            user_id,
            document_number: account.document_number.to_string(),
            profession: account.profession.to_string(),
            specialty: account.specialty.map(String::from),
            primary_dashboard: account.primary_dashboard.to_string(),
            allowed_dashboards: account.allowed_dashboards.to_vec(),
            requires_approval: account.requires_approval,
            license_number: account.license_number.map(String::from),
            registration_date: account.registration_date.map(String::from),
            created_at,
        },
    ))
}

/// Fetch a user by email.
pub async fn get_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, email, first_name, last_name, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        })
    })
    .transpose()
}

/// Fetch the professional profile for a user.
pub async fn get_profile(pool: &Pool<Sqlite>, user_id: &str) -> Result<Option<ProfessionalProfile>> {
    let row = sqlx::query(
        "SELECT id, user_id, document_number, profession, specialty,
                primary_dashboard, allowed_dashboards, requires_approval,
                license_number, registration_date, created_at
         FROM professional_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        let dashboards_json: String = row.try_get("allowed_dashboards")?;
        let allowed_dashboards = serde_json::from_str(&dashboards_json)
            .map_err(|e| DatabaseError::Decode(format!("bad dashboards JSON: {e}")))?;
        Ok(ProfessionalProfile {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            document_number: row.try_get("document_number")?,
            profession: row.try_get("profession")?,
            specialty: row.try_get("specialty")?,
            primary_dashboard: row.try_get("primary_dashboard")?,
            allowed_dashboards,
            requires_approval: row.try_get::<i64, _>("requires_approval")? != 0,
            license_number: row.try_get("license_number")?,
            registration_date: row.try_get("registration_date")?,
            created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        })
    })
    .transpose()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("bad timestamp: {e}")))
}
