//! The completion gate.
//!
//! One place converts a fully verified draft into permanent records.
//! Readiness is a read-only check that names exactly which prerequisite
//! is missing; finalize is exactly-once, enforced by the conditional
//! UPDATE on the draft row.

use sanare_classify::ProfessionClassification;
use sanare_core::error::{Result, SanareError};
use sanare_db::accounts::{self, NewAccount, ProfessionalProfile, User};
use sanare_db::{audit, drafts, identity_sessions};
use serde::Serialize;
use sqlx::{Pool, Sqlite};

/// Prerequisite labels reported by the readiness check.
pub const EMAIL_PREREQ: &str = "email_verification";
/// License prerequisite label.
pub const LICENSE_PREREQ: &str = "license_verification";
/// Identity prerequisite label.
pub const IDENTITY_PREREQ: &str = "identity_verification";

/// Read-only readiness report for a draft.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    /// Whether finalize would be accepted right now
    pub ready: bool,
    /// Prerequisites that have not passed yet
    pub missing: Vec<&'static str>,
}

/// The permanent records produced by a successful finalize.
#[derive(Debug, Serialize)]
pub struct CompletedRegistration {
    /// The new user account
    pub user: User,
    /// The verified professional profile
    pub profile: ProfessionalProfile,
}

/// Check whether a draft satisfies every prerequisite.
pub async fn readiness(pool: &Pool<Sqlite>, token: &str) -> Result<Readiness> {
    let draft = drafts::get(pool, token)
        .await?
        .ok_or_else(|| SanareError::NotFound(format!("no draft for token {token}")))?;

    let mut missing = Vec::new();

    if draft.status == drafts::DraftStatus::PendingEmail {
        missing.push(EMAIL_PREREQ);
    }
    if !draft.license_valid {
        missing.push(LICENSE_PREREQ);
    }

    let identity_ok = match &draft.identity_session_id {
        Some(session_id) => {
            let approved = identity_sessions::get(pool, session_id)
                .await?
                .is_some_and(|s| s.status == "Approved");
            approved && draft.identity_verified
        }
        None => false,
    };
    if !identity_ok {
        missing.push(IDENTITY_PREREQ);
    }

    Ok(Readiness {
        ready: missing.is_empty(),
        missing,
    })
}

/// Finalize a fully verified draft into permanent records.
///
/// # Errors
/// `Validation` naming the missing prerequisites when the draft is not
/// ready; `StateConflict` when the draft was already finalized or
/// terminated, including a concurrent finalize losing the race on the
/// draft row.
pub async fn finalize(pool: &Pool<Sqlite>, token: &str) -> Result<CompletedRegistration> {
    let draft = drafts::get(pool, token)
        .await?
        .ok_or_else(|| SanareError::NotFound(format!("no draft for token {token}")))?;

    if draft.status.is_terminal() {
        audit::record(pool, "system", "finalize", token, "denied", Some("draft already terminal"))
            .await?;
        return Err(SanareError::StateConflict(format!(
            "draft is already {}",
            draft.status
        )));
    }

    let report = readiness(pool, token).await?;
    if !report.ready {
        let detail = format!("registration not ready: {}", report.missing.join(", "));
        audit::record(pool, "system", "finalize", token, "denied", Some(&detail)).await?;
        return Err(SanareError::validation("registration", detail));
    }

    let classification: Option<ProfessionClassification> = draft
        .classification
        .as_ref()
        .and_then(|v| serde_json::from_value(v.clone()).ok());

    let allowed_dashboards = classification
        .as_ref()
        .map(|c| c.allowed_dashboards.clone())
        .unwrap_or_default();
    let requires_approval = classification.as_ref().is_some_and(|c| c.requires_approval);

    let document_number = draft
        .document_number
        .as_deref()
        .ok_or_else(|| SanareError::Internal("verified draft lacks a document number".into()))?;
    let profession = draft
        .profession
        .as_deref()
        .ok_or_else(|| SanareError::Internal("verified draft lacks a profession".into()))?;
    let primary_dashboard = draft.primary_dashboard.as_deref().unwrap_or("none");

    let account = NewAccount {
        email: &draft.email,
        first_name: draft.first_name.as_deref(),
        last_name: draft.last_name.as_deref(),
        document_number,
        profession,
        specialty: draft.specialty.as_deref(),
        primary_dashboard,
        allowed_dashboards: &allowed_dashboards,
        requires_approval,
        license_number: None,
        registration_date: None,
    };

    // Exactly-once: the conditional UPDATE on the draft is the gate, and it
    // commits together with the permanent records. A concurrent finalize
    // losing the race gets a conflict; a failed account insert rolls the
    // status flip back so the draft keeps its one finalize shot.
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| SanareError::Database(e.to_string()))?;
    drafts::complete(&mut *tx, token).await?;
    let (user, profile) = accounts::create_account_in(&mut tx, &account).await?;
    tx.commit()
        .await
        .map_err(|e| SanareError::Database(e.to_string()))?;

    audit::record(pool, "system", "finalize", token, "ok", None).await?;
    tracing::info!(token, user_id = %user.id, "registration finalized");

    Ok(CompletedRegistration { user, profile })
}
