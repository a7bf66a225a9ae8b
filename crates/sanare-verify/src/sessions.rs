//! Identity session management: creation and administrative override.

use sanare_core::config::KycConfig;
use sanare_core::error::{Result, SanareError};
use sanare_kyc::{ContactDetails, CreateSessionRequest, CreatedSession, IdentityProvider, SessionStatus};
use sanare_db::{audit, drafts, identity_sessions};
use sqlx::{Pool, Sqlite};

/// Create an identity verification session for a draft.
///
/// The draft must have a verified email and complete contact data before
/// the provider is involved; incomplete drafts fail validation without an
/// upstream call.
pub async fn start_identity_session(
    pool: &Pool<Sqlite>,
    provider: &dyn IdentityProvider,
    config: &KycConfig,
    token: &str,
) -> Result<CreatedSession> {
    let draft = drafts::get(pool, token)
        .await?
        .ok_or_else(|| SanareError::NotFound(format!("no draft for token {token}")))?;

    if draft.status.is_terminal() {
        return Err(SanareError::StateConflict(format!(
            "draft is {}, cannot start identity verification",
            draft.status
        )));
    }
    if draft.status == drafts::DraftStatus::PendingEmail {
        return Err(SanareError::StateConflict(
            "email must be verified before identity verification".to_string(),
        ));
    }
    if draft.first_name.is_none() || draft.last_name.is_none() {
        return Err(SanareError::validation(
            "name",
            "first and last name are required before identity verification",
        ));
    }
    if config.workflow_id.trim().is_empty() {
        return Err(SanareError::validation(
            "workflow_id",
            "identity workflow is not configured",
        ));
    }

    let request = CreateSessionRequest {
        workflow_id: config.workflow_id.clone(),
        vendor_data: token.to_string(),
        callback: config.callback_url.clone(),
        contact_details: ContactDetails {
            email: draft.email.clone(),
        },
        metadata: serde_json::json!({
            "document_number": draft.document_number,
        }),
    };

    let session = provider
        .create_session(&request)
        .await
        .map_err(SanareError::from)?;

    // Initial record from our own call, not the webhook path.
    identity_sessions::upsert_status(
        pool,
        &session.session_id,
        Some(&config.workflow_id),
        Some(token),
        session.status.as_str(),
        None,
        false,
    )
    .await?;
    drafts::set_identity_session(pool, token, &session.session_id).await?;

    audit::record(pool, "system", "identity_session_created", token, "ok", None).await?;
    Ok(session)
}

/// Administratively approve a session stuck in manual review.
///
/// Only permitted when the provider currently reports exactly "In
/// Review". The attempt is audited before the provider is consulted and
/// again once the result is known.
pub async fn admin_approve(
    pool: &Pool<Sqlite>,
    provider: &dyn IdentityProvider,
    admin_id: &str,
    session_id: &str,
) -> Result<()> {
    let actor = format!("admin:{admin_id}");
    audit::record(pool, &actor, "admin_approve", session_id, "attempted", None).await?;

    let snapshot = match provider.get_status(session_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            audit::record(pool, &actor, "admin_approve", session_id, "error", Some(&e.to_string()))
                .await?;
            return Err(e.into());
        }
    };

    if snapshot.status != SessionStatus::InReview {
        let detail = format!("status was {}, not In Review", snapshot.status);
        audit::record(pool, &actor, "admin_approve", session_id, "denied", Some(&detail)).await?;
        return Err(SanareError::StateConflict(detail));
    }

    match provider
        .update_status(session_id, SessionStatus::Approved, "manual review override")
        .await
    {
        Ok(()) => {
            audit::record(pool, &actor, "admin_approve", session_id, "ok", None).await?;
            Ok(())
        }
        Err(e) => {
            audit::record(pool, &actor, "admin_approve", session_id, "error", Some(&e.to_string()))
                .await?;
            Err(e.into())
        }
    }
}
