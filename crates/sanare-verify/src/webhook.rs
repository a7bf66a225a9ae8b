//! Webhook ingestion and reconciliation.
//!
//! Deliveries are at-least-once and may arrive out of order. The guarded
//! upsert in the database is the only concurrency control; ingestion here
//! just interprets what was accepted and drives the draft forward.

use sanare_core::error::Result;
use sanare_kyc::{DecisionBundle, SessionStatus, WebhookPayload};
use sanare_db::drafts;
use sanare_db::identity_sessions::{self, UpsertOutcome};
use sanare_db::audit;
use sqlx::{Pool, Sqlite};

/// Ingest one webhook delivery.
///
/// Storage errors propagate so the HTTP handler can log them; the handler
/// swallows them at its boundary and the provider redelivers. Everything
/// else, including unknown status strings and terminal-guard refusals, is
/// handled here and is not an error.
pub async fn ingest(pool: &Pool<Sqlite>, payload: &WebhookPayload) -> Result<()> {
    let outcome = identity_sessions::upsert_status(
        pool,
        &payload.session_id,
        payload.workflow_id.as_deref(),
        payload.vendor_data.as_deref(),
        &payload.status,
        payload.decision.as_ref(),
        true,
    )
    .await?;

    if outcome == UpsertOutcome::RefusedTerminal {
        // A redelivery of the already-stored terminal status must still
        // drive the draft: the first delivery may have crashed between the
        // status write and the draft update. Only a *different* late
        // status is dropped.
        let stored = identity_sessions::get(pool, &payload.session_id).await?;
        let redelivery = stored.is_some_and(|s| s.status == payload.status);
        if !redelivery {
            tracing::info!(
                session_id = %payload.session_id,
                status = %payload.status,
                "webhook refused by terminal-state guard"
            );
            audit::record(
                pool,
                "webhook",
                "webhook_ingest",
                &payload.session_id,
                "refused_terminal",
                Some(&format!("late status '{}' ignored", payload.status)),
            )
            .await?;
            return Ok(());
        }
        tracing::debug!(
            session_id = %payload.session_id,
            status = %payload.status,
            "redelivery of stored terminal status"
        );
    }

    let Some(status) = SessionStatus::parse(&payload.status) else {
        tracing::warn!(
            session_id = %payload.session_id,
            status = %payload.status,
            "unknown webhook status stored verbatim"
        );
        audit::record(
            pool,
            "webhook",
            "webhook_ingest",
            &payload.session_id,
            "unknown_status",
            Some(&payload.status),
        )
        .await?;
        return Ok(());
    };

    match status {
        SessionStatus::Approved => reconcile_approval(pool, payload).await,
        SessionStatus::Declined | SessionStatus::Expired => {
            if let Some(token) = owning_token(pool, payload).await? {
                drafts::set_identity_verified(pool, &token, false).await?;
            }
            audit::record(
                pool,
                "webhook",
                "webhook_ingest",
                &payload.session_id,
                "ok",
                Some(status.as_str()),
            )
            .await?;
            Ok(())
        }
        _ => {
            audit::record(
                pool,
                "webhook",
                "webhook_ingest",
                &payload.session_id,
                "ok",
                Some(status.as_str()),
            )
            .await?;
            Ok(())
        }
    }
}

/// On Approved: verify the draft only when every sub-check passed.
///
/// A top-level Approved with a failing or incomplete bundle leaves the
/// draft unverified and records the discrepancy.
async fn reconcile_approval(pool: &Pool<Sqlite>, payload: &WebhookPayload) -> Result<()> {
    let decision: DecisionBundle = match &payload.decision {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
        None => DecisionBundle::default(),
    };

    let Some(token) = owning_token(pool, payload).await? else {
        tracing::warn!(session_id = %payload.session_id, "approved session has no owning draft");
        audit::record(
            pool,
            "webhook",
            "webhook_ingest",
            &payload.session_id,
            "orphan",
            Some("no draft correlates to this session"),
        )
        .await?;
        return Ok(());
    };

    if decision.all_passed() {
        drafts::set_identity_verified(pool, &token, true).await?;
        audit::record(pool, "webhook", "webhook_ingest", &payload.session_id, "ok", Some("Approved"))
            .await?;
    } else {
        drafts::set_identity_verified(pool, &token, false).await?;
        let detail = format!(
            "approved with failing sub-checks: {}",
            decision.failing_checks().join(", ")
        );
        audit::record(
            pool,
            "webhook",
            "webhook_ingest",
            &payload.session_id,
            "discrepancy",
            Some(&detail),
        )
        .await?;
    }
    Ok(())
}

async fn owning_token(pool: &Pool<Sqlite>, payload: &WebhookPayload) -> Result<Option<String>> {
    if let Some(token) = &payload.vendor_data {
        if drafts::get(pool, token).await?.is_some() {
            return Ok(Some(token.clone()));
        }
    }
    Ok(drafts::get_by_session_id(pool, &payload.session_id)
        .await?
        .map(|d| d.verification_token))
}

/// Best-effort status write from the user-facing callback path.
///
/// Advisory only: never authoritative, and failures are logged and
/// dropped so the redirect completes regardless. Terminal statuses are
/// not written here at all; storing one would arm the terminal guard
/// against the webhook delivery that actually carries the decision.
pub async fn advisory_update(pool: &Pool<Sqlite>, session_id: &str, status: &str) {
    if SessionStatus::parse(status).is_some_and(|s| s.is_terminal()) {
        tracing::debug!(session_id, status, "terminal status left to the webhook path");
        return;
    }
    let result =
        identity_sessions::upsert_status(pool, session_id, None, None, status, None, false).await;
    match result {
        Ok(UpsertOutcome::Applied) => {}
        Ok(UpsertOutcome::RefusedTerminal) => {
            tracing::debug!(session_id, "advisory write refused by terminal-state guard");
        }
        Err(e) => {
            tracing::warn!(session_id, "advisory status write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;
    use sanare_db::drafts::DraftStatus;

    fn payload(session_id: &str, status: &str, decision: Option<serde_json::Value>) -> WebhookPayload {
        WebhookPayload {
            session_id: session_id.to_string(),
            status: status.to_string(),
            workflow_id: Some("wf-1".to_string()),
            vendor_data: Some("tok-1".to_string()),
            decision,
        }
    }

    fn passing_decision() -> serde_json::Value {
        serde_json::json!({
            "id_verification": {"status": "Approved"},
            "face_match": {"status": "Approved"},
            "liveness": {"status": "Approved"},
            "aml": {"status": "Approved"}
        })
    }

    async fn seed_draft(pool: &Pool<Sqlite>) {
        drafts::create(pool, "tok-1", "ana@example.com", Some("Ana"), Some("Silva"))
            .await
            .expect("create");
        drafts::set_status(pool, "tok-1", DraftStatus::EmailVerified)
            .await
            .expect("advance");
        drafts::set_identity_session(pool, "tok-1", "S1")
            .await
            .expect("link session");
    }

    #[tokio::test]
    async fn test_approved_with_passing_checks_verifies_draft() {
        let pool = test_pool().await;
        seed_draft(&pool).await;

        ingest(&pool, &payload("S1", "Approved", Some(passing_decision())))
            .await
            .expect("ingest");

        let draft = drafts::get(&pool, "tok-1").await.unwrap().unwrap();
        assert!(draft.identity_verified);
        assert_eq!(draft.status, DraftStatus::IdentityVerified);
    }

    #[tokio::test]
    async fn test_duplicate_approved_delivery_is_idempotent() {
        let pool = test_pool().await;
        seed_draft(&pool).await;

        let body = payload("S1", "Approved", Some(passing_decision()));
        ingest(&pool, &body).await.expect("first delivery");
        ingest(&pool, &body).await.expect("second delivery");

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM identity_sessions WHERE session_id = 'S1'")
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(count, 1);

        let session = identity_sessions::get(&pool, "S1").await.unwrap().unwrap();
        assert_eq!(session.status, "Approved");
    }

    #[tokio::test]
    async fn test_late_in_progress_does_not_overwrite_approved() {
        let pool = test_pool().await;
        seed_draft(&pool).await;

        ingest(&pool, &payload("S1", "Approved", Some(passing_decision())))
            .await
            .expect("approve");
        ingest(&pool, &payload("S1", "In Progress", None))
            .await
            .expect("late delivery");

        let session = identity_sessions::get(&pool, "S1").await.unwrap().unwrap();
        assert_eq!(session.status, "Approved");
    }

    #[tokio::test]
    async fn test_approved_with_failing_subcheck_records_discrepancy() {
        let pool = test_pool().await;
        seed_draft(&pool).await;

        let decision = serde_json::json!({
            "id_verification": {"status": "Approved"},
            "face_match": {"status": "Declined"},
            "liveness": {"status": "Approved"},
            "aml": {"status": "Approved"}
        });
        ingest(&pool, &payload("S1", "Approved", Some(decision)))
            .await
            .expect("ingest");

        let draft = drafts::get(&pool, "tok-1").await.unwrap().unwrap();
        assert!(!draft.identity_verified, "draft stays unverified");

        let events = audit::for_subject(&pool, "S1").await.expect("audit");
        assert!(events.iter().any(|e| e.outcome == "discrepancy"));
    }

    #[tokio::test]
    async fn test_unknown_status_is_stored_and_audited() {
        let pool = test_pool().await;
        seed_draft(&pool).await;

        ingest(&pool, &payload("S1", "Kyc Expired", None))
            .await
            .expect("ingest");

        let session = identity_sessions::get(&pool, "S1").await.unwrap().unwrap();
        assert_eq!(session.status, "Kyc Expired");

        let events = audit::for_subject(&pool, "S1").await.expect("audit");
        assert!(events.iter().any(|e| e.outcome == "unknown_status"));
    }

    #[tokio::test]
    async fn test_advisory_terminal_status_is_not_written() {
        let pool = test_pool().await;
        advisory_update(&pool, "S1", "Approved").await;
        assert!(identity_sessions::get(&pool, "S1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_terminal_row_does_not_block_webhook() {
        let pool = test_pool().await;
        seed_draft(&pool).await;

        // A terminal status already sits in the table without the draft
        // having been updated (older non-authoritative write, or a crash
        // mid-ingestion).
        identity_sessions::upsert_status(&pool, "S1", None, None, "Approved", None, false)
            .await
            .expect("pre-existing row");

        ingest(&pool, &payload("S1", "Approved", Some(passing_decision())))
            .await
            .expect("ingest");

        let draft = drafts::get(&pool, "tok-1").await.unwrap().unwrap();
        assert!(draft.identity_verified, "redelivered terminal status must reconcile");
    }

    #[tokio::test]
    async fn test_redelivered_approved_after_partial_failure_reconciles() {
        let pool = test_pool().await;
        seed_draft(&pool).await;

        // First delivery wrote the session row but died before the draft
        // update; the provider redelivers the identical payload.
        identity_sessions::upsert_status(
            &pool, "S1", Some("wf-1"), Some("tok-1"), "Approved", None, true,
        )
        .await
        .expect("first delivery, draft update lost");

        ingest(&pool, &payload("S1", "Approved", Some(passing_decision())))
            .await
            .expect("redelivery");

        let draft = drafts::get(&pool, "tok-1").await.unwrap().unwrap();
        assert!(draft.identity_verified);
        assert_eq!(draft.status, DraftStatus::IdentityVerified);
    }

    #[tokio::test]
    async fn test_advisory_update_never_errors() {
        let pool = test_pool().await;
        advisory_update(&pool, "S9", "In Progress").await;
        let session = identity_sessions::get(&pool, "S9").await.unwrap().unwrap();
        assert!(!session.authoritative);
    }

    #[tokio::test]
    async fn test_declined_marks_draft_unverified() {
        let pool = test_pool().await;
        seed_draft(&pool).await;

        ingest(&pool, &payload("S1", "Approved", Some(passing_decision())))
            .await
            .expect("approve");
        let draft = drafts::get(&pool, "tok-1").await.unwrap().unwrap();
        assert!(draft.identity_verified);

        // A fresh session for the same draft gets declined.
        drafts::set_identity_session(&pool, "tok-1", "S2")
            .await
            .expect("relink");
        let mut declined = payload("S2", "Declined", None);
        declined.vendor_data = Some("tok-1".to_string());
        ingest(&pool, &declined).await.expect("decline");

        let draft = drafts::get(&pool, "tok-1").await.unwrap().unwrap();
        assert!(!draft.identity_verified);
    }
}
