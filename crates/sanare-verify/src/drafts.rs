//! Draft lifecycle: email codes in, verified email out.

use chrono::{Duration, Utc};
use sanare_core::error::{Result, SanareError};
use sanare_core::types::{EmailAddress, VerificationToken};
use sanare_db::drafts::{self, DraftStatus};
use sanare_db::audit;
use sanare_mail::codes;
use sqlx::{Pool, Sqlite};

/// A freshly issued email code, ready to be mailed.
///
/// The plaintext code lives only in this value; the database holds its
/// hash. The caller mails it and drops it.
#[derive(Debug)]
pub struct IssuedCode {
    /// Token of the draft the code belongs to
    pub token: VerificationToken,
    /// Plaintext six-digit code
    pub code: String,
    /// Recipient
    pub email: String,
}

/// Issue a verification code for an email address.
///
/// Reuses the active draft for the email when one exists (at most one
/// non-terminal draft per email); otherwise creates a new draft. A fresh
/// code always replaces any outstanding one.
pub async fn issue_email_code(
    pool: &Pool<Sqlite>,
    raw_email: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
    code_ttl_minutes: i64,
) -> Result<IssuedCode> {
    let email = EmailAddress::new(raw_email)?;

    let token = match drafts::get_active_by_email(pool, email.as_str()).await? {
        Some(existing) => VerificationToken::new(existing.verification_token)?,
        None => {
            let token = VerificationToken::generate();
            drafts::create(pool, token.as_str(), email.as_str(), first_name, last_name).await?;
            token
        }
    };

    let code = codes::generate_code();
    let expires_at = Utc::now() + Duration::minutes(code_ttl_minutes);
    drafts::set_email_code(pool, token.as_str(), &codes::hash_code(&code), expires_at).await?;

    audit::record(pool, "system", "email_code_issued", token.as_str(), "ok", None).await?;

    Ok(IssuedCode {
        token,
        code,
        email: email.as_str().to_string(),
    })
}

/// Check a submitted code and advance the draft to `email_verified`.
pub async fn verify_email_code(pool: &Pool<Sqlite>, token: &str, submitted: &str) -> Result<()> {
    let draft = drafts::get(pool, token)
        .await?
        .ok_or_else(|| SanareError::NotFound(format!("no draft for token {token}")))?;

    if draft.status.is_terminal() {
        return Err(SanareError::StateConflict(format!(
            "draft is {}, cannot verify email",
            draft.status
        )));
    }

    let (Some(stored_hash), Some(expires_at)) =
        (draft.email_code_hash.as_deref(), draft.email_code_expires_at)
    else {
        return Err(SanareError::validation("code", "no code outstanding for this draft"));
    };

    if Utc::now() > expires_at {
        audit::record(pool, "user", "email_verify", token, "denied", Some("code expired")).await?;
        return Err(SanareError::validation("code", "verification code expired"));
    }

    if !codes::verify_code(submitted, stored_hash) {
        audit::record(pool, "user", "email_verify", token, "denied", Some("code mismatch")).await?;
        return Err(SanareError::validation("code", "verification code does not match"));
    }

    if draft.status == DraftStatus::PendingEmail {
        drafts::set_status(pool, token, DraftStatus::EmailVerified).await?;
    }
    audit::record(pool, "user", "email_verify", token, "ok", None).await?;
    Ok(())
}

/// Expire stale drafts; returns how many were expired.
pub async fn expire_stale_drafts(pool: &Pool<Sqlite>) -> Result<u64> {
    let expired = drafts::expire_stale(pool).await?;
    if expired > 0 {
        tracing::info!(expired, "expired stale registration drafts");
    }
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    #[tokio::test]
    async fn test_issue_and_verify_code() {
        let pool = test_pool().await;
        let issued = issue_email_code(&pool, "Ana@Example.com", Some("Ana"), None, 15)
            .await
            .expect("issue");
        assert_eq!(issued.email, "ana@example.com");

        verify_email_code(&pool, issued.token.as_str(), &issued.code)
            .await
            .expect("verify");

        let draft = drafts::get(&pool, issued.token.as_str())
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(draft.status, DraftStatus::EmailVerified);
    }

    #[tokio::test]
    async fn test_reissue_reuses_active_draft() {
        let pool = test_pool().await;
        let first = issue_email_code(&pool, "ana@example.com", None, None, 15)
            .await
            .expect("first");
        let second = issue_email_code(&pool, "ana@example.com", None, None, 15)
            .await
            .expect("second");
        assert_eq!(first.token.as_str(), second.token.as_str());

        // Only the latest code works.
        let err = verify_email_code(&pool, first.token.as_str(), &first.code).await;
        if first.code != second.code {
            assert!(err.is_err());
        }
        verify_email_code(&pool, second.token.as_str(), &second.code)
            .await
            .expect("latest code verifies");
    }

    #[tokio::test]
    async fn test_wrong_code_is_rejected_and_audited() {
        let pool = test_pool().await;
        let issued = issue_email_code(&pool, "ana@example.com", None, None, 15)
            .await
            .expect("issue");

        let wrong = if issued.code == "000000" { "000001" } else { "000000" };
        let err = verify_email_code(&pool, issued.token.as_str(), wrong)
            .await
            .expect_err("must reject");
        assert!(matches!(err, SanareError::Validation { .. }));

        let events = audit::for_subject(&pool, issued.token.as_str())
            .await
            .expect("audit");
        assert!(events.iter().any(|e| e.outcome == "denied"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let pool = test_pool().await;
        let err = verify_email_code(&pool, "no-such-token", "123456")
            .await
            .expect_err("must fail");
        assert!(matches!(err, SanareError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let pool = test_pool().await;
        let issued = issue_email_code(&pool, "ana@example.com", None, None, 15)
            .await
            .expect("issue");

        drafts::set_email_code(
            &pool,
            issued.token.as_str(),
            &codes::hash_code(&issued.code),
            Utc::now() - Duration::minutes(1),
        )
        .await
        .expect("age the code");

        let err = verify_email_code(&pool, issued.token.as_str(), &issued.code)
            .await
            .expect_err("must reject");
        assert!(matches!(err, SanareError::Validation { .. }));
    }
}
