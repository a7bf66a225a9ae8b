//! License verification step: scrape, classify, record on the draft.

use sanare_classify::{classify, ProfessionClassification};
use sanare_core::error::{Result, SanareError};
use sanare_core::types::DocumentType;
use sanare_db::audit;
use sanare_db::drafts;
use sanare_registry::{LicenseVerificationResult, RegistryOutcome, RegistryService};
use sqlx::{Pool, Sqlite};

/// Outcome of the license verification step for one draft.
#[derive(Debug)]
pub struct LicenseCheck {
    /// The registry lookup result, cached or fresh
    pub result: LicenseVerificationResult,
    /// Classification, present when the registry returned a record
    pub classification: Option<ProfessionClassification>,
    /// Whether the draft's license step is now verified
    pub valid: bool,
}

/// Run the license check for a draft and record the outcome on it.
///
/// The lookup itself never fails on scrape trouble; a degraded
/// [`RegistryOutcome::Error`] is recorded on the draft as an unverified
/// license, and the caller can invite a retry.
pub async fn verify_license(
    pool: &Pool<Sqlite>,
    registry: &RegistryService,
    token: &str,
    document_type: DocumentType,
    raw_document_number: &str,
) -> Result<LicenseCheck> {
    let draft = drafts::get(pool, token)
        .await?
        .ok_or_else(|| SanareError::NotFound(format!("no draft for token {token}")))?;

    if draft.status.is_terminal() {
        return Err(SanareError::StateConflict(format!(
            "draft is {}, cannot verify license",
            draft.status
        )));
    }
    if draft.status == drafts::DraftStatus::PendingEmail {
        return Err(SanareError::StateConflict(
            "email must be verified before the license check".to_string(),
        ));
    }

    let result = registry.lookup(document_type, raw_document_number).await;
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            audit::record(pool, "system", "license_lookup", token, "error", Some(&e.to_string()))
                .await?;
            return Err(e);
        }
    };

    let classification = result
        .record()
        .map(|record| classify(&record.profession, record.specialty.as_deref()));

    let valid = classification
        .as_ref()
        .is_some_and(|c| c.valid_professional);

    let classification_json = match &classification {
        Some(c) => serde_json::to_value(c)
            .map_err(|e| SanareError::Internal(format!("classification not serializable: {e}")))?,
        None => serde_json::Value::Null,
    };

    drafts::set_license_result(
        pool,
        token,
        document_type.as_str(),
        &result.document_number,
        valid,
        classification.as_ref().map(|c| c.profession.as_str()),
        classification.as_ref().and_then(|c| c.specialty.as_deref()),
        classification.as_ref().map(|c| c.primary_dashboard.as_str()),
        &classification_json,
    )
    .await?;

    let outcome_label = match (&result.outcome, valid) {
        (RegistryOutcome::Found(_), true) => "ok",
        (RegistryOutcome::Found(_), false) => "denied",
        (RegistryOutcome::NotFound, _) => "not_found",
        (RegistryOutcome::Error { .. }, _) => "error",
    };
    audit::record(
        pool,
        "system",
        "license_lookup",
        token,
        outcome_label,
        Some(&format!("document {}", result.document_number)),
    )
    .await?;

    Ok(LicenseCheck {
        result,
        classification,
        valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    // Full lookups need a browser; these tests cover the draft-state
    // guards, which fail before any browser is involved.

    fn service(pool: &Pool<Sqlite>) -> RegistryService {
        RegistryService::new(pool.clone(), sanare_core::config::RegistryConfig::default())
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let pool = test_pool().await;
        let err = verify_license(&pool, &service(&pool), "missing", DocumentType::Run, "12345678-9")
            .await
            .expect_err("must fail");
        assert!(matches!(err, SanareError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_license_check_requires_verified_email() {
        let pool = test_pool().await;
        drafts::create(&pool, "tok-1", "ana@example.com", None, None)
            .await
            .expect("create draft");

        let err = verify_license(&pool, &service(&pool), "tok-1", DocumentType::Run, "12345678-9")
            .await
            .expect_err("must fail");
        assert!(matches!(err, SanareError::StateConflict(_)));
    }
}
