//! The lookup service: cache, concurrency bound, retries, degradation.
//!
//! Scraper calls run for tens of seconds, so the service bounds how many
//! browser sessions exist at once and rejects excess load with a retry
//! hint instead of queueing without limit. Scrape failures never propagate
//! as errors; they degrade into a terminal [`RegistryOutcome::Error`]
//! within the overall deadline so callers always get an answer.

use crate::scraper::{BrowserFetcher, LicenseFetcher};
use crate::types::{LicenseVerificationResult, RegistryOutcome};
use chrono::Utc;
use rand::Rng;
use sanare_core::config::RegistryConfig;
use sanare_core::error::{Result, SanareError};
use sanare_core::types::{DocumentNumber, DocumentType};
use sanare_db::license_cache;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

const SOURCE: &str = "national-registry";
const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 2_000;

/// Registry lookup service with a bounded pool of browser slots.
#[derive(Clone)]
pub struct RegistryService {
    pool: Pool<Sqlite>,
    config: Arc<RegistryConfig>,
    slots: Arc<Semaphore>,
    fetcher: Arc<dyn LicenseFetcher>,
}

impl RegistryService {
    /// Build the service around a database pool and registry settings.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>, config: RegistryConfig) -> Self {
        Self::with_fetcher(pool, config, Arc::new(BrowserFetcher))
    }

    /// Build the service with a custom fetcher.
    #[must_use]
    pub fn with_fetcher(
        pool: Pool<Sqlite>,
        config: RegistryConfig,
        fetcher: Arc<dyn LicenseFetcher>,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_lookups));
        Self {
            pool,
            config: Arc::new(config),
            slots,
            fetcher,
        }
    }

    /// Look up a license by document number.
    ///
    /// Checks the cache first; on a miss, acquires a browser slot (waiting
    /// at most the configured grace period), scrapes with bounded retries
    /// under one overall deadline, and records the outcome in the cache.
    ///
    /// # Errors
    /// `RateLimited` when no browser slot frees up within the grace
    /// period; `Validation` for an unusable document number; `Database`
    /// for storage failures. Scrape failures are not errors: they come
    /// back as [`RegistryOutcome::Error`].
    pub async fn lookup(
        &self,
        document_type: DocumentType,
        raw_document_number: &str,
    ) -> Result<LicenseVerificationResult> {
        let document_number = DocumentNumber::normalize(raw_document_number)?;

        if let Some(cached) =
            license_cache::get_fresh(&self.pool, document_number.as_str(), self.config.cache_ttl_hours)
                .await
                .map_err(SanareError::from)?
        {
            // Degraded rows stay in the table for diagnostics but never
            // satisfy a lookup; the next request scrapes again.
            if cached.error.is_none() {
                tracing::debug!(document_number = %document_number, "cache hit");
                return Ok(cached_to_result(&cached));
            }
        }

        let grace = Duration::from_secs(self.config.queue_grace_secs);
        let permit = match tokio::time::timeout(grace, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(SanareError::Internal("lookup semaphore closed".into()));
            }
            Err(_) => {
                tracing::warn!(document_number = %document_number, "no browser slot within grace period");
                return Err(SanareError::RateLimited { retry_after: grace });
            }
        };

        let started = Instant::now();
        let outcome = self
            .scrape_with_retries(document_type, document_number.as_str())
            .await;
        drop(permit);

        let processing_time_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.record_outcome(document_number.as_str(), &outcome, processing_time_ms)
            .await?;

        Ok(LicenseVerificationResult {
            document_number: document_number.as_str().to_string(),
            outcome,
            cached: false,
            source: SOURCE.to_string(),
            fetched_at: Utc::now(),
            processing_time_ms,
        })
    }

    /// Retry scrape attempts with jittered backoff under one deadline.
    async fn scrape_with_retries(
        &self,
        document_type: DocumentType,
        document_number: &str,
    ) -> RegistryOutcome {
        let deadline = Instant::now() + Duration::from_secs(self.config.overall_deadline_secs);
        let mut last_reason = String::from("lookup never attempted");

        for attempt in 1..=MAX_ATTEMPTS {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let attempt_result = tokio::time::timeout(
                remaining,
                self.fetcher.fetch(&self.config, document_type, document_number),
            )
            .await;

            match attempt_result {
                Ok(Ok(outcome @ (RegistryOutcome::Found(_) | RegistryOutcome::NotFound))) => {
                    return outcome;
                }
                Ok(Ok(RegistryOutcome::Error { reason })) => {
                    tracing::warn!(attempt, document_number, reason, "degraded scrape attempt");
                    last_reason = reason;
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt, document_number, "scrape attempt failed: {e}");
                    last_reason = e.to_string();
                }
                Err(_) => {
                    tracing::warn!(attempt, document_number, "overall lookup deadline reached");
                    last_reason = format!(
                        "deadline of {}s exceeded",
                        self.config.overall_deadline_secs
                    );
                    break;
                }
            }

            if attempt < MAX_ATTEMPTS {
                let backoff = backoff_with_jitter(attempt);
                if Instant::now() + backoff >= deadline {
                    break;
                }
                tokio::time::sleep(backoff).await;
            }
        }

        RegistryOutcome::Error { reason: last_reason }
    }

    async fn record_outcome(
        &self,
        document_number: &str,
        outcome: &RegistryOutcome,
        processing_time_ms: i64,
    ) -> Result<()> {
        match outcome {
            RegistryOutcome::Found(record) => {
                license_cache::insert(
                    &self.pool,
                    document_number,
                    true,
                    Some(&record.holder_name),
                    Some(&record.profession),
                    record.specialty.as_deref(),
                    record.license_number.as_deref(),
                    record.registration_date.as_deref(),
                    None,
                    SOURCE,
                    processing_time_ms,
                )
                .await
            }
            RegistryOutcome::NotFound => {
                license_cache::insert(
                    &self.pool,
                    document_number,
                    false,
                    None,
                    None,
                    None,
                    None,
                    None,
                    None,
                    SOURCE,
                    processing_time_ms,
                )
                .await
            }
            RegistryOutcome::Error { reason } => {
                license_cache::insert(
                    &self.pool,
                    document_number,
                    false,
                    None,
                    None,
                    None,
                    None,
                    None,
                    Some(reason),
                    SOURCE,
                    processing_time_ms,
                )
                .await
            }
        }
        .map(|_| ())
        .map_err(SanareError::from)
    }
}

fn backoff_with_jitter(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS * u64::from(2_u32.saturating_pow(attempt - 1));
    let jitter = rand::thread_rng().gen_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}

fn cached_to_result(cached: &license_cache::CachedLookup) -> LicenseVerificationResult {
    let outcome = if cached.found {
        RegistryOutcome::Found(crate::types::LicenseRecord {
            holder_name: cached.holder_name.clone().unwrap_or_default(),
            profession: cached.profession.clone().unwrap_or_default(),
            specialty: cached.specialty.clone(),
            license_number: cached.license_number.clone(),
            registration_date: cached.registration_date.clone(),
        })
    } else if let Some(reason) = &cached.error {
        RegistryOutcome::Error {
            reason: reason.clone(),
        }
    } else {
        RegistryOutcome::NotFound
    };

    LicenseVerificationResult {
        document_number: cached.document_number.clone(),
        outcome,
        cached: true,
        source: cached.source.clone(),
        fetched_at: cached.fetched_at,
        processing_time_ms: cached.processing_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanare_browser::BrowserError;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails every attempt, or succeeds from attempt `succeed_on` onwards.
    struct ScriptedFetcher {
        attempts: AtomicU32,
        succeed_on: Option<u32>,
    }

    impl ScriptedFetcher {
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicU32::new(0),
                succeed_on: None,
            })
        }

        fn succeeding_on(attempt: u32) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicU32::new(0),
                succeed_on: Some(attempt),
            })
        }
    }

    #[async_trait::async_trait]
    impl LicenseFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            _config: &RegistryConfig,
            _document_type: DocumentType,
            _document_number: &str,
        ) -> sanare_browser::Result<RegistryOutcome> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.succeed_on {
                Some(n) if attempt >= n => Ok(RegistryOutcome::NotFound),
                _ => Err(BrowserError::Navigation("registry unreachable".into())),
            }
        }
    }

    async fn service_with(
        fetcher: Arc<dyn LicenseFetcher>,
        config: RegistryConfig,
    ) -> RegistryService {
        let pool = sanare_db::connection::connect(":memory:", 1)
            .await
            .expect("open in-memory database");
        sanare_db::migrations::run_migrations(&pool)
            .await
            .expect("run migrations");
        RegistryService::with_fetcher(pool, config, fetcher)
    }

    #[tokio::test]
    async fn test_exhausted_attempts_degrade_to_error_outcome() {
        let fetcher = ScriptedFetcher::failing();
        let service = service_with(fetcher.clone(), RegistryConfig::default()).await;

        let result = service
            .lookup(DocumentType::Run, "12.345.678-9")
            .await
            .expect("lookup always answers");
        assert!(matches!(
            &result.outcome,
            RegistryOutcome::Error { reason } if reason.contains("registry unreachable")
        ));
        assert!(!result.cached);
        assert_eq!(fetcher.attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_elapsed_deadline_degrades_without_an_attempt() {
        let fetcher = ScriptedFetcher::failing();
        let config = RegistryConfig {
            overall_deadline_secs: 0,
            ..RegistryConfig::default()
        };
        let service = service_with(fetcher.clone(), config).await;

        let result = service
            .lookup(DocumentType::Run, "12.345.678-9")
            .await
            .expect("lookup always answers");
        assert!(matches!(result.outcome, RegistryOutcome::Error { .. }));
        assert_eq!(fetcher.attempts.load(Ordering::SeqCst), 0, "no time left for an attempt");
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_retry() {
        let fetcher = ScriptedFetcher::succeeding_on(2);
        let service = service_with(fetcher.clone(), RegistryConfig::default()).await;

        let result = service
            .lookup(DocumentType::Run, "12.345.678-9")
            .await
            .expect("lookup");
        assert!(matches!(result.outcome, RegistryOutcome::NotFound));
        assert_eq!(fetcher.attempts.load(Ordering::SeqCst), 2);

        // The definitive answer is cached; no further scrape.
        let again = service
            .lookup(DocumentType::Run, "12.345.678-9")
            .await
            .expect("cached lookup");
        assert!(again.cached);
        assert_eq!(fetcher.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_degraded_outcome_is_not_served_from_cache() {
        let fetcher = ScriptedFetcher::failing();
        let service = service_with(fetcher.clone(), RegistryConfig::default()).await;

        for _ in 0..2 {
            let result = service
                .lookup(DocumentType::Run, "12.345.678-9")
                .await
                .expect("lookup");
            assert!(matches!(result.outcome, RegistryOutcome::Error { .. }));
        }
        assert_eq!(
            fetcher.attempts.load(Ordering::SeqCst),
            2 * MAX_ATTEMPTS,
            "second request scrapes again instead of replaying the failure"
        );
    }

    #[test]
    fn test_backoff_grows_with_attempts_and_stays_bounded() {
        for attempt in 1..=3 {
            let backoff = backoff_with_jitter(attempt);
            let base = BACKOFF_BASE_MS * u64::from(2_u32.pow(attempt - 1));
            assert!(backoff.as_millis() >= u128::from(base));
            assert!(backoff.as_millis() <= u128::from(base + base / 2));
        }
    }

    #[test]
    fn test_cached_row_maps_to_tagged_outcome() {
        let row = license_cache::CachedLookup {
            id: "x".into(),
            document_number: "12345678-9".into(),
            found: false,
            holder_name: None,
            profession: None,
            specialty: None,
            license_number: None,
            registration_date: None,
            error: Some("registry unreachable".into()),
            source: SOURCE.into(),
            fetched_at: Utc::now(),
            processing_time_ms: 90_000,
        };
        let result = cached_to_result(&row);
        assert!(result.cached);
        assert!(matches!(result.outcome, RegistryOutcome::Error { .. }));

        let not_found = license_cache::CachedLookup {
            error: None,
            ..row
        };
        assert!(matches!(
            cached_to_result(&not_found).outcome,
            RegistryOutcome::NotFound
        ));
    }
}
