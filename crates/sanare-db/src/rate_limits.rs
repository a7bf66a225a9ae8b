//! Fixed-window rate limiting backed by the database.
//!
//! Counters live in a table rather than process memory so the limit holds
//! across restarts and multiple server instances. Limited requests fail
//! fast with a retry-after hint; nothing queues here.

use crate::error::Result;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use std::time::Duration;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Request admitted
    Allowed,
    /// Over the limit for this window
    Limited {
        /// Time until the window rolls over
        retry_after: Duration,
    },
}

/// Count a request against `(key, scope)` and decide whether to admit it.
///
/// `scope` names the protected operation ("email_code", "license_lookup");
/// `key` is the source identity (IP or email). The counter increments even
/// for rejected requests, so hammering a limited key does not shorten the
/// wait.
pub async fn check_and_count(
    pool: &Pool<Sqlite>,
    key: &str,
    scope: &str,
    window_secs: i64,
    max_per_window: i64,
) -> Result<RateDecision> {
    let now = Utc::now().timestamp();
    let window_start = now - now.rem_euclid(window_secs);

    let count: i64 = sqlx::query_scalar(
        "INSERT INTO rate_limits (key, scope, window_start, count)
         VALUES (?, ?, ?, 1)
         ON CONFLICT (key, scope, window_start)
             DO UPDATE SET count = count + 1
         RETURNING count",
    )
    .bind(key)
    .bind(scope)
    .bind(window_start)
    .fetch_one(pool)
    .await?;

    if count > max_per_window {
        let window_end = window_start + window_secs;
        #[allow(clippy::cast_sign_loss)]
        let retry_after = Duration::from_secs((window_end - now).max(1) as u64);
        return Ok(RateDecision::Limited { retry_after });
    }
    Ok(RateDecision::Allowed)
}

/// Drop counters from windows old enough to be irrelevant.
pub async fn prune(pool: &Pool<Sqlite>, window_secs: i64) -> Result<u64> {
    let cutoff = Utc::now().timestamp() - 2 * window_secs;
    let result = sqlx::query("DELETE FROM rate_limits WHERE window_start < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pool;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let pool = test_pool().await;
        for _ in 0..3 {
            let decision = check_and_count(&pool, "1.2.3.4", "email_code", 3600, 3)
                .await
                .expect("check");
            assert_eq!(decision, RateDecision::Allowed);
        }
    }

    #[tokio::test]
    async fn test_limits_past_threshold_with_hint() {
        let pool = test_pool().await;
        for _ in 0..3 {
            check_and_count(&pool, "1.2.3.4", "email_code", 3600, 3)
                .await
                .expect("check");
        }

        let decision = check_and_count(&pool, "1.2.3.4", "email_code", 3600, 3)
            .await
            .expect("check");
        match decision {
            RateDecision::Limited { retry_after } => {
                assert!(retry_after.as_secs() >= 1);
                assert!(retry_after.as_secs() <= 3600);
            }
            RateDecision::Allowed => panic!("expected limit"),
        }
    }

    #[tokio::test]
    async fn test_scopes_and_keys_are_independent() {
        let pool = test_pool().await;
        for _ in 0..3 {
            check_and_count(&pool, "1.2.3.4", "email_code", 3600, 3)
                .await
                .expect("check");
        }

        // Different scope, same key.
        assert_eq!(
            check_and_count(&pool, "1.2.3.4", "license_lookup", 3600, 3)
                .await
                .expect("check"),
            RateDecision::Allowed
        );
        // Different key, same scope.
        assert_eq!(
            check_and_count(&pool, "5.6.7.8", "email_code", 3600, 3)
                .await
                .expect("check"),
            RateDecision::Allowed
        );
    }

    #[tokio::test]
    async fn test_prune_removes_stale_windows() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO rate_limits (key, scope, window_start, count) VALUES ('old', 's', 0, 9)",
        )
        .execute(&pool)
        .await
        .expect("seed stale window");

        let removed = prune(&pool, 3600).await.expect("prune");
        assert_eq!(removed, 1);
    }
}
