//! HTTP surface of the verification pipeline.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use sanare_core::error::SanareError;
use sanare_core::types::DocumentType;
use sanare_db::rate_limits::{self, RateDecision};
use sanare_kyc::{SessionStatus, WebhookPayload};
use sanare_mail::templates;
use sanare_verify::{completion, drafts as draft_service, license, sessions, webhook};
use serde::Deserialize;
use serde_json::json;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/registration/email-code", post(request_email_code))
        .route("/api/v1/registration/verify-email", post(verify_email))
        .route("/api/v1/registration/license", post(start_license_check))
        .route("/api/v1/registration/status", get(registration_status))
        .route("/api/v1/registration/readiness", get(readiness))
        .route("/api/v1/registration/complete", post(complete))
        .route("/api/v1/identity/session", post(create_identity_session))
        .route("/api/v1/identity/webhook", post(ingest_webhook))
        .route("/api/v1/identity/callback", get(identity_callback))
        .route("/api/v1/admin/sessions/:session_id/approve", post(admin_approve))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|e| ApiError(SanareError::Database(e.to_string())))?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn enforce_rate_limit(
    state: &AppState,
    key: &str,
    scope: &str,
    window_secs: i64,
    max_per_window: i64,
) -> Result<(), ApiError> {
    let decision = rate_limits::check_and_count(&state.pool, key, scope, window_secs, max_per_window)
        .await
        .map_err(SanareError::from)?;
    match decision {
        RateDecision::Allowed => Ok(()),
        RateDecision::Limited { retry_after } => {
            Err(ApiError(SanareError::RateLimited { retry_after }))
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmailCodeRequest {
    email: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

async fn request_email_code(
    State(state): State<AppState>,
    Json(body): Json<EmailCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let limits = &state.config.rate_limits;
    enforce_rate_limit(
        &state,
        &body.email.trim().to_lowercase(),
        "email_code",
        limits.email_window_secs,
        limits.email_max_per_window,
    )
    .await?;

    let issued = draft_service::issue_email_code(
        &state.pool,
        &body.email,
        body.first_name.as_deref(),
        body.last_name.as_deref(),
        state.config.mail.code_ttl_minutes,
    )
    .await?;

    let email = templates::verification_code_email(
        &issued.email,
        &issued.code,
        state.config.mail.code_ttl_minutes,
    );
    sanare_mail::sender::send_smtp(&email, &state.config.mail)
        .await
        .map_err(SanareError::from)?;

    Ok(Json(json!({ "verification_token": issued.token.as_str() })))
}

#[derive(Debug, Deserialize)]
struct VerifyEmailRequest {
    verification_token: String,
    code: String,
}

async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    draft_service::verify_email_code(&state.pool, &body.verification_token, &body.code).await?;
    Ok(Json(json!({ "status": "email_verified" })))
}

#[derive(Debug, Deserialize)]
struct LicenseCheckRequest {
    verification_token: String,
    document_type: String,
    document_number: String,
}

/// Kick off the license lookup off the request path.
///
/// Scrapes run for tens of seconds; the handler validates, spawns the
/// bounded lookup task, and answers 202. The result lands on the draft,
/// where the status endpoint picks it up.
async fn start_license_check(
    State(state): State<AppState>,
    Json(body): Json<LicenseCheckRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let document_type = DocumentType::parse(&body.document_type)?;
    let limits = &state.config.rate_limits;
    enforce_rate_limit(
        &state,
        body.document_number.trim(),
        "license_lookup",
        limits.lookup_window_secs,
        limits.lookup_max_per_window,
    )
    .await?;

    let token = body.verification_token.clone();
    let task_state = state.clone();
    tokio::spawn(async move {
        let result = license::verify_license(
            &task_state.pool,
            &task_state.registry,
            &token,
            document_type,
            &body.document_number,
        )
        .await;
        if let Err(e) = result {
            tracing::warn!(token, "license check task failed: {e}");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "pending" }))))
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: String,
}

async fn registration_status(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = sanare_db::drafts::get(&state.pool, &query.token)
        .await
        .map_err(SanareError::from)?
        .ok_or_else(|| SanareError::NotFound(format!("no draft for token {}", query.token)))?;

    Ok(Json(json!({
        "status": draft.status.as_str(),
        "license_checked": draft.license_checked,
        "license_valid": draft.license_valid,
        "profession": draft.profession,
        "specialty": draft.specialty,
        "primary_dashboard": draft.primary_dashboard,
        "identity_verified": draft.identity_verified,
        "expires_at": draft.expires_at,
    })))
}

async fn readiness(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = completion::readiness(&state.pool, &query.token).await?;
    Ok(Json(json!({ "ready": report.ready, "missing": report.missing })))
}

#[derive(Debug, Deserialize)]
struct CompleteRequest {
    verification_token: String,
}

async fn complete(
    State(state): State<AppState>,
    Json(body): Json<CompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let completed = completion::finalize(&state.pool, &body.verification_token).await?;

    let welcome = templates::registration_complete_email(
        &completed.user.email,
        completed.user.first_name.as_deref(),
    );
    if let Err(e) = sanare_mail::sender::send_smtp(&welcome, &state.config.mail).await {
        // The account exists; a lost welcome email is not worth failing over.
        tracing::warn!(user_id = %completed.user.id, "welcome email failed: {e}");
    }

    Ok(Json(completed))
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    verification_token: String,
}

async fn create_identity_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = sessions::start_identity_session(
        &state.pool,
        state.provider.as_ref(),
        &state.config.kyc,
        &body.verification_token,
    )
    .await?;

    Ok(Json(json!({
        "session_id": session.session_id,
        "url": session.url,
        "status": session.status,
    })))
}

/// Webhook ingestion endpoint.
///
/// Errors are logged and swallowed here; delivery is at-least-once and
/// ingestion is idempotent, so answering 200 is always safe. Nothing from
/// this handler may crash the process.
async fn ingest_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> impl IntoResponse {
    if let Some(expected) = &state.config.kyc.webhook_secret {
        let presented = headers
            .get("x-webhook-secret")
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            tracing::warn!(session_id = %payload.session_id, "webhook with bad shared secret");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    if let Err(e) = webhook::ingest(&state.pool, &payload).await {
        tracing::error!(session_id = %payload.session_id, "webhook ingestion failed: {e}");
    }
    Json(json!({ "received": true })).into_response()
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    session_id: String,
}

/// User-facing redirect after the provider flow.
///
/// Reads the current status best-effort and routes the browser to a UX
/// page. The write on this path is advisory; the webhook remains the
/// source of truth, and any failure here still redirects.
async fn identity_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let route = match state.provider.get_status(&query.session_id).await {
        Ok(snapshot) => {
            webhook::advisory_update(&state.pool, &query.session_id, snapshot.status.as_str())
                .await;
            match snapshot.status {
                SessionStatus::Approved => "success",
                SessionStatus::Declined => "failed",
                SessionStatus::InReview => "in_review",
                _ => "pending",
            }
        }
        Err(e) => {
            tracing::warn!(session_id = %query.session_id, "callback status read failed: {e}");
            "pending"
        }
    };

    let target = format!(
        "{}/registration/{route}",
        state.config.server.frontend_base_url.trim_end_matches('/')
    );
    Redirect::to(&target)
}

#[derive(Debug, Deserialize)]
struct AdminApproveRequest {
    admin_id: String,
}

async fn admin_approve(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<AdminApproveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    sessions::admin_approve(
        &state.pool,
        state.provider.as_ref(),
        &body.admin_id,
        &session_id,
    )
    .await?;
    Ok(Json(json!({ "approved": true })))
}
