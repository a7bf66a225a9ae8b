//! One scrape attempt against the registry search form.
//!
//! Each attempt runs in its own [`BrowserSession`] which is closed on every
//! exit path. The specialty detail control is optional on the result page;
//! it is probed with its own bounded timeout and its absence simply leaves
//! `specialty` empty.

use crate::parser::{self, ParsedPage};
use crate::types::RegistryOutcome;
use async_trait::async_trait;
use sanare_browser::{BrowserSession, Result as BrowserResult};
use sanare_core::config::RegistryConfig;
use sanare_core::types::DocumentType;
use std::time::Duration;

/// One lookup attempt, behind a trait so the retry loop in the service can
/// be driven by a scripted fetcher in tests.
#[async_trait]
pub trait LicenseFetcher: Send + Sync {
    /// Run a single attempt against the registry.
    async fn fetch(
        &self,
        config: &RegistryConfig,
        document_type: DocumentType,
        document_number: &str,
    ) -> BrowserResult<RegistryOutcome>;
}

/// Production fetcher driving a real [`BrowserSession`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserFetcher;

#[async_trait]
impl LicenseFetcher for BrowserFetcher {
    async fn fetch(
        &self,
        config: &RegistryConfig,
        document_type: DocumentType,
        document_number: &str,
    ) -> BrowserResult<RegistryOutcome> {
        scrape_once(config, document_type, document_number).await
    }
}

const DOC_TYPE_RUN: &str = "input[name='tipoDocumento'][value='run']";
const DOC_TYPE_PASSPORT: &str = "input[name='tipoDocumento'][value='pasaporte']";
const SEARCH_INPUT: &str = "input#numeroDocumento";
const SEARCH_BUTTON: &str = "button#btnBuscar";
const RESULTS_READY: &str = "table#resultados, div.sin-resultados, div.no-results";
const SPECIALTY_TOGGLE: &str = "a#verEspecialidades, button#verEspecialidades";
const SPECIALTY_PANEL_READY: &str = "div#especialidades";

/// Run a single lookup attempt end to end.
///
/// `Ok` carries the registry's answer, including a degraded
/// [`RegistryOutcome::Error`] for an unrecognizable page. `Err` means a
/// browser-level failure the caller may retry.
pub async fn scrape_once(
    config: &RegistryConfig,
    document_type: DocumentType,
    document_number: &str,
) -> BrowserResult<RegistryOutcome> {
    let session = BrowserSession::launch(
        config.headless,
        Duration::from_secs(config.step_timeout_secs),
    )
    .await?;

    let result = run_attempt(&session, config, document_type, document_number).await;
    session.close().await;
    result
}

async fn run_attempt(
    session: &BrowserSession,
    config: &RegistryConfig,
    document_type: DocumentType,
    document_number: &str,
) -> BrowserResult<RegistryOutcome> {
    session.navigate(&config.search_url).await?;

    let type_selector = match document_type {
        DocumentType::Run => DOC_TYPE_RUN,
        DocumentType::Passport => DOC_TYPE_PASSPORT,
    };
    session.click(type_selector).await?;
    session.fill_field(SEARCH_INPUT, document_number).await?;
    session.click(SEARCH_BUTTON).await?;

    session
        .wait_for_selector(RESULTS_READY, Duration::from_secs(config.step_timeout_secs))
        .await?;

    let html = session.content().await?;
    match parser::parse_results_page(&html) {
        ParsedPage::NoResults => Ok(RegistryOutcome::NotFound),
        ParsedPage::Unrecognized => {
            tracing::warn!(document_number, "unrecognized result page shape");
            Ok(RegistryOutcome::Error {
                reason: "unrecognized result page".to_string(),
            })
        }
        ParsedPage::Record(mut record) => {
            record.specialty = probe_specialty(session, config).await;
            Ok(RegistryOutcome::Found(record))
        }
    }
}

/// Probe the optional specialty control within its bounded timeout.
///
/// The control only renders for professionals with a postgraduate
/// specialty on file. Never waits past the probe timeout; any failure
/// along this path degrades to no specialty.
async fn probe_specialty(session: &BrowserSession, config: &RegistryConfig) -> Option<String> {
    let probe_timeout = Duration::from_secs(config.specialty_probe_timeout_secs);

    if !session.probe_selector(SPECIALTY_TOGGLE, probe_timeout).await {
        tracing::debug!("no specialty control on result page");
        return None;
    }

    if let Err(e) = session.click(SPECIALTY_TOGGLE).await {
        tracing::debug!("specialty control click failed: {e}");
        return None;
    }
    if !session
        .probe_selector(SPECIALTY_PANEL_READY, probe_timeout)
        .await
    {
        return None;
    }

    match session.content().await {
        Ok(html) => parser::parse_specialty_panel(&html),
        Err(e) => {
            tracing::debug!("specialty panel read failed: {e}");
            None
        }
    }
}
