//! Result-page HTML parsing.
//!
//! The registry has no API; this module reads the HTML its search results
//! page renders. Page structure is brittle, so parsing never panics: an
//! unrecognized page shape is itself a parse outcome the scraper turns
//! into a degraded lookup result.

use crate::types::LicenseRecord;
use scraper::{Html, Selector};

const RESULT_TABLE: &str = "table#resultados tbody tr";
const NO_RESULTS_BANNER: &str = "div.sin-resultados, div.no-results";
const SPECIALTY_PANEL: &str = "div#especialidades li, table#especialidades td";

/// What the result page contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPage {
    /// One license record row
    Record(LicenseRecord),
    /// The registry's explicit "no results" banner
    NoResults,
    /// Neither a record nor the banner; the page shape is unknown
    Unrecognized,
}

fn selector(s: &str) -> Selector {
    // Selectors are fixed literals; a bad one is a programming error.
    #[allow(clippy::expect_used)]
    Selector::parse(s).expect("invalid result-page selector")
}

fn cell_text(row: &scraper::ElementRef<'_>, index: usize) -> Option<String> {
    let cells = selector("td");
    let text = row
        .select(&cells)
        .nth(index)?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// Parse the search results page.
///
/// Row layout observed on the registry: name, profession, license number,
/// registration date. Specialty is never on this page; it lives behind the
/// optional detail control handled by [`parse_specialty_panel`].
#[must_use]
pub fn parse_results_page(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    if document.select(&selector(NO_RESULTS_BANNER)).next().is_some() {
        return ParsedPage::NoResults;
    }

    let Some(row) = document.select(&selector(RESULT_TABLE)).next() else {
        return ParsedPage::Unrecognized;
    };

    let (Some(holder_name), Some(profession)) = (cell_text(&row, 0), cell_text(&row, 1)) else {
        return ParsedPage::Unrecognized;
    };

    ParsedPage::Record(LicenseRecord {
        holder_name,
        profession,
        specialty: None,
        license_number: cell_text(&row, 2),
        registration_date: cell_text(&row, 3),
    })
}

/// Parse the specialty panel revealed by the optional detail control.
///
/// Returns `None` when the panel has no specialty entries.
#[must_use]
pub fn parse_specialty_panel(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let text = document
        .select(&selector(SPECIALTY_PANEL))
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}
