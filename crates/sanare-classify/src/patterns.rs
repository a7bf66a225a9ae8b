//! Profession pattern tables.
//!
//! Two ordered lists drive classification: exclusions first, then
//! inclusions. The order is load-bearing. Registry profession strings for
//! excluded professions can contain generic medical tokens ("MÉDICO(A)
//! VETERINARIO(A)" contains "MÉDICO"), so an inclusion match must never be
//! consulted until every exclusion has been ruled out.

use once_cell::sync::Lazy;
use regex::Regex;

/// A named profession pattern.
#[derive(Debug)]
pub struct ProfessionPattern {
    /// Canonical profession key used by the dashboard table
    pub key: &'static str,
    /// Pattern matched against the uppercased raw profession text
    pub regex: Regex,
}

fn pattern(key: &'static str, re: &str) -> ProfessionPattern {
    ProfessionPattern {
        key,
        // Table patterns are fixed literals; a bad one is a programming error.
        #[allow(clippy::expect_used)]
        regex: Regex::new(re).expect("invalid profession pattern"),
    }
}

/// Professions that must never be admitted, evaluated before any inclusion.
pub static EXCLUSIONS: Lazy<Vec<ProfessionPattern>> = Lazy::new(|| {
    vec![
        pattern("veterinary", r"VETERINARI[OA]"),
        pattern("dentistry", r"DENTISTA|ODONT[ÓO]LOG[OA]"),
        pattern("cosmetology", r"COSMET[ÓO]LOG[OA]|EST[ÉE]TICA"),
        pattern("optician", r"[ÓO]PTIC[OA]|CONTACT[ÓO]LOG[OA]"),
    ]
});

/// Valid human-medicine professions, evaluated only after exclusions.
pub static INCLUSIONS: Lazy<Vec<ProfessionPattern>> = Lazy::new(|| {
    vec![
        pattern("medicine", r"M[ÉE]DICO\(?A?\)?\s+CIRUJAN[OA]|M[ÉE]DICO\(A\)\s+CIRUJANO\(A\)"),
        pattern("nursing", r"ENFERMER[OA]"),
        pattern("midwifery", r"MATR[ÓO]N(A|\(A\))?"),
        pattern("pharmacy", r"QU[ÍI]MICO\(?A?\)?\s*FARMAC[ÉE]UTIC[OA]"),
        pattern("psychology", r"PSIC[ÓO]LOG[OA]"),
        pattern("kinesiology", r"KINESI[ÓO]LOG[OA]"),
        pattern("nutrition", r"NUTRICIONISTA"),
        pattern("medical-technology", r"TECN[ÓO]LOG[OA]\s+M[ÉE]DIC[OA]"),
    ]
});

/// Marker that must be present for a raw specialty field to count.
///
/// Without it the specialty text is treated as decorative and the generic
/// default applies. In particular the base profession label is never echoed
/// back as a specialty.
pub static SPECIALTY_MARKER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"ESPECIALISTA\s+EN\s+\S").expect("invalid specialty marker pattern")
});

/// Specialty assigned when no explicit marker is present.
pub const DEFAULT_SPECIALTY: &str = "MEDICINA GENERAL";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusions_match_registry_spellings() {
        assert!(EXCLUSIONS[0].regex.is_match("MÉDICO(A) VETERINARIO(A)"));
        assert!(EXCLUSIONS[1].regex.is_match("CIRUJANO(A) DENTISTA"));
        assert!(!EXCLUSIONS[0].regex.is_match("MÉDICO(A) CIRUJANO(A)"));
    }

    #[test]
    fn test_inclusions_match_registry_spellings() {
        let medicine = &INCLUSIONS[0];
        assert_eq!(medicine.key, "medicine");
        assert!(medicine.regex.is_match("MÉDICO(A) CIRUJANO(A)"));
        assert!(medicine.regex.is_match("MEDICO CIRUJANO"));
    }

    #[test]
    fn test_specialty_marker_requires_a_named_specialty() {
        assert!(SPECIALTY_MARKER.is_match("ESPECIALISTA EN MEDICINA INTERNA"));
        assert!(!SPECIALTY_MARKER.is_match("MEDICINA INTERNA"));
        assert!(!SPECIALTY_MARKER.is_match("ESPECIALISTA EN "));
    }
}
