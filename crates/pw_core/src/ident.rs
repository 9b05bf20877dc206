//! Canonical identifier forms for the supported source namespaces.
//!
//! Lookups accept whatever a user pastes: bare IDs, compact IDs missing
//! their separator, abstract-page URLs, PDF links, DOI resolver links.
//! Everything funnels through here before a provider request is built,
//! and normalizing an already-canonical ID is an identity operation.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

/// Registrant prefix shared by every medRxiv DOI.
pub const MEDRXIV_DOI_PREFIX: &str = "10.1101";

lazy_static! {
    static ref DOI_PATTERN: Regex =
        Regex::new(r"10\.\d{4,}/\d{4}\.\d{2}\.\d{2}\.\d+").unwrap();
}

/// Canonical arXiv form: `NNNN.NNNNN` with an optional version suffix.
pub fn normalize_arxiv(raw: &str) -> Result<String> {
    let mut id = raw.trim();
    // Any URL form collapses to its last path component.
    if let Some((_, tail)) = id.rsplit_once('/') {
        id = tail;
    }
    let id = id.strip_suffix(".pdf").unwrap_or(id);
    let id = id.strip_prefix("abs/").unwrap_or(id);
    if id.is_empty() {
        return Err(Error::InvalidIdentifier(raw.to_string()));
    }
    Ok(with_separator(id))
}

/// Canonical medRxiv form: the full DOI `10.1101/suffix`.
pub fn normalize_doi(raw: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(Error::InvalidIdentifier(raw.to_string()));
    }
    if id.starts_with(MEDRXIV_DOI_PREFIX) {
        return Ok(id.to_string());
    }
    if let Some(found) = DOI_PATTERN.find(id) {
        return Ok(found.as_str().to_string());
    }
    // Bare dated suffix, possibly at the end of a content URL.
    let suffix = id.rsplit('/').next().unwrap_or(id);
    if suffix.is_empty() {
        return Err(Error::InvalidIdentifier(raw.to_string()));
    }
    Ok(format!("{}/{}", MEDRXIV_DOI_PREFIX, suffix))
}

/// Strip separators for use as a command-safe reference token.
pub fn without_separator(id: &str) -> String {
    id.replace('.', "")
}

/// Reinsert the dot into a compact 9-10 digit arXiv ID. Anything that is
/// not the fixed-width compact form passes through untouched.
pub fn with_separator(id: &str) -> String {
    if id.contains('.') {
        return id.to_string();
    }
    let compact = (9..=10).contains(&id.len()) && id.chars().all(|c| c.is_ascii_digit());
    if compact {
        format!("{}.{}", &id[..4], &id[4..])
    } else {
        id.to_string()
    }
}

/// Token embedded in rendered digests for follow-up lookup commands:
/// last path component of the canonical ID with separators stripped.
pub fn reference_token(canonical_id: &str) -> String {
    let tail = canonical_id.rsplit('/').next().unwrap_or(canonical_id);
    without_separator(tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_arxiv_identity() {
        assert_eq!(normalize_arxiv("2401.12345").unwrap(), "2401.12345");
    }

    #[test]
    fn test_normalize_arxiv_compact() {
        assert_eq!(normalize_arxiv("240112345").unwrap(), "2401.12345");
        assert_eq!(normalize_arxiv("2401123456").unwrap(), "2401.123456");
    }

    #[test]
    fn test_normalize_arxiv_url_forms() {
        assert_eq!(
            normalize_arxiv("https://arxiv.org/abs/2401.12345").unwrap(),
            "2401.12345"
        );
        assert_eq!(
            normalize_arxiv("https://arxiv.org/abs/2401.12345v2").unwrap(),
            "2401.12345v2"
        );
        assert_eq!(
            normalize_arxiv("https://arxiv.org/pdf/2401.12345.pdf").unwrap(),
            "2401.12345"
        );
        assert_eq!(normalize_arxiv("abs/2401.12345").unwrap(), "2401.12345");
    }

    #[test]
    fn test_normalize_arxiv_idempotent() {
        for raw in [
            "2401.12345",
            "240112345",
            "https://arxiv.org/abs/2401.12345",
            "https://arxiv.org/pdf/2401.12345.pdf",
        ] {
            let once = normalize_arxiv(raw).unwrap();
            let twice = normalize_arxiv(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_normalize_arxiv_rejects_empty() {
        assert!(normalize_arxiv("").is_err());
        assert!(normalize_arxiv("https://arxiv.org/").is_err());
    }

    #[test]
    fn test_normalize_doi_identity() {
        assert_eq!(
            normalize_doi("10.1101/2024.01.01.123456").unwrap(),
            "10.1101/2024.01.01.123456"
        );
    }

    #[test]
    fn test_normalize_doi_from_url() {
        assert_eq!(
            normalize_doi("https://www.medrxiv.org/content/10.1101/2024.01.01.123456.full.pdf")
                .unwrap(),
            "10.1101/2024.01.01.123456"
        );
    }

    #[test]
    fn test_normalize_doi_bare_suffix() {
        assert_eq!(
            normalize_doi("2024.01.01.123456").unwrap(),
            "10.1101/2024.01.01.123456"
        );
    }

    #[test]
    fn test_normalize_doi_idempotent() {
        for raw in [
            "10.1101/2024.01.01.123456",
            "2024.01.01.123456",
            "https://www.medrxiv.org/content/10.1101/2024.01.01.123456v1",
        ] {
            let once = normalize_doi(raw).unwrap();
            let twice = normalize_doi(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_normalize_doi_rejects_empty() {
        assert!(normalize_doi("").is_err());
        assert!(normalize_doi("   ").is_err());
    }

    #[test]
    fn test_separator_round_trip() {
        assert_eq!(without_separator("2401.12345"), "240112345");
        assert_eq!(with_separator("240112345"), "2401.12345");
        assert_eq!(without_separator(&with_separator("240112345")), "240112345");
        assert_eq!(with_separator(&without_separator("2401.12345")), "2401.12345");
        // Non-compact input passes through.
        assert_eq!(with_separator("240112345v2"), "240112345v2");
    }

    #[test]
    fn test_reference_token() {
        assert_eq!(reference_token("2401.12345"), "240112345");
        assert_eq!(
            reference_token("10.1101/2024.01.01.123456"),
            "20240101123456"
        );
    }
}
