use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A normalized job posting, ready for storage or export.
///
/// Every offer leaving the normalizer has non-empty `title`, `company`,
/// `location`, `apply_link` and `source`, and a fingerprint derived
/// from its source and link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOffer {
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: Option<String>,
    /// Lowercased, deduplicated, sorted.
    pub tags: BTreeSet<String>,
    /// Absolute URL of the posting.
    pub apply_link: String,
    /// Id of the site adapter that produced the offer.
    pub source: String,
    /// SHA-256 hex digest identifying the posting across runs.
    pub fingerprint: String,
}

/// A record as scraped from a page, before normalization.
///
/// Adapters fill in whatever they found; validation happens later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub tags: Vec<String>,
    pub link: Option<String>,
}

impl RawRecord {
    /// Title and link are the minimum an adapter must find for a record
    /// to be worth emitting.
    pub fn has_minimum(&self) -> bool {
        is_present(self.title.as_deref()) && is_present(self.link.as_deref())
    }
}

/// Records extracted from one response, plus how many entries were dropped
/// for lacking the minimum fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub records: Vec<RawRecord>,
    pub skipped: usize,
}

impl ParsedPage {
    /// Add a record, counting it as skipped if it lacks title or link.
    pub fn push(&mut self, record: RawRecord) {
        if record.has_minimum() {
            self.records.push(record);
        } else {
            self.skipped += 1;
        }
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<RawRecord> for ParsedPage {
    fn from_iter<I: IntoIterator<Item = RawRecord>>(iter: I) -> Self {
        let mut page = ParsedPage::default();
        for record in iter {
            page.push(record);
        }
        page
    }
}

fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("remoteok\u{1f}https://remoteok.com/1");
        let h2 = compute_hash("remoteok\u{1f}https://remoteok.com/1");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, compute_hash("remoteok\u{1f}https://remoteok.com/2"));
    }

    #[test]
    fn test_parsed_page_counts_incomplete_records() {
        let page: ParsedPage = vec![
            RawRecord {
                title: Some("Rust Engineer".into()),
                link: Some("/jobs/1".into()),
                ..Default::default()
            },
            RawRecord {
                title: Some("  ".into()),
                link: Some("/jobs/2".into()),
                ..Default::default()
            },
            RawRecord {
                title: Some("No link".into()),
                ..Default::default()
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(page.len(), 1);
        assert_eq!(page.skipped, 2);
    }

    #[test]
    fn test_job_offer_serializes_snake_case() {
        let offer = JobOffer {
            title: "Backend Dev".into(),
            company: "Acme".into(),
            location: "Remote".into(),
            salary: None,
            tags: ["rust".to_string()].into_iter().collect(),
            apply_link: "https://example.com/1".into(),
            source: "remoteok".into(),
            fingerprint: "abc".into(),
        };
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["apply_link"], "https://example.com/1");
        assert!(json["salary"].is_null());
        assert_eq!(json["tags"][0], "rust");
    }
}
