//! Turns raw adapter records into [`JobOffer`]s and drops duplicates.

use std::collections::{BTreeSet, HashSet};

use url::Url;

use crate::models::{JobOffer, RawRecord, compute_hash};
use crate::site::SiteDescriptor;

/// Location used when a record carries none.
pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Placeholder some sites emit instead of leaving a field empty.
const PLACEHOLDERS: &[&str] = &["n/a", "na", "-", "none", "null"];

/// Normalizes records from a single site.
#[derive(Debug, Clone)]
pub struct Normalizer {
    source: String,
    base_url: Option<Url>,
}

impl Normalizer {
    pub fn for_site(descriptor: &SiteDescriptor) -> Self {
        Self {
            source: descriptor.id.clone(),
            base_url: Url::parse(&descriptor.base_url).ok(),
        }
    }

    /// Normalize a batch, returning the offers and how many records were
    /// dropped for missing title, company or a usable link.
    pub fn normalize_all(&self, records: Vec<RawRecord>) -> (Vec<JobOffer>, usize) {
        let total = records.len();
        let offers: Vec<JobOffer> = records
            .into_iter()
            .filter_map(|r| self.normalize(r))
            .collect();
        let skipped = total - offers.len();
        (offers, skipped)
    }

    /// Normalize one record, or `None` if it lacks a required field.
    pub fn normalize(&self, raw: RawRecord) -> Option<JobOffer> {
        let title = clean_text(raw.title.as_deref())?;
        let company = clean_text(raw.company.as_deref())?;
        let link = self.resolve_link(raw.link.as_deref()?)?;

        let location =
            clean_text(raw.location.as_deref()).unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
        let salary = clean_text(raw.salary.as_deref());
        let tags = normalize_tags(&raw.tags);

        let fingerprint = self.fingerprint(&link, &title, &company);

        Some(JobOffer {
            title,
            company,
            location,
            salary,
            tags,
            apply_link: link.to_string(),
            source: self.source.clone(),
            fingerprint,
        })
    }

    /// Resolve a possibly relative link against the site's base URL.
    /// Only http(s) links survive.
    fn resolve_link(&self, link: &str) -> Option<Url> {
        let link = link.trim();
        if link.is_empty() {
            return None;
        }
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.base_url.as_ref()?.join(link).ok()?,
            Err(_) => return None,
        };
        matches!(url.scheme(), "http" | "https").then_some(url)
    }

    /// SHA-256 of source and link. When the link only points at the site
    /// root it cannot tell postings apart, so title and company are used.
    fn fingerprint(&self, link: &Url, title: &str, company: &str) -> String {
        if self.is_generic_link(link) {
            compute_hash(&format!(
                "{}\u{1f}{}\u{1f}{}",
                self.source,
                title.to_lowercase(),
                company.to_lowercase()
            ))
        } else {
            compute_hash(&format!("{}\u{1f}{}", self.source, link.as_str()))
        }
    }

    fn is_generic_link(&self, link: &Url) -> bool {
        let bare = matches!(link.path(), "" | "/") && link.query().is_none();
        let is_base = self
            .base_url
            .as_ref()
            .is_some_and(|base| base.as_str().trim_end_matches('/') == link.as_str().trim_end_matches('/'));
        bare || is_base
    }
}

/// Trim a field and treat blanks and placeholders as missing.
fn clean_text(value: Option<&str>) -> Option<String> {
    let collapsed = value?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() || PLACEHOLDERS.contains(&collapsed.to_lowercase().as_str()) {
        None
    } else {
        Some(collapsed)
    }
}

/// Lowercase, split comma-joined values, drop blanks and placeholders.
fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .flat_map(|t| t.split(','))
        .filter_map(|t| clean_text(Some(t)))
        .map(|t| t.to_lowercase())
        .collect()
}

/// Drops offers whose fingerprint was already seen. First writer wins.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
    duplicates: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the offer is new.
    pub fn insert(&mut self, offer: &JobOffer) -> bool {
        let fresh = self.seen.insert(offer.fingerprint.clone());
        if !fresh {
            self.duplicates += 1;
        }
        fresh
    }

    /// Keep only unseen offers from `offers`, in order.
    pub fn retain_new(&mut self, offers: Vec<JobOffer>) -> Vec<JobOffer> {
        offers.into_iter().filter(|o| self.insert(o)).collect()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn unique(&self) -> usize {
        self.seen.len()
    }
}
