use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::models::JobOffer;
use crate::run::RunLogEntry;
use crate::traits::{JobSink, SinkReport};

/// An offer as held by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOffer {
    #[serde(flatten)]
    pub offer: JobOffer,
    pub first_seen: DateTime<Utc>,
}

/// Filters for listing stored offers.
#[derive(Debug, Clone, Default)]
pub struct OfferQuery {
    pub source: Option<String>,
    /// Case-insensitive match against title, company and tags.
    pub search: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferPage {
    pub offers: Vec<StoredOffer>,
    /// Matches before paging.
    pub total: usize,
}

#[derive(Debug, Default)]
struct MemorySinkInner {
    offers: Vec<StoredOffer>,
    fingerprints: HashSet<String>,
    runs: Vec<RunLogEntry>,
}

/// A [`JobSink`] that keeps everything in memory, deduplicating across runs
/// by fingerprint. Newest offers list first.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<RwLock<MemorySinkInner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemorySinkInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemorySinkInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn list(&self, query: &OfferQuery) -> OfferPage {
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let inner = self.read();
        let matching: Vec<&StoredOffer> = inner
            .offers
            .iter()
            .rev()
            .filter(|s| {
                query
                    .source
                    .as_deref()
                    .is_none_or(|src| s.offer.source.eq_ignore_ascii_case(src))
            })
            .filter(|s| needle.as_deref().is_none_or(|n| matches_search(&s.offer, n)))
            .collect();

        OfferPage {
            total: matching.len(),
            offers: matching
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.read().offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().offers.is_empty()
    }

    /// Every recorded run, oldest first.
    pub fn runs(&self) -> Vec<RunLogEntry> {
        self.read().runs.clone()
    }
}

fn matches_search(offer: &JobOffer, needle: &str) -> bool {
    offer.title.to_lowercase().contains(needle)
        || offer.company.to_lowercase().contains(needle)
        || offer.tags.iter().any(|t| t.contains(needle))
}

impl JobSink for MemorySink {
    async fn upsert(&self, offers: &[JobOffer]) -> Result<SinkReport, AppError> {
        let now = Utc::now();
        let mut inner = self.write();
        let mut report = SinkReport::default();
        for offer in offers {
            if inner.fingerprints.insert(offer.fingerprint.clone()) {
                inner.offers.push(StoredOffer {
                    offer: offer.clone(),
                    first_seen: now,
                });
                report.inserted += 1;
            } else {
                report.ignored += 1;
            }
        }
        Ok(report)
    }

    async fn record_run(&self, entry: &RunLogEntry) -> Result<(), AppError> {
        self.write().runs.push(entry.clone());
        Ok(())
    }
}
