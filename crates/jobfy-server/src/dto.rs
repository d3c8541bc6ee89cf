use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobfy_core::run::{RunLogEntry, SiteOutcome};
use jobfy_core::site::SiteDescriptor;
use jobfy_core::sink::StoredOffer;

// ---------------------------------------------------------------------------
// Scrape runs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct StartScrapeRequest {
    /// Site ids to scrape, e.g. `["remoteok", "indeed"]`
    pub sites: Vec<String>,
    /// Search keyword
    pub keyword: Option<String>,
    /// Location filter
    pub location: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StartScrapeResponse {
    pub run_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SiteOutcomeResponse {
    pub count: usize,
    pub skipped: usize,
    /// Error kind, absent when the site succeeded
    pub error: Option<String>,
    pub message: Option<String>,
}

impl From<SiteOutcome> for SiteOutcomeResponse {
    fn from(outcome: SiteOutcome) -> Self {
        Self {
            count: outcome.count,
            skipped: outcome.skipped,
            error: outcome.error.map(|kind| kind.to_string()),
            message: outcome.message,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RunResponse {
    pub id: Uuid,
    pub status: String,
    pub sites: Vec<String>,
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub jobs_found: usize,
    pub per_site_outcome: BTreeMap<String, SiteOutcomeResponse>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
}

impl From<RunLogEntry> for RunResponse {
    fn from(entry: RunLogEntry) -> Self {
        let duration_ms = entry.duration_ms();
        Self {
            id: entry.id,
            status: entry.status.to_string(),
            sites: entry.sites,
            keyword: entry.keyword,
            location: entry.location,
            jobs_found: entry.jobs_found,
            per_site_outcome: entry
                .per_site_outcome
                .into_iter()
                .map(|(site, outcome)| (site, outcome.into()))
                .collect(),
            started_at: entry.started_at,
            finished_at: entry.finished_at,
            duration_ms,
            error: entry.error,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListRunsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RunListResponse {
    pub runs: Vec<RunResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SiteResponse {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub requires_auth: bool,
    /// Whether credentials are available for a site that requires them
    pub credentials_configured: bool,
    pub max_concurrent: usize,
    pub min_interval_ms: u64,
}

impl SiteResponse {
    pub fn new(site: SiteDescriptor, credentials_configured: bool) -> Self {
        Self {
            min_interval_ms: site.rate_limit.min_interval.as_millis() as u64,
            max_concurrent: site.rate_limit.max_concurrent,
            id: site.id,
            display_name: site.display_name,
            base_url: site.base_url,
            requires_auth: site.requires_auth,
            credentials_configured,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SiteListResponse {
    pub sites: Vec<SiteResponse>,
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListOffersQuery {
    /// Only offers from this site
    pub source: Option<String>,
    /// Case-insensitive match on title, company and tags
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OfferResponse {
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: Option<String>,
    pub tags: Vec<String>,
    pub apply_link: String,
    pub source: String,
    pub fingerprint: String,
    pub first_seen: DateTime<Utc>,
}

impl From<StoredOffer> for OfferResponse {
    fn from(stored: StoredOffer) -> Self {
        let offer = stored.offer;
        Self {
            title: offer.title,
            company: offer.company,
            location: offer.location,
            salary: offer.salary,
            tags: offer.tags.into_iter().collect(),
            apply_link: offer.apply_link,
            source: offer.source,
            fingerprint: offer.fingerprint,
            first_seen: stored.first_seen,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OfferListResponse {
    pub offers: Vec<OfferResponse>,
    /// Matching offers before paging
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sites: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
