use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, SiteErrorKind};
use crate::registry::AdapterRegistry;
use crate::site::SearchQuery;

/// Status of a scrape run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Pending → Running → Completed, or Pending → Failed.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// A request to scrape a set of sites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub sites: Vec<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl ScrapeRequest {
    pub fn new<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sites: sites.into_iter().map(Into::into).collect(),
            keyword: None,
            location: None,
        }
    }

    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keyword = Some(keyword.to_string());
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    /// Site ids trimmed, lowercased and deduplicated, in submission order.
    pub fn site_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.sites.len());
        for id in &self.sites {
            let id = id.trim().to_lowercase();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(self.keyword.as_deref(), self.location.as_deref())
    }

    /// Check the request against the registry, returning the site ids to run.
    pub fn validate(&self, registry: &AdapterRegistry) -> Result<Vec<String>, AppError> {
        let ids = self.site_ids();
        if ids.is_empty() {
            return Err(AppError::ValidationError(
                "at least one site must be specified".into(),
            ));
        }

        let unknown: Vec<&str> = ids
            .iter()
            .filter(|id| !registry.contains(id))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(AppError::ValidationError(format!(
                "unknown sites: {}",
                unknown.join(", ")
            )));
        }

        Ok(ids)
    }
}

/// What happened at one site during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteOutcome {
    /// Offers from this site that survived deduplication.
    pub count: usize,
    /// Records dropped while parsing or normalizing.
    pub skipped: usize,
    pub error: Option<SiteErrorKind>,
    pub message: Option<String>,
}

impl SiteOutcome {
    pub fn success(count: usize, skipped: usize) -> Self {
        Self {
            count,
            skipped,
            error: None,
            message: None,
        }
    }

    pub fn failure(error: &AppError) -> Self {
        Self {
            count: 0,
            skipped: 0,
            error: Some(error.site_error_kind()),
            message: Some(error.to_string()),
        }
    }

    pub fn cancelled() -> Self {
        Self::failure(&AppError::Cancelled)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The record of one run. Once terminal it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: Uuid,
    pub status: RunStatus,
    /// Sites as submitted, replaced by the normalized ids that key
    /// `per_site_outcome` once the request is accepted.
    pub sites: Vec<String>,
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub jobs_found: usize,
    pub per_site_outcome: BTreeMap<String, SiteOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the run itself failed (not a single site).
    pub error: Option<String>,
}

impl RunLogEntry {
    pub fn pending(request: &ScrapeRequest) -> Self {
        let query = request.query();
        Self {
            id: Uuid::new_v4(),
            status: RunStatus::Pending,
            sites: request.sites.clone(),
            keyword: query.keyword,
            location: query.location,
            jobs_found: 0,
            per_site_outcome: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: RunStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                run_id = %self.id,
                from = %self.status,
                to = %next,
                "Ignoring invalid run status transition"
            );
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    pub fn mark_running(&mut self) -> bool {
        self.transition(RunStatus::Running)
    }

    /// Record a site's outcome. Ignored once the run is finalized.
    pub fn record_outcome(&mut self, site: &str, outcome: SiteOutcome) {
        if self.is_finalized() {
            return;
        }
        self.per_site_outcome.insert(site.to_string(), outcome);
    }

    pub fn complete(&mut self, jobs_found: usize) -> bool {
        if self.transition(RunStatus::Completed) {
            self.jobs_found = jobs_found;
            true
        } else {
            false
        }
    }

    pub fn fail(&mut self, message: &str) -> bool {
        if self.transition(RunStatus::Failed) {
            self.error = Some(message.to_string());
            true
        } else {
            false
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
