//! Drives scrape runs: validates requests, fans out one task per site,
//! merges and deduplicates the results, and keeps the run log current.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backoff::{Backoff, RetryConfig};
use crate::error::{AppError, SiteErrorKind};
use crate::models::JobOffer;
use crate::normalize::{Deduplicator, Normalizer};
use crate::registry::AdapterRegistry;
use crate::run::{RunLogEntry, ScrapeRequest, SiteOutcome};
use crate::run_log::RunLogRecorder;
use crate::site::{FetchResponse, RequestSpec, SearchQuery, SiteDescriptor};
use crate::throttle::{RateLimiter, SiteLimiter};
use crate::traits::{Authenticator, CredentialProvider, HttpClient, JobSink, SinkReport, SiteAdapter};

/// Orchestrator configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    /// Sites scraped in parallel within one run.
    pub max_concurrent_sites: usize,
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sites: 5,
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_concurrent_sites(mut self, max: usize) -> Self {
        self.max_concurrent_sites = max.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Events emitted by the orchestrator for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    Rejected {
        run_id: Uuid,
        reason: &'a str,
    },
    Started {
        run_id: Uuid,
        sites: &'a [String],
    },
    SiteStarted {
        run_id: Uuid,
        site: &'a str,
    },
    Authenticated {
        run_id: Uuid,
        site: &'a str,
    },
    RetryScheduled {
        run_id: Uuid,
        site: &'a str,
        retry: u32,
        delay: Duration,
        error: &'a AppError,
    },
    SiteCompleted {
        run_id: Uuid,
        site: &'a str,
        found: usize,
        skipped: usize,
    },
    SiteFailed {
        run_id: Uuid,
        site: &'a str,
        kind: SiteErrorKind,
        error: &'a str,
    },
    SinkFailed {
        run_id: Uuid,
        error: &'a str,
    },
    Finished {
        entry: &'a RunLogEntry,
        duplicates: usize,
    },
}

/// Trait for receiving run events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Rejected { run_id, reason } => {
                tracing::warn!(%run_id, %reason, "Scrape request rejected");
            }
            RunEvent::Started { run_id, sites } => {
                tracing::info!(%run_id, sites = %sites.join(","), "Run started");
            }
            RunEvent::SiteStarted { run_id, site } => {
                tracing::debug!(%run_id, %site, "Scraping site");
            }
            RunEvent::Authenticated { run_id, site } => {
                tracing::info!(%run_id, %site, "Logged in");
            }
            RunEvent::RetryScheduled {
                run_id,
                site,
                retry,
                delay,
                error,
            } => {
                tracing::warn!(
                    %run_id,
                    %site,
                    %retry,
                    delay_ms = %delay.as_millis(),
                    %error,
                    "Retrying request"
                );
            }
            RunEvent::SiteCompleted {
                run_id,
                site,
                found,
                skipped,
            } => {
                tracing::info!(%run_id, %site, %found, %skipped, "Site completed");
            }
            RunEvent::SiteFailed {
                run_id,
                site,
                kind,
                error,
            } => {
                tracing::warn!(%run_id, %site, %kind, %error, "Site failed");
            }
            RunEvent::SinkFailed { run_id, error } => {
                tracing::error!(%run_id, %error, "Failed to store run results");
            }
            RunEvent::Finished { entry, duplicates } => {
                tracing::info!(
                    run_id = %entry.id,
                    status = %entry.status,
                    jobs_found = %entry.jobs_found,
                    %duplicates,
                    duration_ms = ?entry.duration_ms(),
                    "Run finished"
                );
            }
        }
    }
}

/// Final state and output of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub entry: RunLogEntry,
    /// Deduplicated offers, grouped by site in completion order.
    pub offers: Vec<JobOffer>,
    /// `None` when handing results to the sink failed.
    pub sink: Option<SinkReport>,
}

/// Handle to a run started in the background.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<RunReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Ask the run to stop. Sites still working end as `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<RunReport, AppError> {
        self.task
            .await
            .map_err(|e| AppError::Generic(format!("run task failed: {e}")))
    }
}

/// Result of asking the orchestrator to cancel a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyFinished,
    NotFound,
}

/// What one site task produced.
struct SiteResult {
    site: String,
    result: Result<SiteHarvest, AppError>,
}

struct SiteHarvest {
    offers: Vec<JobOffer>,
    skipped: usize,
}

/// Runs scrape requests against the registered sites.
pub struct ScrapeOrchestrator<H, C, S>
where
    H: HttpClient,
    C: CredentialProvider,
    S: JobSink,
{
    registry: Arc<AdapterRegistry>,
    limiter: Arc<RateLimiter>,
    client: H,
    credentials: C,
    sink: S,
    recorder: RunLogRecorder,
    reporter: Arc<dyn RunReporter>,
    config: OrchestratorConfig,
    active: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl<H, C, S> Clone for ScrapeOrchestrator<H, C, S>
where
    H: HttpClient,
    C: CredentialProvider,
    S: JobSink,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            limiter: self.limiter.clone(),
            client: self.client.clone(),
            credentials: self.credentials.clone(),
            sink: self.sink.clone(),
            recorder: self.recorder.clone(),
            reporter: self.reporter.clone(),
            config: self.config,
            active: self.active.clone(),
        }
    }
}

impl<H, C, S> ScrapeOrchestrator<H, C, S>
where
    H: HttpClient,
    C: CredentialProvider,
    S: JobSink,
{
    pub fn new(registry: AdapterRegistry, client: H, credentials: C, sink: S) -> Self {
        let limiter = RateLimiter::from_registry(&registry);
        Self {
            registry: Arc::new(registry),
            limiter: Arc::new(limiter),
            client,
            credentials,
            sink,
            recorder: RunLogRecorder::new(),
            reporter: Arc::new(TracingRunReporter),
            config: OrchestratorConfig::default(),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reporter<R: RunReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn with_recorder(mut self, recorder: RunLogRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn list_sites(&self) -> Vec<SiteDescriptor> {
        self.registry.list()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    pub fn recorder(&self) -> &RunLogRecorder {
        &self.recorder
    }

    pub fn recent_runs(&self, limit: usize) -> Vec<RunLogEntry> {
        self.recorder.recent(limit)
    }

    pub fn get_run(&self, run_id: Uuid) -> Option<RunLogEntry> {
        self.recorder.get(run_id)
    }

    fn active_runs(&self) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_active(&self, run_id: Uuid) -> bool {
        self.active_runs().contains_key(&run_id)
    }

    /// Validate `request` and start the run in the background.
    ///
    /// Must be called within a Tokio runtime. An invalid request is logged
    /// as a failed run and returned as `ValidationError` without any
    /// network activity.
    pub fn start(&self, request: ScrapeRequest) -> Result<RunHandle, AppError> {
        let (entry, sites) = self.prepare(&request)?;
        let run_id = entry.id;
        let cancel = CancellationToken::new();
        let guard = self.begin(entry, sites, &cancel);

        let this = self.clone();
        let token = cancel.clone();
        let query = request.query();
        let task = tokio::spawn(async move { this.execute(guard, query, token).await });

        Ok(RunHandle {
            run_id,
            cancel,
            task,
        })
    }

    /// Validate `request` and run it to completion on the current task.
    ///
    /// Dropping the returned future finalizes the run with its unfinished
    /// sites marked `Cancelled`.
    pub async fn run(
        &self,
        request: ScrapeRequest,
        cancel: CancellationToken,
    ) -> Result<RunReport, AppError> {
        let (entry, sites) = self.prepare(&request)?;
        let guard = self.begin(entry, sites, &cancel);
        Ok(self.execute(guard, request.query(), cancel).await)
    }

    /// Cancel an active run by id.
    pub fn cancel(&self, run_id: Uuid) -> CancelOutcome {
        if let Some(token) = self.active_runs().get(&run_id) {
            token.cancel();
            return CancelOutcome::Cancelled;
        }
        if self.recorder.get(run_id).is_some() {
            CancelOutcome::AlreadyFinished
        } else {
            CancelOutcome::NotFound
        }
    }

    fn prepare(&self, request: &ScrapeRequest) -> Result<(RunLogEntry, Vec<String>), AppError> {
        let mut entry = RunLogEntry::pending(request);
        match request.validate(&self.registry) {
            Ok(sites) => {
                entry.sites = sites.clone();
                self.recorder.publish(&entry);
                Ok((entry, sites))
            }
            Err(e) => {
                let reason = e.to_string();
                entry.fail(&reason);
                self.recorder.publish(&entry);
                self.reporter.report(RunEvent::Rejected {
                    run_id: entry.id,
                    reason: &reason,
                });
                Err(e)
            }
        }
    }

    /// Mark an accepted run as running and register it for cancellation.
    fn begin(
        &self,
        mut entry: RunLogEntry,
        sites: Vec<String>,
        cancel: &CancellationToken,
    ) -> RunGuard {
        entry.mark_running();
        self.recorder.publish(&entry);
        self.active_runs().insert(entry.id, cancel.clone());
        RunGuard {
            entry,
            sites,
            recorder: self.recorder.clone(),
            active: self.active.clone(),
            finished: false,
        }
    }

    async fn execute(
        &self,
        mut guard: RunGuard,
        query: SearchQuery,
        cancel: CancellationToken,
    ) -> RunReport {
        let run_id = guard.entry.id;
        let sites = guard.sites.clone();
        self.reporter.report(RunEvent::Started {
            run_id,
            sites: &sites,
        });

        let results: Vec<SiteResult> = futures::stream::iter(sites)
            .map(|site| {
                let this = self.clone();
                let query = query.clone();
                let cancel = cancel.clone();
                async move {
                    let task = this.run_site(run_id, site.clone(), &query, &cancel);
                    match AssertUnwindSafe(task).catch_unwind().await {
                        Ok(result) => result,
                        Err(panic) => this.site_panicked(run_id, site, panic.as_ref()),
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrent_sites.max(1))
            .collect()
            .await;

        // Merge in completion order.
        let mut dedup = Deduplicator::new();
        let mut offers = Vec::new();
        for SiteResult { site, result } in results {
            let outcome = match result {
                Ok(harvest) => {
                    let kept = dedup.retain_new(harvest.offers);
                    let outcome = SiteOutcome::success(kept.len(), harvest.skipped);
                    offers.extend(kept);
                    outcome
                }
                Err(e) => SiteOutcome::failure(&e),
            };
            guard.entry.record_outcome(&site, outcome);
        }

        let sink = match self.sink.upsert(&offers).await {
            Ok(report) => Some(report),
            Err(e) => {
                self.reporter.report(RunEvent::SinkFailed {
                    run_id,
                    error: &e.to_string(),
                });
                None
            }
        };

        let entry = guard.finish(offers.len());

        if let Err(e) = self.sink.record_run(&entry).await {
            self.reporter.report(RunEvent::SinkFailed {
                run_id,
                error: &e.to_string(),
            });
        }

        self.reporter.report(RunEvent::Finished {
            entry: &entry,
            duplicates: dedup.duplicates(),
        });

        RunReport {
            entry,
            offers,
            sink,
        }
    }

    /// A panicking adapter fails its own site, not the run.
    fn site_panicked(&self, run_id: Uuid, site: String, panic: &(dyn Any + Send)) -> SiteResult {
        let error = AppError::Generic(format!("site task panicked: {}", panic_message(panic)));
        self.reporter.report(RunEvent::SiteFailed {
            run_id,
            site: &site,
            kind: error.site_error_kind(),
            error: &error.to_string(),
        });
        SiteResult {
            site,
            result: Err(error),
        }
    }

    async fn run_site(
        &self,
        run_id: Uuid,
        site: String,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> SiteResult {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AppError::Cancelled),
            result = self.scrape_site(run_id, &site, query) => result,
        };

        match &result {
            Ok(harvest) => self.reporter.report(RunEvent::SiteCompleted {
                run_id,
                site: &site,
                found: harvest.offers.len(),
                skipped: harvest.skipped,
            }),
            Err(e) => self.reporter.report(RunEvent::SiteFailed {
                run_id,
                site: &site,
                kind: e.site_error_kind(),
                error: &e.to_string(),
            }),
        }

        SiteResult { site, result }
    }

    async fn scrape_site(
        &self,
        run_id: Uuid,
        site: &str,
        query: &SearchQuery,
    ) -> Result<SiteHarvest, AppError> {
        self.reporter.report(RunEvent::SiteStarted { run_id, site });

        let adapter = self.registry.resolve(site)?;
        let limiter = self.limiter.for_site(site)?;
        let session = self.client.session()?;
        let mut backoff = Backoff::new(self.config.retry);
        let fetch = SiteFetch {
            run_id,
            site,
            adapter: adapter.as_ref(),
            limiter: &limiter,
            client: &session,
            reporter: self.reporter.as_ref(),
        };

        if adapter.descriptor().requires_auth {
            let auth = adapter.authenticator().ok_or_else(|| {
                AppError::ConfigError(format!("site '{site}' has no authenticator"))
            })?;
            self.authenticate(&fetch, auth, &mut backoff)
                .await
                .map_err(|e| match e {
                    AppError::AuthenticationError(_) | AppError::Cancelled => e,
                    other => AppError::AuthenticationError(format!("login failed: {other}")),
                })?;
            self.reporter.report(RunEvent::Authenticated { run_id, site });
        }

        let request = adapter.build_search_request(query)?;
        let response = fetch.send(&request, &mut backoff).await?;
        let page = adapter.parse_response(&response.body, query)?;

        let (offers, dropped) = Normalizer::for_site(adapter.descriptor()).normalize_all(page.records);
        Ok(SiteHarvest {
            offers,
            skipped: page.skipped + dropped,
        })
    }

    async fn authenticate(
        &self,
        fetch: &SiteFetch<'_, H>,
        auth: &dyn Authenticator,
        backoff: &mut Backoff,
    ) -> Result<(), AppError> {
        let credentials = self.credentials.credentials(fetch.site).ok_or_else(|| {
            AppError::AuthenticationError(format!("no credentials configured for '{}'", fetch.site))
        })?;

        let login_page = match auth.login_page() {
            Some(request) => Some(fetch.send(&request, backoff).await?.body),
            None => None,
        };

        let request = auth.login_request(&credentials, login_page.as_deref())?;
        let response = fetch.send(&request, backoff).await?;
        auth.verify_login(&response)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Owns the log entry of a running run.
///
/// A run whose future is dropped or unwinds before [`RunGuard::finish`] is
/// still finalized: sites without an outcome are recorded as `Cancelled`
/// and the run leaves the active set.
struct RunGuard {
    entry: RunLogEntry,
    sites: Vec<String>,
    recorder: RunLogRecorder,
    active: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    finished: bool,
}

impl RunGuard {
    fn finish(&mut self, jobs_found: usize) -> RunLogEntry {
        self.entry.complete(jobs_found);
        self.close();
        self.entry.clone()
    }

    fn close(&mut self) {
        self.finished = true;
        self.recorder.publish(&self.entry);
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.entry.id);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        for site in &self.sites {
            if !self.entry.per_site_outcome.contains_key(site) {
                self.entry.record_outcome(site, SiteOutcome::cancelled());
            }
        }
        let jobs_found = self.entry.per_site_outcome.values().map(|o| o.count).sum();
        self.entry.complete(jobs_found);
        self.close();
        tracing::warn!(
            run_id = %self.entry.id,
            "Run abandoned before finishing, unfinished sites cancelled"
        );
    }
}

/// Everything one site task needs to issue requests.
struct SiteFetch<'a, H> {
    run_id: Uuid,
    site: &'a str,
    adapter: &'a dyn SiteAdapter,
    limiter: &'a SiteLimiter,
    client: &'a H,
    reporter: &'a dyn RunReporter,
}

impl<H: HttpClient> SiteFetch<'_, H> {
    /// Send a request, retrying transient failures with backoff.
    async fn send(
        &self,
        request: &RequestSpec,
        backoff: &mut Backoff,
    ) -> Result<FetchResponse, AppError> {
        loop {
            let err = match self.attempt(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };
            let Some(delay) = backoff.next_delay() else {
                return Err(err);
            };
            self.reporter.report(RunEvent::RetryScheduled {
                run_id: self.run_id,
                site: self.site,
                retry: backoff.retries(),
                delay,
                error: &err,
            });
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, request: &RequestSpec) -> Result<FetchResponse, AppError> {
        let response = {
            let _slot = self.limiter.acquire().await?;
            self.client.execute(request).await?
        };
        response.error_for_status()?;
        if let Some(reason) = self.adapter.detect_block(&response.body) {
            return Err(AppError::BlockedError(reason));
        }
        Ok(response)
    }
}
