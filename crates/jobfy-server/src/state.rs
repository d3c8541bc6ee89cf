use std::sync::Arc;

use uuid::Uuid;

use jobfy_core::error::AppError;
use jobfy_core::run::{RunLogEntry, ScrapeRequest};
use jobfy_core::site::SiteDescriptor;
use jobfy_core::traits::{CredentialProvider, HttpClient};
use jobfy_core::{CancelOutcome, MemorySink, ScrapeOrchestrator};

/// What the routes need from the orchestrator, independent of its HTTP
/// client and credential source.
pub trait RunControl: Send + Sync {
    fn sites(&self) -> Vec<SiteDescriptor>;

    fn has_credentials(&self, site_id: &str) -> bool;

    /// Validate and start a run in the background, returning its id.
    fn start(&self, request: ScrapeRequest) -> Result<Uuid, AppError>;

    fn cancel(&self, run_id: Uuid) -> CancelOutcome;

    fn get_run(&self, run_id: Uuid) -> Option<RunLogEntry>;

    fn recent_runs(&self, limit: usize) -> Vec<RunLogEntry>;
}

impl<H, C> RunControl for ScrapeOrchestrator<H, C, MemorySink>
where
    H: HttpClient,
    C: CredentialProvider,
{
    fn sites(&self) -> Vec<SiteDescriptor> {
        self.list_sites()
    }

    fn has_credentials(&self, site_id: &str) -> bool {
        self.credentials().credentials(site_id).is_some()
    }

    fn start(&self, request: ScrapeRequest) -> Result<Uuid, AppError> {
        // The run keeps going after its handle is dropped.
        ScrapeOrchestrator::start(self, request).map(|handle| handle.run_id())
    }

    fn cancel(&self, run_id: Uuid) -> CancelOutcome {
        ScrapeOrchestrator::cancel(self, run_id)
    }

    fn get_run(&self, run_id: Uuid) -> Option<RunLogEntry> {
        ScrapeOrchestrator::get_run(self, run_id)
    }

    fn recent_runs(&self, limit: usize) -> Vec<RunLogEntry> {
        ScrapeOrchestrator::recent_runs(self, limit)
    }
}

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub runs: Arc<dyn RunControl>,
    /// Offers collected by every run, shared with the orchestrator.
    pub offers: MemorySink,
    /// API key required on every `/v1` route.
    pub api_key: String,
}

impl AppState {
    pub fn new<H, C>(orchestrator: ScrapeOrchestrator<H, C, MemorySink>, api_key: String) -> Self
    where
        H: HttpClient,
        C: CredentialProvider,
    {
        Self {
            offers: orchestrator.sink().clone(),
            runs: Arc::new(orchestrator),
            api_key,
        }
    }
}
