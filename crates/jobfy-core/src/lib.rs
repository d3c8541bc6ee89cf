pub mod backoff;
pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod registry;
pub mod run;
pub mod run_log;
pub mod site;
pub mod sink;
pub mod throttle;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use error::{AppError, SiteErrorKind};
pub use models::{JobOffer, ParsedPage, RawRecord, compute_hash};
pub use orchestrator::{
    CancelOutcome, OrchestratorConfig, RunEvent, RunHandle, RunReport, RunReporter,
    ScrapeOrchestrator, TracingRunReporter,
};
pub use registry::AdapterRegistry;
pub use run::{RunLogEntry, RunStatus, ScrapeRequest, SiteOutcome};
pub use run_log::RunLogRecorder;
pub use site::{
    Credentials, FetchResponse, HttpMethod, RateLimitPolicy, RequestSpec, SearchQuery,
    SiteDescriptor,
};
pub use sink::MemorySink;
pub use traits::{
    Authenticator, CredentialProvider, HttpClient, JobSink, NoCredentials, NullSink, SinkReport,
    SiteAdapter,
};
