use std::future::Future;

use crate::error::AppError;
use crate::models::{JobOffer, ParsedPage};
use crate::run::RunLogEntry;
use crate::site::{
    Credentials, FetchResponse, RequestSpec, SearchQuery, SiteDescriptor, find_block_marker,
};

/// Executes [`RequestSpec`]s against the network.
///
/// Non-2xx statuses are returned as responses; only transport failures
/// (connect, timeout, TLS) are errors.
pub trait HttpClient: Send + Sync + Clone + 'static {
    fn execute(
        &self,
        request: &RequestSpec,
    ) -> impl Future<Output = Result<FetchResponse, AppError>> + Send;

    /// A client with its own cookie jar, used for one site within one run
    /// so login sessions never leak between runs.
    fn session(&self) -> Result<Self, AppError> {
        Ok(self.clone())
    }
}

/// Knows how to search one job site and read its result pages.
///
/// Adapters hold no mutable state and perform no I/O: they build requests
/// and parse bodies, and the orchestrator does the rest.
pub trait SiteAdapter: Send + Sync {
    fn descriptor(&self) -> &SiteDescriptor;

    fn build_search_request(&self, query: &SearchQuery) -> Result<RequestSpec, AppError>;

    /// Extract records from a search response body.
    ///
    /// Returns `ParseError` only when the body is structurally unusable;
    /// individual incomplete entries are counted in [`ParsedPage::skipped`].
    fn parse_response(&self, body: &str, query: &SearchQuery) -> Result<ParsedPage, AppError>;

    /// Returns a reason when a successful response is actually a captcha
    /// or bot-challenge page.
    fn detect_block(&self, body: &str) -> Option<String> {
        find_block_marker(body).map(|m| format!("anti-bot page detected ({m})"))
    }

    /// Present exactly when [`SiteDescriptor::requires_auth`] is set.
    fn authenticator(&self) -> Option<&dyn Authenticator> {
        None
    }
}

/// Login flow for sites that require an account.
///
/// The flow is an optional login-page fetch (for cookies or CSRF tokens)
/// followed by a form submission whose response is verified.
pub trait Authenticator: Send + Sync {
    fn login_page(&self) -> Option<RequestSpec> {
        None
    }

    /// Build the login submission. `login_page` is the body fetched from
    /// [`Authenticator::login_page`], if any.
    fn login_request(
        &self,
        credentials: &Credentials,
        login_page: Option<&str>,
    ) -> Result<RequestSpec, AppError>;

    /// Decide whether the login submission succeeded.
    fn verify_login(&self, response: &FetchResponse) -> Result<(), AppError>;
}

/// Supplies credentials for sites that require authentication.
pub trait CredentialProvider: Send + Sync + Clone + 'static {
    fn credentials(&self, site_id: &str) -> Option<Credentials>;
}

/// A provider with no credentials at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn credentials(&self, _site_id: &str) -> Option<Credentials> {
        None
    }
}

/// Outcome of handing a batch of offers to a sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SinkReport {
    /// Offers not seen before.
    pub inserted: usize,
    /// Offers whose fingerprint was already stored.
    pub ignored: usize,
}

/// Receives the output of finished runs.
pub trait JobSink: Send + Sync + Clone + 'static {
    /// Store offers, ignoring fingerprints that are already present.
    fn upsert(
        &self,
        offers: &[JobOffer],
    ) -> impl Future<Output = Result<SinkReport, AppError>> + Send;

    /// Store the final log entry of a run.
    fn record_run(&self, entry: &RunLogEntry) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op JobSink for use when persistence is not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl JobSink for NullSink {
    async fn upsert(&self, offers: &[JobOffer]) -> Result<SinkReport, AppError> {
        Ok(SinkReport {
            inserted: 0,
            ignored: offers.len(),
        })
    }

    async fn record_run(&self, _entry: &RunLogEntry) -> Result<(), AppError> {
        Ok(())
    }
}
