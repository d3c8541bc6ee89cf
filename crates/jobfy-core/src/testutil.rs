//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit and integration
//! tests. All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls. Enabled for other crates through the
//! `testutil` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::AppError;
use crate::models::{JobOffer, ParsedPage, RawRecord, compute_hash};
use crate::orchestrator::{RunEvent, RunReporter};
use crate::site::{
    Credentials, FetchResponse, RateLimitPolicy, RequestSpec, SearchQuery, SiteDescriptor,
};
use crate::traits::{Authenticator, CredentialProvider, HttpClient, SiteAdapter};

// ---------------------------------------------------------------------------
// MockHttpClient
// ---------------------------------------------------------------------------

/// A scripted response. Cloneable so the last one can repeat forever.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Status { status: u16, body: String },
    Network(String),
    Timeout,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        MockResponse::Status {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        MockResponse::Status {
            status,
            body: String::new(),
        }
    }

    pub fn network(message: &str) -> Self {
        MockResponse::Network(message.to_string())
    }

    fn into_result(self, url: &str) -> Result<FetchResponse, AppError> {
        match self {
            MockResponse::Status { status, body } => Ok(FetchResponse::new(status, url, body)),
            MockResponse::Network(msg) => Err(AppError::NetworkError(msg)),
            MockResponse::Timeout => Err(AppError::Timeout(30)),
        }
    }
}

/// Recorded call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub request: RequestSpec,
    pub at: Instant,
}

/// Mock HTTP client answering by URL prefix.
///
/// Each route holds a queue of responses; each call pops the first one,
/// and the last one is repeated once the queue is down to a single entry.
/// The longest matching prefix wins. Unrouted URLs get a `NetworkError`.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    routes: Arc<Mutex<Vec<(String, VecDeque<MockResponse>)>>>,
    latency: Option<Duration>,
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    pub sessions: Arc<Mutex<usize>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, prefix: &str, response: MockResponse) -> Self {
        self.route_sequence(prefix, vec![response])
    }

    pub fn route_sequence(self, prefix: &str, responses: Vec<MockResponse>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .push((prefix.to_string(), responses.into()));
        self
    }

    /// Delay every response, e.g. to keep requests in flight for cancellation tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.request.url.starts_with(prefix))
            .count()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.request.url.clone())
            .collect()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|c| c.at).collect()
    }

    fn next_response(&self, url: &str) -> MockResponse {
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        match route {
            Some((_, queue)) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some((_, queue)) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| MockResponse::network("empty route")),
            None => MockResponse::Network(format!("no mock route for {url}")),
        }
    }
}

impl HttpClient for MockHttpClient {
    async fn execute(&self, request: &RequestSpec) -> Result<FetchResponse, AppError> {
        self.calls.lock().unwrap().push(MockCall {
            request: request.clone(),
            at: Instant::now(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_response(&request.url).into_result(&request.url)
    }

    fn session(&self) -> Result<Self, AppError> {
        *self.sessions.lock().unwrap() += 1;
        Ok(self.clone())
    }
}

// ---------------------------------------------------------------------------
// StubAdapter
// ---------------------------------------------------------------------------

/// Adapter for a fake site at `https://{id}.test`.
///
/// Search goes to `/search?q={keyword}` and expects a JSON array of
/// `{title, company, link, location, salary, tags}` objects (see [`listing`]).
/// With [`StubAdapter::with_auth`] it logs in by posting to `/login` and
/// accepts any body containing "welcome".
#[derive(Debug, Clone)]
pub struct StubAdapter {
    descriptor: SiteDescriptor,
    authenticator: Option<StubAuthenticator>,
}

#[derive(Debug, Clone)]
pub struct StubAuthenticator {
    login_url: String,
}

impl StubAdapter {
    pub fn new(id: &str) -> Self {
        let descriptor = SiteDescriptor::new(id, &id.to_uppercase(), &format!("https://{id}.test"))
            .with_rate_limit(RateLimitPolicy::unlimited());
        Self {
            descriptor,
            authenticator: None,
        }
    }

    pub fn with_auth(mut self) -> Self {
        self.authenticator = Some(StubAuthenticator {
            login_url: format!("{}/login", self.descriptor.base_url),
        });
        self.descriptor.requires_auth = true;
        self
    }

    /// Claims to require auth without providing an authenticator.
    pub fn with_missing_authenticator(mut self) -> Self {
        self.descriptor.requires_auth = true;
        self.authenticator = None;
        self
    }

    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.descriptor.rate_limit = policy;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.descriptor.base_url = base_url.to_string();
        self
    }
}

impl SiteAdapter for StubAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn build_search_request(&self, query: &SearchQuery) -> Result<RequestSpec, AppError> {
        let mut url = format!("{}/search", self.descriptor.base_url);
        if let Some(keyword) = &query.keyword {
            url.push_str("?q=");
            url.push_str(keyword);
        }
        Ok(RequestSpec::get(url))
    }

    fn parse_response(&self, body: &str, _query: &SearchQuery) -> Result<ParsedPage, AppError> {
        let items: Vec<serde_json::Value> = serde_json::from_str(body)
            .map_err(|e| AppError::ParseError(format!("stub listing: {e}")))?;
        let field = |item: &serde_json::Value, key: &str| {
            item.get(key).and_then(|v| v.as_str()).map(str::to_string)
        };
        Ok(items
            .iter()
            .map(|item| RawRecord {
                title: field(item, "title"),
                company: field(item, "company"),
                location: field(item, "location"),
                salary: field(item, "salary"),
                tags: item
                    .get("tags")
                    .and_then(|t| t.as_array())
                    .map(|tags| {
                        tags.iter()
                            .filter_map(|t| t.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                link: field(item, "link"),
            })
            .collect())
    }

    fn authenticator(&self) -> Option<&dyn Authenticator> {
        self.authenticator.as_ref().map(|a| a as &dyn Authenticator)
    }
}

impl Authenticator for StubAuthenticator {
    fn login_request(
        &self,
        credentials: &Credentials,
        _login_page: Option<&str>,
    ) -> Result<RequestSpec, AppError> {
        Ok(RequestSpec::post_form(
            self.login_url.clone(),
            [
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ],
        ))
    }

    fn verify_login(&self, response: &FetchResponse) -> Result<(), AppError> {
        if response.body.contains("welcome") {
            Ok(())
        } else {
            Err(AppError::AuthenticationError("login rejected".into()))
        }
    }
}

/// Render `(title, company, link)` triples as a [`StubAdapter`] listing body.
pub fn listing(entries: &[(&str, &str, &str)]) -> String {
    let items: Vec<serde_json::Value> = entries
        .iter()
        .map(|(title, company, link)| {
            serde_json::json!({
                "title": title,
                "company": company,
                "link": link,
                "location": "Remote",
                "tags": ["rust"],
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

// ---------------------------------------------------------------------------
// MockCredentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MockCredentials {
    credentials: HashMap<String, Credentials>,
}

impl MockCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, site: &str, username: &str, password: &str) -> Self {
        self.credentials
            .insert(site.to_string(), Credentials::new(username, password));
        self
    }
}

impl CredentialProvider for MockCredentials {
    fn credentials(&self, site_id: &str) -> Option<Credentials> {
        self.credentials.get(site_id).cloned()
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Run reporter that records event labels and retry delays.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    pub delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl RunReporter for RecordingReporter {
    fn report(&self, event: RunEvent<'_>) {
        let label = match &event {
            RunEvent::Rejected { .. } => "Rejected",
            RunEvent::Started { .. } => "Started",
            RunEvent::SiteStarted { .. } => "SiteStarted",
            RunEvent::Authenticated { .. } => "Authenticated",
            RunEvent::RetryScheduled { delay, .. } => {
                self.delays.lock().unwrap().push(*delay);
                "RetryScheduled"
            }
            RunEvent::SiteCompleted { .. } => "SiteCompleted",
            RunEvent::SiteFailed { .. } => "SiteFailed",
            RunEvent::SinkFailed { .. } => "SinkFailed",
            RunEvent::Finished { .. } => "Finished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// A normalized offer from `source` with link `https://{source}.test/jobs/{id}`.
pub fn offer(source: &str, title: &str, id: &str) -> JobOffer {
    let link = format!("https://{source}.test/jobs/{id}");
    JobOffer {
        title: title.to_string(),
        company: "Acme".to_string(),
        location: "Remote".to_string(),
        salary: None,
        tags: ["rust".to_string()].into_iter().collect(),
        fingerprint: compute_hash(&format!("{source}\u{1f}{link}")),
        apply_link: link,
        source: source.to_string(),
    }
}
