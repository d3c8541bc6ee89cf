//! Site descriptions and the transport-neutral request/response types
//! adapters build and consume.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Politeness limits applied to every request sent to one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Maximum requests in flight to this site, across all runs.
    pub max_concurrent: usize,
    /// Minimum spacing between the start of two requests to this site.
    #[serde(with = "duration_millis")]
    pub min_interval: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            max_concurrent,
            min_interval,
        }
    }

    /// No spacing and a generous concurrency cap. Meant for tests.
    pub fn unlimited() -> Self {
        Self::new(64, Duration::ZERO)
    }
}

impl Default for RateLimitPolicy {
    /// One request at a time, two seconds apart.
    fn default() -> Self {
        Self::new(1, Duration::from_secs(2))
    }
}

/// Static description of a scrapeable site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    /// Stable lowercase identifier, e.g. `remoteok`.
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub requires_auth: bool,
    pub rate_limit: RateLimitPolicy,
}

impl SiteDescriptor {
    pub fn new(id: &str, display_name: &str, base_url: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            base_url: base_url.to_string(),
            requires_auth: false,
            rate_limit: RateLimitPolicy::default(),
        }
    }

    pub fn with_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitPolicy) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// Search filters shared by every site in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub location: Option<String>,
}

impl SearchQuery {
    pub fn new(keyword: Option<&str>, location: Option<&str>) -> Self {
        Self {
            keyword: clean(keyword),
            location: clean(location),
        }
    }

    pub fn keyword(&self) -> &str {
        self.keyword.as_deref().unwrap_or_default()
    }

    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or_default()
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Login credentials for a site that requires authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data. Adapters produce these without
/// doing any I/O; the [`HttpClient`](crate::traits::HttpClient) executes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// URL-encoded form body, sent with `POST`.
    pub form: Option<Vec<(String, String)>>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn post_form<K, V>(url: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            form: Some(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// What came back from executing a [`RequestSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// URL after redirects.
    pub url: String,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// Classify a non-success status into the error it represents.
    ///
    /// - 401 is an authentication failure
    /// - 403 and 429 mean the site is refusing us
    /// - 408 and 5xx are transient network-side failures
    /// - any other 4xx means the request or page shape is wrong
    pub fn error_for_status(&self) -> Result<(), AppError> {
        let status = self.status;
        match status {
            _ if self.is_success() => Ok(()),
            401 => Err(AppError::AuthenticationError(format!(
                "HTTP 401 from {}",
                self.url
            ))),
            403 | 429 => Err(AppError::BlockedError(format!(
                "HTTP {status} from {}",
                self.url
            ))),
            408 | 500..=599 => Err(AppError::NetworkError(format!(
                "HTTP {status} from {}",
                self.url
            ))),
            _ => Err(AppError::ParseError(format!(
                "unexpected HTTP {status} from {}",
                self.url
            ))),
        }
    }
}

/// Markers of captcha or bot-challenge pages served with a 200 status.
pub const BLOCK_MARKERS: &[&str] = &[
    "g-recaptcha",
    "h-captcha",
    "hcaptcha",
    "cf-challenge",
    "cf-chl-",
    "challenge-platform",
    "px-captcha",
    "are you a robot",
    "unusual traffic",
];

/// Returns the first block marker found in `body`, case-insensitively.
pub fn find_block_marker(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    BLOCK_MARKERS.iter().copied().find(|m| lower.contains(m))
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
