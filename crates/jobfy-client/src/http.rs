use std::time::Duration;

use jobfy_core::error::AppError;
use jobfy_core::site::{FetchResponse, HttpMethod, RequestSpec};
use jobfy_core::traits::HttpClient;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};

/// User-Agent of a current desktop browser. Several job boards serve
/// captcha pages to anything that looks like a bot.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP client using reqwest.
///
/// Sends browser-like headers and keeps cookies. Each [`session`](HttpClient::session)
/// gets a fresh cookie jar, so logins never leak between runs.
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else if e.is_builder() {
            AppError::HttpError(format!("Invalid request: {e}"))
        } else {
            AppError::NetworkError(e.to_string())
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.8,*/*;q=0.7",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("es-ES,es;q=0.9,en;q=0.8"),
    );

    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

/// URL-encode a form body.
fn encode_form(fields: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields.iter())
        .finish()
}

impl HttpClient for ReqwestClient {
    async fn execute(&self, request: &RequestSpec) -> Result<FetchResponse, AppError> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };

        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(form) = &request.form {
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encode_form(form));
        }

        tracing::debug!(method = %request.method.as_str(), url = %request.url, "Sending request");
        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else {
                AppError::NetworkError(format!("Failed to read response body: {e}"))
            }
        })?;

        Ok(FetchResponse { status, url, body })
    }

    fn session(&self) -> Result<Self, AppError> {
        Self::with_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_form_escapes_values() {
        let body = encode_form(&[
            ("session_key".to_string(), "me@example.com".to_string()),
            ("session_password".to_string(), "p&ss word".to_string()),
        ]);
        assert_eq!(
            body,
            "session_key=me%40example.com&session_password=p%26ss+word"
        );
    }

    #[test]
    fn test_client_builds_with_timeout() {
        let client = ReqwestClient::with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(5));
        let session = client.session().unwrap();
        assert_eq!(session.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = ReqwestClient::with_timeout(Duration::from_secs(2)).unwrap();
        let err = client
            .execute(&RequestSpec::get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_retryable() {
        let client = ReqwestClient::new().unwrap();
        let err = client
            .execute(&RequestSpec::get("not a url"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable(), "unexpected error: {err}");
    }
}
