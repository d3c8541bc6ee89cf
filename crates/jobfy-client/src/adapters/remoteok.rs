//! RemoteOK, read through its public JSON API.

use jobfy_core::error::AppError;
use jobfy_core::models::{ParsedPage, RawRecord};
use jobfy_core::site::{RateLimitPolicy, RequestSpec, SearchQuery, SiteDescriptor, find_block_marker};
use jobfy_core::traits::SiteAdapter;
use serde_json::Value;

const BASE_URL: &str = "https://remoteok.com";
const API_URL: &str = "https://remoteok.com/api";
const MAX_RESULTS: usize = 50;

/// The API returns every open job; keyword filtering happens locally
/// against title, company and tags.
#[derive(Debug, Clone)]
pub struct RemoteOkAdapter {
    descriptor: SiteDescriptor,
}

impl RemoteOkAdapter {
    pub fn new() -> Self {
        Self {
            descriptor: SiteDescriptor::new("remoteok", "RemoteOK", BASE_URL)
                .with_rate_limit(RateLimitPolicy::default()),
        }
    }
}

impl Default for RemoteOkAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteAdapter for RemoteOkAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn build_search_request(&self, _query: &SearchQuery) -> Result<RequestSpec, AppError> {
        Ok(RequestSpec::get(API_URL).with_header("Accept", "application/json"))
    }

    fn parse_response(&self, body: &str, query: &SearchQuery) -> Result<ParsedPage, AppError> {
        let items: Vec<Value> = serde_json::from_str(body)
            .map_err(|e| AppError::ParseError(format!("RemoteOK API did not return a JSON array: {e}")))?;

        let keyword = query.keyword.as_deref().map(str::to_lowercase);
        let mut page = ParsedPage::default();

        // The first element is a legal notice, not a job.
        for item in items.iter().filter(|i| i.get("legal").is_none()) {
            if page.len() >= MAX_RESULTS {
                break;
            }
            let Some(record) = to_record(item) else {
                page.skip();
                continue;
            };
            if keyword.as_deref().is_some_and(|k| !matches_keyword(&record, k)) {
                continue;
            }
            page.push(record);
        }

        Ok(page)
    }

    fn detect_block(&self, body: &str) -> Option<String> {
        // Anything that is not JSON is an interstitial page.
        if body.trim_start().starts_with('[') {
            return None;
        }
        find_block_marker(body).map(|m| format!("anti-bot page detected ({m})"))
    }
}

fn to_record(item: &Value) -> Option<RawRecord> {
    let obj = item.as_object()?;
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let link = text("url").or_else(|| text("slug").map(|slug| format!("{BASE_URL}/remote-jobs/{slug}")));
    let tags = obj
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    Some(RawRecord {
        title: text("position"),
        company: text("company"),
        location: text("location").or_else(|| Some("Remote".to_string())),
        salary: format_salary(salary_field(obj.get("salary_min")), salary_field(obj.get("salary_max"))),
        tags,
        link,
    })
}

/// Salaries come as numbers, numeric strings, or 0 for "not given".
fn salary_field(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

fn format_salary(min: u64, max: u64) -> Option<String> {
    match (min, max) {
        (0, _) => None,
        (min, 0) => Some(format!("${}+", thousands(min))),
        (min, max) => Some(format!("${} - ${}", thousands(min), thousands(max))),
    }
}

fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn matches_keyword(record: &RawRecord, keyword: &str) -> bool {
    let haystack = format!(
        "{} {} {}",
        record.title.as_deref().unwrap_or_default(),
        record.company.as_deref().unwrap_or_default(),
        record.tags.join(" ")
    )
    .to_lowercase();
    haystack.contains(keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_BODY: &str = r#"[
        {"legal": "API Terms of Service"},
        {"slug": "rust-engineer-acme-1", "position": "Rust Engineer", "company": "Acme",
         "tags": ["rust", "backend"], "location": "", "salary_min": 50000, "salary_max": 80000,
         "url": "https://remoteOK.com/remote-jobs/rust-engineer-acme-1"},
        {"slug": "designer-globex-2", "position": "Product Designer", "company": "Globex",
         "tags": ["design"], "location": "Europe", "salary_min": 0, "salary_max": 0},
        {"slug": "no-title-3", "company": "Initech"},
        "garbage"
    ]"#;

    #[test]
    fn test_parses_jobs_and_skips_legal_notice() {
        let page = RemoteOkAdapter::new()
            .parse_response(API_BODY, &SearchQuery::default())
            .unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page.skipped, 2);

        let rust = &page.records[0];
        assert_eq!(rust.title.as_deref(), Some("Rust Engineer"));
        assert_eq!(rust.location.as_deref(), Some("Remote"));
        assert_eq!(rust.salary.as_deref(), Some("$50,000 - $80,000"));
        assert_eq!(
            rust.link.as_deref(),
            Some("https://remoteOK.com/remote-jobs/rust-engineer-acme-1")
        );

        let designer = &page.records[1];
        assert_eq!(designer.salary, None);
        assert_eq!(
            designer.link.as_deref(),
            Some("https://remoteok.com/remote-jobs/designer-globex-2")
        );
    }

    #[test]
    fn test_keyword_filters_title_company_and_tags() {
        let adapter = RemoteOkAdapter::new();
        let by_tag = adapter
            .parse_response(API_BODY, &SearchQuery::new(Some("BACKEND"), None))
            .unwrap();
        assert_eq!(by_tag.len(), 1);

        let by_company = adapter
            .parse_response(API_BODY, &SearchQuery::new(Some("globex"), None))
            .unwrap();
        assert_eq!(by_company.records[0].title.as_deref(), Some("Product Designer"));
    }

    #[test]
    fn test_results_are_capped() {
        let jobs: Vec<Value> = (0..80)
            .map(|i| {
                serde_json::json!({
                    "position": format!("Job {i}"),
                    "company": "Acme",
                    "slug": format!("job-{i}"),
                })
            })
            .collect();
        let body = serde_json::to_string(&jobs).unwrap();
        let page = RemoteOkAdapter::new()
            .parse_response(&body, &SearchQuery::default())
            .unwrap();
        assert_eq!(page.len(), MAX_RESULTS);
    }

    #[test]
    fn test_non_array_body_is_parse_error() {
        let err = RemoteOkAdapter::new()
            .parse_response("<html>maintenance</html>", &SearchQuery::default())
            .unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[test]
    fn test_salary_formatting() {
        assert_eq!(format_salary(120000, 0).as_deref(), Some("$120,000+"));
        assert_eq!(format_salary(999, 1000).as_deref(), Some("$999 - $1,000"));
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_json_body_is_never_blocked() {
        let adapter = RemoteOkAdapter::new();
        assert!(adapter.detect_block(r#"[{"description": "g-recaptcha"}]"#).is_none());
        assert!(adapter.detect_block("<div class=\"cf-challenge\">").is_some());
    }
}
