//! LinkedIn Jobs. Login posts the form from the login page together with
//! its CSRF token.

use jobfy_core::error::AppError;
use jobfy_core::models::{ParsedPage, RawRecord};
use jobfy_core::site::{
    Credentials, FetchResponse, RateLimitPolicy, RequestSpec, SearchQuery, SiteDescriptor,
};
use jobfy_core::traits::{Authenticator, SiteAdapter};
use scraper::{Html, Selector};

use super::{first_match, first_text, search_url, selector, selectors};

const BASE_URL: &str = "https://www.linkedin.com";
const LOGIN_URL: &str = "https://www.linkedin.com/login";
const SESSION_URL: &str = "https://www.linkedin.com/uas/login-submit";
const JOBS_URL: &str = "https://www.linkedin.com/jobs/search";

/// Postings from the last seven days.
const POSTED_WITHIN: &str = "r604800";

#[derive(Debug, Clone)]
pub struct LinkedInAdapter {
    descriptor: SiteDescriptor,
    csrf: Selector,
    cards: Vec<Selector>,
    title: Vec<Selector>,
    company: Vec<Selector>,
    location: Vec<Selector>,
    link: Vec<Selector>,
}

impl LinkedInAdapter {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            descriptor: SiteDescriptor::new("linkedin", "LinkedIn", BASE_URL)
                .with_auth()
                .with_rate_limit(RateLimitPolicy::default()),
            csrf: selector("input[name='loginCsrfParam']")?,
            cards: selectors(&[
                "div.base-card",
                "li.jobs-search-results__list-item",
                "[data-job-id]",
            ])?,
            title: selectors(&[
                "h3.base-search-card__title",
                "a.job-card-list__title",
                "[class*='job-title']",
            ])?,
            company: selectors(&[
                "h4.base-search-card__subtitle",
                "a.job-card-container__company-name",
                "[class*='company-name']",
            ])?,
            location: selectors(&[
                "span.job-search-card__location",
                "li.job-card-container__metadata-item",
                "[class*='location']",
            ])?,
            link: selectors(&["a.base-card__full-link", "a[href]"])?,
        })
    }

    fn csrf_token(&self, login_page: &str) -> Option<String> {
        let document = Html::parse_document(login_page);
        document
            .select(&self.csrf)
            .next()
            .and_then(|input| input.value().attr("value"))
            .map(str::to_string)
    }
}

/// Drop tracking parameters from absolute job links.
fn strip_tracking(href: &str) -> String {
    if href.starts_with("http") {
        href.split('?').next().unwrap_or(href).to_string()
    } else {
        href.to_string()
    }
}

impl SiteAdapter for LinkedInAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn build_search_request(&self, query: &SearchQuery) -> Result<RequestSpec, AppError> {
        let url = search_url(
            JOBS_URL,
            &[
                ("keywords", query.keyword()),
                ("location", query.location()),
                ("f_TPR", POSTED_WITHIN),
                ("sortBy", "R"),
            ],
        )?;
        Ok(RequestSpec::get(url))
    }

    fn parse_response(&self, body: &str, _query: &SearchQuery) -> Result<ParsedPage, AppError> {
        let document = Html::parse_document(body);
        let root = document.root_element();
        let cards: Vec<_> = self
            .cards
            .iter()
            .map(|s| root.select(s).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        if cards.is_empty() {
            tracing::warn!("No LinkedIn job cards found, the page may be gated");
        }

        let mut page = ParsedPage::default();
        for card in cards {
            page.push(RawRecord {
                title: first_text(card, &self.title),
                company: first_text(card, &self.company),
                location: first_text(card, &self.location),
                salary: None,
                tags: Vec::new(),
                link: first_match(card, &self.link)
                    .and_then(|a| a.value().attr("href"))
                    .map(strip_tracking),
            });
        }
        Ok(page)
    }

    fn authenticator(&self) -> Option<&dyn Authenticator> {
        Some(self)
    }
}

impl Authenticator for LinkedInAdapter {
    fn login_page(&self) -> Option<RequestSpec> {
        Some(RequestSpec::get(LOGIN_URL))
    }

    fn login_request(
        &self,
        credentials: &Credentials,
        login_page: Option<&str>,
    ) -> Result<RequestSpec, AppError> {
        let token = login_page
            .and_then(|page| self.csrf_token(page))
            .ok_or_else(|| AppError::AuthenticationError("LinkedIn login page has no CSRF token".into()))?;

        Ok(RequestSpec::post_form(
            SESSION_URL,
            [
                ("session_key", credentials.username.as_str()),
                ("session_password", credentials.password.as_str()),
                ("loginCsrfParam", token.as_str()),
            ],
        )
        .with_header("Referer", LOGIN_URL))
    }

    fn verify_login(&self, response: &FetchResponse) -> Result<(), AppError> {
        let url = response.url.as_str();
        if url.contains("feed") || url.contains("mynetwork") {
            Ok(())
        } else if url.contains("challenge") || url.contains("checkpoint") {
            Err(AppError::AuthenticationError(
                "LinkedIn requires additional verification".into(),
            ))
        } else {
            Err(AppError::AuthenticationError(format!(
                "LinkedIn login not confirmed (landed on {url})"
            )))
        }
    }
}
