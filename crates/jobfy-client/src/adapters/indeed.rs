//! Indeed search result pages.
//!
//! Indeed reshuffles its markup often, so every field is read through a
//! list of fallback selectors, newest layout first.

use jobfy_core::error::AppError;
use jobfy_core::models::{ParsedPage, RawRecord};
use jobfy_core::site::{RateLimitPolicy, RequestSpec, SearchQuery, SiteDescriptor};
use jobfy_core::traits::SiteAdapter;
use scraper::{Html, Selector};

use super::{first_match, first_text, search_url, selectors, text_of};

const BASE_URL: &str = "https://es.indeed.com";

#[derive(Debug, Clone)]
pub struct IndeedAdapter {
    descriptor: SiteDescriptor,
    cards: Vec<Selector>,
    title: Vec<Selector>,
    link: Vec<Selector>,
    company: Vec<Selector>,
    location: Vec<Selector>,
    salary: Vec<Selector>,
    tags: Selector,
}

impl IndeedAdapter {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            descriptor: SiteDescriptor::new("indeed", "Indeed", BASE_URL)
                .with_rate_limit(RateLimitPolicy::default()),
            cards: selectors(&[
                "div.job_seen_beacon",
                "div.jobsearch-SerpJobCard",
                "[data-jk]",
                "td.resultContent",
            ])?,
            title: selectors(&[
                "h2.jobTitle span[title]",
                "h2.jobTitle",
                "a.jobtitle",
                "[data-testid='jobTitle']",
                "span[title]",
            ])?,
            link: selectors(&["a.jcs-JobTitle", "h2.jobTitle a", "a.jobtitle", "a[href]"])?,
            company: selectors(&[
                "span.companyName",
                "[data-testid='company-name']",
                "span.company",
            ])?,
            location: selectors(&[
                "div.companyLocation",
                "[data-testid='text-location']",
                "div.location",
                "span.location",
            ])?,
            salary: selectors(&[
                "div.salary-snippet-container",
                "span.salaryText",
                "div.metadata.salary-snippet-container",
            ])?,
            tags: super::selector("div.attribute_snippet")?,
        })
    }
}

impl SiteAdapter for IndeedAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn build_search_request(&self, query: &SearchQuery) -> Result<RequestSpec, AppError> {
        let url = search_url(
            &format!("{BASE_URL}/jobs"),
            &[
                ("q", query.keyword()),
                ("l", query.location()),
                ("sort", "date"),
            ],
        )?;
        Ok(RequestSpec::get(url).with_header("Referer", BASE_URL))
    }

    fn parse_response(&self, body: &str, _query: &SearchQuery) -> Result<ParsedPage, AppError> {
        let document = Html::parse_document(body);
        let root = document.root_element();

        // Use the first card layout that matches anything.
        let cards: Vec<_> = self
            .cards
            .iter()
            .map(|s| root.select(s).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        let mut page = ParsedPage::default();
        for card in cards {
            let link = first_match(card, &self.link)
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string)
                .or_else(|| card.value().attr("data-jk").map(|jk| format!("/viewjob?jk={jk}")));

            page.push(RawRecord {
                title: first_text(card, &self.title),
                company: first_text(card, &self.company),
                location: first_text(card, &self.location),
                salary: first_text(card, &self.salary),
                tags: card.select(&self.tags).map(text_of).filter(|t| !t.is_empty()).collect(),
                link,
            });
        }
        Ok(page)
    }
}
