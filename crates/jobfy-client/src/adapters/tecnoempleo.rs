//! Tecnoempleo, a Spanish IT job board.
//!
//! Result cards carry no stable classes, so offers are found by harvesting
//! links that look like offer pages and reading the company from the
//! sibling company link (`...-trabajo`).

use std::collections::HashSet;

use jobfy_core::error::AppError;
use jobfy_core::models::{ParsedPage, RawRecord};
use jobfy_core::site::{RateLimitPolicy, RequestSpec, SearchQuery, SiteDescriptor};
use jobfy_core::traits::SiteAdapter;
use scraper::{ElementRef, Html, Selector};

use super::{search_url, selector, text_of};

const BASE_URL: &str = "https://www.tecnoempleo.com";
const SEARCH_URL: &str = "https://www.tecnoempleo.com/busqueda-empleo.php";
const MAX_RESULTS: usize = 30;
const DEFAULT_LOCATION: &str = "España";

/// Link text outside this range is navigation, not an offer title.
const TITLE_CHARS: std::ops::RangeInclusive<usize> = 15..=80;

/// Hrefs that never point at an offer.
const EXCLUDED_HREF_PARTS: &[&str] = &[
    "assets",
    "graficos",
    "acceso",
    "registro",
    "newcand",
    "newemp",
    "accemp",
    "trabajo/",
    "empleo-publico",
    "tecnocalculadora",
    "servicios",
    ".php",
    ".css",
    ".js",
    "pagina=",
    "second-window",
    "aws-trabajo",
    "ofertas-trabajo/",
];

/// Cities and remote markers recognised in offer titles.
const LOCATIONS: &[(&str, &str)] = &[
    ("madrid", "Madrid"),
    ("barcelona", "Barcelona"),
    ("valencia", "Valencia"),
    ("sevilla", "Sevilla"),
    ("bilbao", "Bilbao"),
    ("malaga", "Málaga"),
    ("málaga", "Málaga"),
    ("zaragoza", "Zaragoza"),
    ("remote", "Remoto"),
    ("remoto", "Remoto"),
    ("teletrabajo", "Remoto"),
];

#[derive(Debug, Clone)]
pub struct TecnoempleoAdapter {
    descriptor: SiteDescriptor,
    links: Selector,
}

impl TecnoempleoAdapter {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            descriptor: SiteDescriptor::new("tecnoempleo", "Tecnoempleo", BASE_URL)
                .with_rate_limit(RateLimitPolicy::default()),
            links: selector("a[href]")?,
        })
    }

    /// Company link next to the offer link, if any.
    fn company_for(&self, link: ElementRef<'_>) -> Option<String> {
        let parent = link.parent().and_then(ElementRef::wrap)?;
        parent
            .select(&self.links)
            .filter(|a| a.value().attr("href").is_some_and(is_company_href))
            .map(text_of)
            .find(|t| !t.is_empty())
    }
}

fn is_company_href(href: &str) -> bool {
    href.trim_end_matches('/').ends_with("-trabajo")
}

/// Path of an on-site offer link, or `None` for anything else.
fn offer_path(href: &str) -> Option<&str> {
    let lower = href.to_lowercase();
    if EXCLUDED_HREF_PARTS.iter().any(|p| lower.contains(p)) || is_company_href(href) {
        return None;
    }
    let path = href.strip_prefix(BASE_URL).or_else(|| href.starts_with('/').then_some(href))?;
    (path.contains('-') && path.len() > 15).then_some(path)
}

fn location_from_title(title: &str) -> &'static str {
    let lower = title.to_lowercase();
    LOCATIONS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, name)| *name)
        .unwrap_or(DEFAULT_LOCATION)
}

impl SiteAdapter for TecnoempleoAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn build_search_request(&self, query: &SearchQuery) -> Result<RequestSpec, AppError> {
        let url = search_url(SEARCH_URL, &[("te", query.keyword()), ("pr", query.location())])?;
        Ok(RequestSpec::get(url))
    }

    fn parse_response(&self, body: &str, _query: &SearchQuery) -> Result<ParsedPage, AppError> {
        let document = Html::parse_document(body);
        let mut seen = HashSet::new();
        let mut page = ParsedPage::default();

        for link in document.select(&self.links) {
            if page.len() >= MAX_RESULTS {
                break;
            }
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let title = text_of(link);
            if !TITLE_CHARS.contains(&title.chars().count()) || seen.contains(href) {
                continue;
            }
            if offer_path(href).is_none() {
                continue;
            }
            seen.insert(href.to_string());

            page.push(RawRecord {
                location: Some(location_from_title(&title).to_string()),
                company: self.company_for(link),
                tags: vec!["IT/Tech".to_string()],
                link: Some(href.to_string()),
                title: Some(title),
                salary: None,
            });
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <nav><a href="/registro-candidato.php">Regístrate como candidato gratis</a></nav>
          <div class="offer">
            <a href="https://www.tecnoempleo.com/desarrollador-rust-senior-madrid/rust/rf-abc123">
              Desarrollador Rust Senior Madrid</a>
            <a href="https://www.tecnoempleo.com/acme-consulting-trabajo">Acme Consulting</a>
          </div>
          <div class="offer">
            <a href="/ingeniero-devops-remoto/devops/rf-def456">Ingeniero DevOps en remoto</a>
          </div>
          <div class="offer">
            <a href="/ingeniero-devops-remoto/devops/rf-def456">Ingeniero DevOps en remoto</a>
          </div>
          <a href="/short-x">Corto</a>
          <a href="https://other.example.com/some-long-external-offer">An external offer link text</a>
          <a href="/ofertas-trabajo/?pagina=2">Siguiente página de resultados</a>
        </body></html>
    "#;

    #[test]
    fn test_harvests_offer_links() {
        let page = TecnoempleoAdapter::new()
            .unwrap()
            .parse_response(RESULTS_PAGE, &SearchQuery::default())
            .unwrap();

        assert_eq!(page.len(), 2);

        let rust = &page.records[0];
        assert_eq!(rust.title.as_deref(), Some("Desarrollador Rust Senior Madrid"));
        assert_eq!(rust.company.as_deref(), Some("Acme Consulting"));
        assert_eq!(rust.location.as_deref(), Some("Madrid"));
        assert_eq!(rust.tags, vec!["IT/Tech"]);

        let devops = &page.records[1];
        assert_eq!(devops.company, None);
        assert_eq!(devops.location.as_deref(), Some("Remoto"));
        assert_eq!(
            devops.link.as_deref(),
            Some("/ingeniero-devops-remoto/devops/rf-def456")
        );
    }

    #[test]
    fn test_offer_path_filters() {
        assert!(offer_path("/desarrollador-java-backend/java/rf-1").is_some());
        assert!(offer_path("/acme-trabajo").is_none());
        assert!(offer_path("/busqueda-empleo.php?te=rust").is_none());
        assert!(offer_path("https://elsewhere.test/long-offer-path-here").is_none());
        assert!(offer_path("/a-b").is_none());
    }

    #[test]
    fn test_location_from_title() {
        assert_eq!(location_from_title("Analista de datos Barcelona"), "Barcelona");
        assert_eq!(location_from_title("QA Engineer"), DEFAULT_LOCATION);
    }

    #[test]
    fn test_search_request() {
        let request = TecnoempleoAdapter::new()
            .unwrap()
            .build_search_request(&SearchQuery::new(Some("rust"), Some("madrid")))
            .unwrap();
        assert_eq!(
            request.url,
            "https://www.tecnoempleo.com/busqueda-empleo.php?te=rust&pr=madrid"
        );
    }
}
