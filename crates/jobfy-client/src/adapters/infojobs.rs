//! InfoJobs, which needs a candidate account to show search results.

use jobfy_core::error::AppError;
use jobfy_core::models::{ParsedPage, RawRecord};
use jobfy_core::site::{
    Credentials, FetchResponse, RateLimitPolicy, RequestSpec, SearchQuery, SiteDescriptor,
};
use jobfy_core::traits::{Authenticator, SiteAdapter};
use scraper::{Html, Selector};

use super::{first_match, first_text, search_url, selector, selectors, text_of};

const BASE_URL: &str = "https://www.infojobs.net";
const LOGIN_URL: &str = "https://www.infojobs.net/candidate/access/login.xhtml";
const SEARCH_URL: &str = "https://www.infojobs.net/jobsearch/search-results/list.xhtml";

#[derive(Debug, Clone)]
pub struct InfoJobsAdapter {
    descriptor: SiteDescriptor,
    cards: Vec<Selector>,
    title: Vec<Selector>,
    company: Vec<Selector>,
    location: Vec<Selector>,
    salary: Selector,
    tags: Selector,
}

impl InfoJobsAdapter {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            descriptor: SiteDescriptor::new("infojobs", "InfoJobs", BASE_URL)
                .with_auth()
                .with_rate_limit(RateLimitPolicy::default()),
            cards: selectors(&[
                "div.ij-OfferCardContent",
                "li.ij-OfferCard",
                "[data-testid='offer-card']",
            ])?,
            title: selectors(&[
                "a.ij-OfferCardContent-description-title-link",
                "h2.ij-OfferCardContent-description-title",
                "[data-testid='offer-title']",
                "a[data-test='offer-title']",
            ])?,
            company: selectors(&[
                "a.ij-OfferCardContent-description-subtitle-link",
                "[data-testid='offer-company']",
                "span.ij-OfferCardContent-description-subtitle",
            ])?,
            location: selectors(&[
                "span.ij-OfferCardContent-description-list-item-truncate",
                "[data-testid='offer-location']",
            ])?,
            salary: selector("span.ij-OfferCardContent-description-salary")?,
            tags: selector("span.ij-OfferCardContent-description-tag")?,
        })
    }
}

impl SiteAdapter for InfoJobsAdapter {
    fn descriptor(&self) -> &SiteDescriptor {
        &self.descriptor
    }

    fn build_search_request(&self, query: &SearchQuery) -> Result<RequestSpec, AppError> {
        let url = search_url(
            SEARCH_URL,
            &[("q", query.keyword()), ("provinceIds", query.location())],
        )?;
        Ok(RequestSpec::get(url).with_header("Referer", BASE_URL))
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

        let mut page = ParsedPage::default();
        for card in cards {
            let title = first_match(card, &self.title);
            // Only the title anchor carries the offer link.
            let link = title
                .filter(|t| t.value().name() == "a")
                .and_then(|t| t.value().attr("href"))
                .map(str::to_string);

            page.push(RawRecord {
                title: title.map(text_of),
                company: first_text(card, &self.company),
                location: first_text(card, &self.location),
                salary: card.select(&self.salary).next().map(text_of),
                tags: card.select(&self.tags).map(text_of).filter(|t| !t.is_empty()).collect(),
                link,
            });
        }
        Ok(page)
    }

    fn authenticator(&self) -> Option<&dyn Authenticator> {
        Some(self)
    }
}

impl Authenticator for InfoJobsAdapter {
    /// The login page sets the session cookies the form post expects.
    fn login_page(&self) -> Option<RequestSpec> {
        Some(RequestSpec::get(LOGIN_URL))
    }

    fn login_request(
        &self,
        credentials: &Credentials,
        _login_page: Option<&str>,
    ) -> Result<RequestSpec, AppError> {
        Ok(RequestSpec::post_form(
            LOGIN_URL,
            [
                ("j_username", credentials.username.as_str()),
                ("j_password", credentials.password.as_str()),
            ],
        )
        .with_header("Referer", LOGIN_URL))
    }

    fn verify_login(&self, response: &FetchResponse) -> Result<(), AppError> {
        if response.body.to_lowercase().contains("logout") || response.url.contains("mi-cv") {
            return Ok(());
        }
        // Captcha pages never get here, they fail the fetch as blocked.
        // InfoJobs does not always confirm a login on the landing page;
        // the search itself will reveal a rejected session.
        tracing::warn!(url = %response.url, "InfoJobs login not confirmed, continuing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <ul>
          <li class="ij-OfferCard"><div class="ij-OfferCardContent">
            <h2 class="ij-OfferCardContent-description-title">
              <a class="ij-OfferCardContent-description-title-link"
                 href="//www.infojobs.net/madrid/backend-rust/of-i123">Backend Rust</a></h2>
            <a class="ij-OfferCardContent-description-subtitle-link" href="/acme">Acme S.L.</a>
            <span class="ij-OfferCardContent-description-list-item-truncate">Madrid</span>
            <span class="ij-OfferCardContent-description-salary">30.000€ - 40.000€ Bruto/año</span>
            <span class="ij-OfferCardContent-description-tag">Indefinido</span>
            <span class="ij-OfferCardContent-description-tag">Jornada completa</span>
          </div></li>
          <li class="ij-OfferCard"><div class="ij-OfferCardContent">
            <h2 class="ij-OfferCardContent-description-title">Sin enlace</h2>
            <span class="ij-OfferCardContent-description-subtitle">Globex</span>
          </div></li>
        </ul>
    "#;

    #[test]
    fn test_parses_offer_cards() {
        let page = InfoJobsAdapter::new()
            .unwrap()
            .parse_response(RESULTS_PAGE, &SearchQuery::default())
            .unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page.skipped, 1);
        let offer = &page.records[0];
        assert_eq!(offer.title.as_deref(), Some("Backend Rust"));
        assert_eq!(offer.company.as_deref(), Some("Acme S.L."));
        assert_eq!(offer.location.as_deref(), Some("Madrid"));
        assert_eq!(offer.salary.as_deref(), Some("30.000€ - 40.000€ Bruto/año"));
        assert_eq!(offer.tags, vec!["Indefinido", "Jornada completa"]);
        assert_eq!(
            offer.link.as_deref(),
            Some("//www.infojobs.net/madrid/backend-rust/of-i123")
        );
    }

    #[test]
    fn test_login_request_posts_credentials() {
        let adapter = InfoJobsAdapter::new().unwrap();
        let auth = adapter.authenticator().unwrap();
        assert_eq!(auth.login_page().unwrap().url, LOGIN_URL);

        let request = auth
            .login_request(&Credentials::new("me@example.com", "secret"), None)
            .unwrap();
        let form = request.form.unwrap();
        assert!(form.contains(&("j_username".to_string(), "me@example.com".to_string())));
        assert!(form.contains(&("j_password".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_verify_login() {
        let adapter = InfoJobsAdapter::new().unwrap();
        let ok = FetchResponse::new(200, "https://www.infojobs.net/candidate/mi-cv.xhtml", "");
        assert!(adapter.verify_login(&ok).is_ok());

        let logged_in = FetchResponse::new(200, BASE_URL, r#"<a href="/logout">Salir</a>"#);
        assert!(adapter.verify_login(&logged_in).is_ok());

        let unconfirmed = FetchResponse::new(200, BASE_URL, "<html>home</html>");
        assert!(adapter.verify_login(&unconfirmed).is_ok());
    }

    #[test]
    fn test_search_request() {
        let request = InfoJobsAdapter::new()
            .unwrap()
            .build_search_request(&SearchQuery::new(Some("rust"), None))
            .unwrap();
        assert_eq!(
            request.url,
            "https://www.infojobs.net/jobsearch/search-results/list.xhtml?q=rust"
        );
    }
}
