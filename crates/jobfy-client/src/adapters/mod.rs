//! Adapters for the supported job sites.

pub mod indeed;
pub mod infojobs;
pub mod linkedin;
pub mod remoteok;
pub mod tecnoempleo;

use jobfy_core::error::AppError;
use jobfy_core::registry::AdapterRegistry;
use scraper::{ElementRef, Selector};
use url::Url;

pub use indeed::IndeedAdapter;
pub use infojobs::InfoJobsAdapter;
pub use linkedin::LinkedInAdapter;
pub use remoteok::RemoteOkAdapter;
pub use tecnoempleo::TecnoempleoAdapter;

/// Registry with every built-in adapter.
pub fn default_registry() -> Result<AdapterRegistry, AppError> {
    Ok(AdapterRegistry::builder()
        .register(RemoteOkAdapter::new())?
        .register(IndeedAdapter::new()?)?
        .register(TecnoempleoAdapter::new()?)?
        .register(InfoJobsAdapter::new()?)?
        .register(LinkedInAdapter::new()?)?
        .build())
}

/// Parse a CSS selector.
pub(crate) fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::ConfigError(format!("invalid selector '{css}': {e:?}")))
}

/// Parse a list of fallback selectors, tried in order.
pub(crate) fn selectors(list: &[&str]) -> Result<Vec<Selector>, AppError> {
    list.iter().map(|css| selector(css)).collect()
}

/// Element text with whitespace collapsed.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// First element under `scope` matching any of `selectors`, in selector order.
pub(crate) fn first_match<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| scope.select(s).next())
}

/// Non-empty text of the first match.
pub(crate) fn first_text(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| scope.select(s).next())
        .map(text_of)
        .find(|t| !t.is_empty())
}

/// Build a search URL, leaving out empty parameters.
pub(crate) fn search_url(base: &str, params: &[(&str, &str)]) -> Result<String, AppError> {
    let mut url = Url::parse(base).map_err(|e| AppError::HttpError(format!("invalid url {base}: {e}")))?;
    let present: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    if !present.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(present.iter().map(|(k, v)| (*k, *v)));
    }
    Ok(url.to_string())
}
