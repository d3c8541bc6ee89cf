use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::error::AppError;
use crate::site::SiteDescriptor;
use crate::traits::SiteAdapter;

/// Immutable lookup table from site id to adapter.
///
/// Built once at startup through [`RegistryBuilder`], which rejects
/// inconsistent adapters so the rest of the system can rely on them.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
    /// Registration order, used for listing.
    order: Vec<String>,
}

impl AdapterRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Descriptors of every registered site, in registration order.
    pub fn list(&self) -> Vec<SiteDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.adapters.get(id))
            .map(|a| a.descriptor().clone())
            .collect()
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, site_id: &str) -> bool {
        self.adapters.contains_key(site_id)
    }

    pub fn resolve(&self, site_id: &str) -> Result<Arc<dyn SiteAdapter>, AppError> {
        self.adapters
            .get(site_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("unknown site '{site_id}'")))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("sites", &self.order)
            .finish()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
    order: Vec<String>,
}

impl RegistryBuilder {
    /// Register an adapter, validating its descriptor.
    pub fn register<A: SiteAdapter + 'static>(self, adapter: A) -> Result<Self, AppError> {
        self.register_arc(Arc::new(adapter))
    }

    pub fn register_arc(mut self, adapter: Arc<dyn SiteAdapter>) -> Result<Self, AppError> {
        let descriptor = adapter.descriptor();
        validate_descriptor(descriptor)?;

        if descriptor.requires_auth && adapter.authenticator().is_none() {
            return Err(AppError::ConfigError(format!(
                "site '{}' requires authentication but provides no authenticator",
                descriptor.id
            )));
        }

        let id = descriptor.id.clone();
        if self.adapters.contains_key(&id) {
            return Err(AppError::ConfigError(format!(
                "site '{id}' is registered twice"
            )));
        }

        self.order.push(id.clone());
        self.adapters.insert(id, adapter);
        Ok(self)
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            adapters: self.adapters,
            order: self.order,
        }
    }
}

fn validate_descriptor(descriptor: &SiteDescriptor) -> Result<(), AppError> {
    let id = &descriptor.id;
    let well_formed = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !well_formed {
        return Err(AppError::ConfigError(format!(
            "site id '{id}' must be non-empty lowercase ascii"
        )));
    }

    if descriptor.rate_limit.max_concurrent == 0 {
        return Err(AppError::ConfigError(format!(
            "site '{id}' must allow at least one concurrent request"
        )));
    }

    let base = Url::parse(&descriptor.base_url).map_err(|e| {
        AppError::ConfigError(format!(
            "site '{id}' has invalid base url '{}': {e}",
            descriptor.base_url
        ))
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(AppError::ConfigError(format!(
            "site '{id}' base url must be http(s)"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::RateLimitPolicy;
    use crate::testutil::StubAdapter;

    #[test]
    fn test_list_preserves_registration_order() {
        let registry = AdapterRegistry::builder()
            .register(StubAdapter::new("zeta"))
            .unwrap()
            .register(StubAdapter::new("alpha"))
            .unwrap()
            .build();

        let ids: Vec<_> = registry.list().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_resolve_unknown_site_is_not_found() {
        let registry = AdapterRegistry::builder()
            .register(StubAdapter::new("alpha"))
            .unwrap()
            .build();

        assert!(registry.resolve("alpha").is_ok());
        let err = registry.resolve("beta").err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let err = AdapterRegistry::builder()
            .register(StubAdapter::new("alpha"))
            .unwrap()
            .register(StubAdapter::new("alpha"))
            .err()
            .unwrap();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_auth_site_without_authenticator_rejected() {
        let adapter = StubAdapter::new("locked").with_missing_authenticator();
        let err = AdapterRegistry::builder().register(adapter).err().unwrap();
        assert!(err.to_string().contains("requires authentication"));
    }

    #[test]
    fn test_invalid_descriptors_rejected() {
        let bad_id = StubAdapter::new("Not Valid");
        assert!(AdapterRegistry::builder().register(bad_id).is_err());

        let zero = StubAdapter::new("zero").with_rate_limit(RateLimitPolicy::new(
            0,
            std::time::Duration::ZERO,
        ));
        assert!(AdapterRegistry::builder().register(zero).is_err());

        let bad_url = StubAdapter::new("badurl").with_base_url("ftp://files.test");
        assert!(AdapterRegistry::builder().register(bad_url).is_err());
    }
}
