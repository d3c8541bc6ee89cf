use jobfy_core::site::Credentials;
use jobfy_core::traits::CredentialProvider;

/// Reads `{SITE}_USERNAME` / `{SITE}_PASSWORD` from the environment,
/// e.g. `INFOJOBS_USERNAME`. Values are read on every lookup so a `.env`
/// loaded after construction is still picked up.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    pub fn new() -> Self {
        Self
    }

    /// Name of the environment variable holding `field` for `site_id`.
    pub fn var_name(site_id: &str, field: &str) -> String {
        format!("{}_{field}", site_id.to_uppercase().replace('-', "_"))
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self, site_id: &str) -> Option<Credentials> {
        lookup_credentials(site_id, |name| std::env::var(name).ok())
    }
}

fn lookup_credentials(
    site_id: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<Credentials> {
    let read = |field: &str| {
        lookup(&EnvCredentials::var_name(site_id, field))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    Some(Credentials::new(read("USERNAME")?, read("PASSWORD")?))
}
