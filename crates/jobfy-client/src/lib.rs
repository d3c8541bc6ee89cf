pub mod adapters;
pub mod credentials;
pub mod http;

pub use adapters::{
    IndeedAdapter, InfoJobsAdapter, LinkedInAdapter, RemoteOkAdapter, TecnoempleoAdapter,
    default_registry,
};
pub use credentials::EnvCredentials;
pub use http::{BROWSER_USER_AGENT, ReqwestClient};
