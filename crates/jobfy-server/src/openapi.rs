use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "JobFy API",
        version = "0.1.0",
        description = "Job posting scraper: start scrape runs across job boards and browse the offers they collect."
    ),
    paths(
        crate::routes::start_scrape,
        crate::routes::list_sites,
        crate::routes::list_runs,
        crate::routes::get_run,
        crate::routes::cancel_run,
        crate::routes::list_offers,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::StartScrapeRequest,
        crate::dto::StartScrapeResponse,
        crate::dto::SiteOutcomeResponse,
        crate::dto::RunResponse,
        crate::dto::RunListResponse,
        crate::dto::SiteResponse,
        crate::dto::SiteListResponse,
        crate::dto::OfferResponse,
        crate::dto::OfferListResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "runs", description = "Scrape runs"),
        (name = "sites", description = "Supported job sites"),
        (name = "offers", description = "Collected job offers"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "API key. Set via JOBFY_SERVER_API_KEY environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
