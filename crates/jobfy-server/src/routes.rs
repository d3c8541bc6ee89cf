use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use jobfy_core::CancelOutcome;
use jobfy_core::error::AppError;
use jobfy_core::run::ScrapeRequest;
use jobfy_core::run_log::RECENT_RUNS_LIMIT;
use jobfy_core::sink::OfferQuery;

use crate::auth::require_api_key;
use crate::dto::{
    ErrorResponse, HealthResponse, ListOffersQuery, ListRunsQuery, OfferListResponse,
    OfferResponse, RunListResponse, RunResponse, SiteListResponse, SiteResponse,
    StartScrapeRequest, StartScrapeResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_OFFERS_PAGE: usize = 100;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/scrape", post(start_scrape))
        .route("/v1/sites", get(list_sites))
        .route("/v1/runs", get(list_runs))
        .route("/v1/runs/{id}", get(get_run).delete(cancel_run))
        .route("/v1/jobs", get(list_offers))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

fn error_body(status: StatusCode, error: &str, message: String) -> axum::response::Response {
    let body = ErrorResponse {
        error: error.to_string(),
        message,
    };
    (status, axum::Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/scrape",
    request_body = StartScrapeRequest,
    responses(
        (status = 202, description = "Run started", body = StartScrapeResponse),
        (status = 400, description = "Empty or unknown site list", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn start_scrape(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<StartScrapeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut request = ScrapeRequest::new(body.sites);
    if let Some(keyword) = body.keyword.as_deref() {
        request = request.with_keyword(keyword);
    }
    if let Some(location) = body.location.as_deref() {
        request = request.with_location(location);
    }

    let run_id = state.runs.start(request)?;
    let status = state
        .runs
        .get_run(run_id)
        .map(|entry| entry.status.to_string())
        .unwrap_or_else(|| "pending".to_string());

    Ok((
        StatusCode::ACCEPTED,
        axum::Json(StartScrapeResponse { run_id, status }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/runs",
    params(ListRunsQuery),
    responses(
        (status = 200, description = "Recent runs, newest first", body = RunListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRunsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(RECENT_RUNS_LIMIT);
    let runs: Vec<RunResponse> = state
        .runs
        .recent_runs(limit)
        .into_iter()
        .map(RunResponse::from)
        .collect();

    axum::Json(RunListResponse {
        total: runs.len(),
        runs,
    })
}

#[utoipa::path(
    get,
    path = "/v1/runs/{id}",
    params(
        ("id" = Uuid, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Run details", body = RunResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .runs
        .get_run(id)
        .ok_or_else(|| AppError::NotFound(format!("Run not found: {id}")))?;
    Ok(axum::Json(RunResponse::from(entry)))
}

#[utoipa::path(
    delete,
    path = "/v1/runs/{id}",
    params(
        ("id" = Uuid, Path, description = "Run ID")
    ),
    responses(
        (status = 204, description = "Cancellation requested"),
        (status = 404, description = "Not found", body = ErrorResponse),
        (status = 409, description = "Run already finished", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "runs"
)]
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.runs.cancel(id) {
        CancelOutcome::Cancelled => StatusCode::NO_CONTENT.into_response(),
        CancelOutcome::AlreadyFinished => {
            let status = state
                .runs
                .get_run(id)
                .map(|entry| entry.status.to_string())
                .unwrap_or_default();
            error_body(
                StatusCode::CONFLICT,
                "conflict",
                format!("Run {id} is already in terminal state: {status}"),
            )
        }
        CancelOutcome::NotFound => error_body(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Run not found: {id}"),
        ),
    }
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/sites",
    responses(
        (status = 200, description = "Registered sites", body = SiteListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "sites"
)]
pub async fn list_sites(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sites = state
        .runs
        .sites()
        .into_iter()
        .map(|site| {
            let configured = site.requires_auth && state.runs.has_credentials(&site.id);
            SiteResponse::new(site, configured)
        })
        .collect();

    axum::Json(SiteListResponse { sites })
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/jobs",
    params(ListOffersQuery),
    responses(
        (status = 200, description = "Collected offers, newest first", body = OfferListResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer" = [])),
    tag = "offers"
)]
pub async fn list_offers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOffersQuery>,
) -> impl IntoResponse {
    let page = state.offers.list(&OfferQuery {
        source: query.source,
        search: query.search,
        limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_OFFERS_PAGE),
        offset: query.offset.unwrap_or_default(),
    });

    axum::Json(OfferListResponse {
        total: page.total,
        offers: page.offers.into_iter().map(OfferResponse::from).collect(),
    })
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        sites: state.runs.sites().len(),
    })
}
