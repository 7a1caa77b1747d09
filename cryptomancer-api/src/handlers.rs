//! API route handlers.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use cryptomancer_cache::{CacheStats, LookupSource};
use cryptomancer_core::constants::{DEFAULT_PAGE, DEFAULT_PER_PAGE, DEFAULT_VS_CURRENCY};
use cryptomancer_core::types::{NewSubmission, PageRequest, PriceQuery};

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// Response header telling clients how the listing was produced.
pub static X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse { ok: true })
}

/// GET /api/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "up".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        source: state.prices.source_name().into(),
        cache: state.prices.cache().stats(),
    })
}

/// GET /api/prices
pub async fn get_prices(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<PricesParams>, QueryRejection>,
) -> Result<Response> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let query = PriceQuery::new(
        params.currency.as_deref().unwrap_or(DEFAULT_VS_CURRENCY),
        params.limit.unwrap_or(DEFAULT_PER_PAGE),
    )
    .with_page(params.page.unwrap_or(DEFAULT_PAGE));

    let snapshot = state.prices.markets(&query).await?;

    if snapshot.source == LookupSource::Fetched {
        info!(
            currency = %snapshot.query.vs_currency,
            limit = snapshot.query.per_page,
            page = snapshot.query.page,
            "Refreshed market listing"
        );
    }

    let cache_status = match snapshot.source {
        LookupSource::Cached => "HIT",
        LookupSource::Fetched => "MISS",
        LookupSource::Stale => "STALE",
    };

    let body = PricesResponse {
        currency: &snapshot.query.vs_currency,
        limit: snapshot.query.per_page,
        page: snapshot.query.page,
        source: snapshot.source,
        age_ms: snapshot.age.as_millis() as u64,
        stale_reason: snapshot.stale_reason.as_deref(),
        data: &snapshot.markets,
    };

    Ok((
        [(X_CACHE.clone(), HeaderValue::from_static(cache_status))],
        Json(body),
    )
        .into_response())
}

/// GET /api/cache/stats
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.prices.cache().stats())
}

/// GET /api/contest
pub async fn contest_info() -> Json<ContestResponse> {
    Json(ContestResponse {
        name: "Crypto Contest #1",
        status: "open",
        rules: "Post your performance (PnL/score). Top of the leaderboard wins.",
        endpoints: ContestEndpoints {
            list: "/api/contest/submissions",
            submit: "/api/contest/submit",
        },
    })
}

/// POST /api/contest/submit
pub async fn submit_entry(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<NewSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let Json(submission) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let submission = state.submissions.insert(submission).await?;

    info!(id = submission.id, username = %submission.username, "Accepted contest submission");

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            ok: true,
            submission,
        }),
    ))
}

/// GET /api/contest/submissions
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<SubmissionsParams>, QueryRejection>,
) -> Result<Json<SubmissionsResponse>> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let page = state
        .submissions
        .list(PageRequest::new(params.page, params.limit))
        .await?;

    Ok(Json(SubmissionsResponse { ok: true, page }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
