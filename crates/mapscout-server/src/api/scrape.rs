use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use mapscout_core::{Business, RequestError, ResultCollection, SearchRequest, Target};
use mapscout_scraper::{TermReport, Termination};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

/// Request body. `search_query` is the single-term form; `search_terms`
/// adds more. Omitting `total_results` collects everything.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ScrapeBody {
    #[serde(default)]
    search_query: Option<String>,
    #[serde(default)]
    search_terms: Option<Vec<String>>,
    #[serde(default)]
    total_results: Option<i64>,
}

/// Single-query body posted by the web frontend.
#[derive(Debug, Deserialize)]
pub(super) struct LegacyScrapeBody {
    search_query: String,
    #[serde(default)]
    total_results: Option<i64>,
}

/// `{"detail": "..."}` error body the web frontend reads.
#[derive(Debug, Serialize)]
pub(super) struct LegacyError {
    #[serde(skip)]
    status: StatusCode,
    detail: String,
}

impl LegacyError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for LegacyError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub(super) struct TermResult {
    search_term: String,
    results: ResultCollection,
    attempted: usize,
    succeeded: usize,
    failed: usize,
    termination: Option<Termination>,
    cancelled: bool,
    error: Option<String>,
    output_error: Option<String>,
}

impl From<TermReport> for TermResult {
    fn from(report: TermReport) -> Self {
        let failed = report.failed();
        Self {
            search_term: report.search_term,
            results: report.businesses,
            attempted: report.attempted,
            succeeded: report.succeeded,
            failed,
            termination: report.termination,
            cancelled: report.cancelled,
            error: report.error,
            output_error: report.sink_error,
        }
    }
}

fn validate(body: ScrapeBody) -> Result<SearchRequest, String> {
    let target = match body.total_results {
        None => Target::Unbounded,
        Some(n) if n < 0 => return Err("total_results must not be negative".to_string()),
        Some(n) => {
            let count = usize::try_from(n).map_err(|_| "total_results is too large".to_string())?;
            Target::from_count(Some(count)).map_err(|e| request_message(&e))?
        }
    };

    let terms = body
        .search_query
        .into_iter()
        .chain(body.search_terms.unwrap_or_default());
    SearchRequest::new(terms, target).map_err(|e| request_message(&e))
}

fn request_message(error: &RequestError) -> String {
    match error {
        RequestError::NoSearchTerms => {
            "provide a non-blank search_query or search_terms".to_string()
        }
        RequestError::ZeroTarget => {
            "total_results must be at least 1 (omit it to collect everything)".to_string()
        }
    }
}

pub(super) async fn run_scrape(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<ScrapeBody>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<TermResult>>>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::new(req_id.0.clone(), "bad_request", e.body_text()))?;
    let request =
        validate(body).map_err(|msg| ApiError::new(req_id.0.clone(), "validation_error", msg))?;

    let report = state.scraper.scrape(request).await.map_err(|e| {
        tracing::error!(error = %format!("{e:#}"), "scrape failed");
        ApiError::new(req_id.0.clone(), "browser_unavailable", format!("{e:#}"))
    })?;

    Ok(Json(ApiResponse {
        data: report.terms.into_iter().map(TermResult::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Runs one `search_query` and answers with the bare business list.
pub(super) async fn run_legacy_scrape(
    State(state): State<AppState>,
    body: Result<Json<LegacyScrapeBody>, JsonRejection>,
) -> Result<Json<Vec<Business>>, LegacyError> {
    let Json(body) =
        body.map_err(|e| LegacyError::new(StatusCode::UNPROCESSABLE_ENTITY, e.body_text()))?;
    let request = validate(ScrapeBody {
        search_query: Some(body.search_query),
        search_terms: None,
        total_results: body.total_results,
    })
    .map_err(|msg| LegacyError::new(StatusCode::UNPROCESSABLE_ENTITY, msg))?;

    let report = state.scraper.scrape(request).await.map_err(|e| {
        tracing::error!(error = %format!("{e:#}"), "scrape failed");
        LegacyError::new(StatusCode::SERVICE_UNAVAILABLE, format!("{e:#}"))
    })?;

    let Some(term) = report.terms.into_iter().next() else {
        return Ok(Json(Vec::new()));
    };
    // an aborted term that still produced records returns them
    if let Some(error) = term.error.filter(|_| term.businesses.is_empty()) {
        return Err(LegacyError::new(StatusCode::BAD_GATEWAY, error));
    }
    Ok(Json(term.businesses.into_vec()))
}
