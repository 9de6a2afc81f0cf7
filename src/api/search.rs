//! Search API endpoints.

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::errors::AppError;
use crate::search::SearchHit;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub limit: usize,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// GET /search/{index} - Full-text search over one index.
pub async fn search_index(
    State(state): State<AppState>,
    Path(index_name): Path<String>,
    Query(params): Query<SearchQuery>,
) -> Result<ApiResponse<SearchResponse>, AppError> {
    let limit = params.limit.min(MAX_SEARCH_LIMIT);
    let results = state.index.search(&index_name, &params.q, limit).await?;
    let total = results.len();

    Ok(ApiResponse::new(SearchResponse {
        results,
        total,
        limit,
    }))
}
