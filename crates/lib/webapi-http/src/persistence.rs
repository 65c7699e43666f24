//! Generic result persistence resource.
//!
//! Only listing does real work (it lists cohort definitions); the other
//! operations acknowledge the request with a placeholder message.

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use webapi_core::client::WebApi;
use webapi_core::text::ToolText;

use crate::{ApiResult, AppState, Envelope};

const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
struct SaveResultRequest {
    key: String,
    /// Required so malformed saves are rejected; nothing is stored yet.
    #[serde(rename = "data")]
    _data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResultsRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ListResultsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Placeholder {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
}

impl Placeholder {
    const fn for_key(message: &'static str, key: String) -> Json<Envelope<Self>> {
        Envelope::success(Self {
            message,
            key: Some(key),
            query: None,
        })
    }
}

pub(crate) fn routes<C: WebApi>() -> Router<AppState<C>> {
    Router::new()
        .route(
            "/persistence",
            get(list_results::<C>).post(save_result),
        )
        .route("/persistence/search", post(search_results))
        .route(
            "/persistence/:key",
            get(get_result).delete(delete_result),
        )
}

async fn save_result(Json(request): Json<SaveResultRequest>) -> Json<Envelope<Placeholder>> {
    Placeholder::for_key(
        "Persistence operations are currently cohort-specific",
        request.key,
    )
}

async fn get_result(Path(key): Path<String>) -> Json<Envelope<Placeholder>> {
    Placeholder::for_key("Generic result retrieval not yet implemented", key)
}

async fn delete_result(Path(key): Path<String>) -> Json<Envelope<Placeholder>> {
    Placeholder::for_key("Generic result deletion not yet implemented", key)
}

async fn search_results(Json(request): Json<SearchResultsRequest>) -> Json<Envelope<Placeholder>> {
    Envelope::success(Placeholder {
        message: "Generic result search not yet implemented",
        key: None,
        query: Some(request.query),
    })
}

async fn list_results<C: WebApi>(
    State(state): State<AppState<C>>,
    Query(query): Query<ListResultsQuery>,
) -> ApiResult<ToolText> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    state.call("list_cohorts", json!({ "limit": limit })).await
}
