//! Resource routes backed by the tool catalogue.

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use webapi_core::client::WebApi;
use webapi_core::text::ToolText;

use crate::{ApiResult, AppState};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LimitQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CohortListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_term: Option<String>,
}

/// REST bodies name the result cap `page_size`; the tools call it `limit`.
fn page_size_as_limit(mut body: Value) -> Value {
    if let Some(object) = body.as_object_mut()
        && let Some(page_size) = object.remove("page_size")
    {
        object.entry("limit").or_insert(page_size);
    }
    body
}

fn query_arguments<Q: Serialize>(query: &Q) -> Value {
    serde_json::to_value(query).unwrap_or(Value::Null)
}

pub(crate) fn routes<C: WebApi>() -> Router<AppState<C>> {
    Router::new()
        .route("/tools/:name", post(call_tool::<C>))
        .route("/vocabulary/search", post(search_concepts::<C>))
        .route("/vocabulary/details", post(get_concept_details::<C>))
        .route("/vocabulary/hierarchy", post(browse_concept_hierarchy::<C>))
        .route("/vocabulary/domains", get(list_domains::<C>))
        .route("/vocabulary/vocabularies", get(list_vocabularies::<C>))
        .route("/concept-sets", get(list_concept_sets::<C>))
        .route("/concept-sets/create", post(create_concept_set::<C>))
        .route(
            "/concept-sets/create-from-search",
            post(create_concept_set_from_search::<C>),
        )
        .route("/concept-sets/:concept_set_id", get(get_concept_set_details::<C>))
        .route(
            "/cohorts",
            get(list_cohorts::<C>).post(save_cohort_definition::<C>),
        )
        .route("/cohorts/primary-criteria", post(define_primary_criteria::<C>))
        .route("/cohorts/inclusion-rules", post(add_inclusion_rule::<C>))
        .route("/cohorts/validate", post(validate_cohort_definition::<C>))
        .route("/cohorts/estimate-size", post(estimate_cohort_size::<C>))
        .route("/cohorts/save", post(save_cohort_definition::<C>))
        .route("/cohorts/list", post(list_cohorts_from_body::<C>))
        .route("/cohorts/load", post(load_existing_cohort::<C>))
        .route("/cohorts/compare", post(compare_cohorts::<C>))
        .route("/cohorts/clone", post(clone_cohort::<C>))
        .route("/jobs", get(list_recent_jobs::<C>))
        .route(
            "/jobs/:execution_id",
            get(get_job_status::<C>).delete(cancel_job::<C>),
        )
        .route("/jobs/:execution_id/monitor", get(monitor_job_progress::<C>))
        .route("/sources", get(list_data_sources::<C>))
        .route("/sources/default/info", get(get_default_source::<C>))
        .route("/sources/:source_key", get(get_source_details::<C>))
        .route("/info", get(get_webapi_info::<C>))
        .route("/info/version", get(get_webapi_version::<C>))
        .route("/info/health", get(check_webapi_health::<C>))
}

/// Generic entry point: any catalogued tool with a JSON arguments object.
async fn call_tool<C: WebApi>(
    State(state): State<AppState<C>>,
    Path(name): Path<String>,
    arguments: Option<Json<Value>>,
) -> ApiResult<ToolText> {
    let arguments = arguments.map_or(Value::Null, |Json(arguments)| arguments);
    state.call(&name, arguments).await
}

async fn search_concepts<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("search_concepts", page_size_as_limit(body)).await
}

async fn get_concept_details<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("get_concept_details", body).await
}

async fn browse_concept_hierarchy<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state
        .call("browse_concept_hierarchy", page_size_as_limit(body))
        .await
}

async fn list_domains<C: WebApi>(State(state): State<AppState<C>>) -> ApiResult<ToolText> {
    state.call("list_domains", Value::Null).await
}

async fn list_vocabularies<C: WebApi>(State(state): State<AppState<C>>) -> ApiResult<ToolText> {
    state.call("list_vocabularies", Value::Null).await
}

async fn list_concept_sets<C: WebApi>(State(state): State<AppState<C>>) -> ApiResult<ToolText> {
    state.call("list_concept_sets", Value::Null).await
}

async fn create_concept_set<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("create_concept_set", body).await
}

async fn create_concept_set_from_search<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("create_concept_set_from_search", body).await
}

async fn get_concept_set_details<C: WebApi>(
    State(state): State<AppState<C>>,
    Path(concept_set_id): Path<i64>,
) -> ApiResult<ToolText> {
    state
        .call(
            "get_concept_set_details",
            json!({ "concept_set_id": concept_set_id }),
        )
        .await
}

async fn define_primary_criteria<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("define_primary_criteria", body).await
}

async fn add_inclusion_rule<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("add_inclusion_rule", body).await
}

async fn validate_cohort_definition<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("validate_cohort_definition", body).await
}

async fn estimate_cohort_size<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("estimate_cohort_size", body).await
}

async fn save_cohort_definition<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("save_cohort_definition", body).await
}

async fn list_cohorts<C: WebApi>(
    State(state): State<AppState<C>>,
    Query(query): Query<CohortListQuery>,
) -> ApiResult<ToolText> {
    state.call("list_cohorts", query_arguments(&query)).await
}

async fn list_cohorts_from_body<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("list_cohorts", body).await
}

async fn load_existing_cohort<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("load_existing_cohort", body).await
}

async fn compare_cohorts<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("compare_cohorts", body).await
}

async fn clone_cohort<C: WebApi>(
    State(state): State<AppState<C>>,
    Json(body): Json<Value>,
) -> ApiResult<ToolText> {
    state.call("clone_cohort", body).await
}

async fn list_recent_jobs<C: WebApi>(
    State(state): State<AppState<C>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<ToolText> {
    state.call("list_recent_jobs", query_arguments(&query)).await
}

async fn get_job_status<C: WebApi>(
    State(state): State<AppState<C>>,
    Path(execution_id): Path<String>,
) -> ApiResult<ToolText> {
    state
        .call("get_job_status", json!({ "execution_id": execution_id }))
        .await
}

async fn cancel_job<C: WebApi>(
    State(state): State<AppState<C>>,
    Path(execution_id): Path<String>,
) -> ApiResult<ToolText> {
    state
        .call("cancel_job", json!({ "execution_id": execution_id }))
        .await
}

async fn monitor_job_progress<C: WebApi>(
    State(state): State<AppState<C>>,
    Path(execution_id): Path<String>,
) -> ApiResult<ToolText> {
    state
        .call("monitor_job_progress", json!({ "execution_id": execution_id }))
        .await
}

async fn list_data_sources<C: WebApi>(State(state): State<AppState<C>>) -> ApiResult<ToolText> {
    state.call("list_data_sources", Value::Null).await
}

async fn get_source_details<C: WebApi>(
    State(state): State<AppState<C>>,
    Path(source_key): Path<String>,
) -> ApiResult<ToolText> {
    state
        .call("get_source_details", json!({ "source_key": source_key }))
        .await
}

async fn get_default_source<C: WebApi>(State(state): State<AppState<C>>) -> ApiResult<ToolText> {
    state.call("get_default_source", Value::Null).await
}

async fn get_webapi_info<C: WebApi>(State(state): State<AppState<C>>) -> ApiResult<ToolText> {
    state.call("get_webapi_info", Value::Null).await
}

async fn get_webapi_version<C: WebApi>(State(state): State<AppState<C>>) -> ApiResult<ToolText> {
    state.call("get_webapi_version", Value::Null).await
}

async fn check_webapi_health<C: WebApi>(State(state): State<AppState<C>>) -> ApiResult<ToolText> {
    state.call("check_webapi_health", Value::Null).await
}
