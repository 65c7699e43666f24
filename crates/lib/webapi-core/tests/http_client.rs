use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use webapi_core::client::{ClientError, HttpWebApi, WebApi};
use webapi_models::models::{CohortDefinitionDraft, ConceptSearch};

async fn spawn(app: Router) -> HttpWebApi {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    HttpWebApi::new(reqwest::Client::new(), &format!("http://{addr}/WebAPI/"))
}

fn concept_json(id: i64, name: &str) -> Value {
    json!({
        "CONCEPT_ID": id,
        "CONCEPT_NAME": name,
        "STANDARD_CONCEPT": "S",
        "CONCEPT_CODE": format!("C{id}"),
        "DOMAIN_ID": "Condition",
        "VOCABULARY_ID": "SNOMED",
        "CONCEPT_CLASS_ID": "Clinical Finding",
        "INVALID_REASON": null
    })
}

#[tokio::test]
async fn search_posts_upper_case_body_and_truncates() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let app = Router::new().route(
        "/WebAPI/vocabulary/search",
        post(move |Json(body): Json<Value>| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().expect("recorder lock").push(body);
                Json(json!([
                    concept_json(1, "one"),
                    concept_json(2, "two"),
                    concept_json(3, "three")
                ]))
            }
        }),
    );
    let api = spawn(app).await;

    let search = ConceptSearch::new("diabetes", 2)
        .with_domain(Some("Condition"))
        .standard_only(true)
        .include_invalid(false);
    let concepts = api.search_concepts(&search).await.expect("search should succeed");

    assert_eq!(concepts.len(), 2);
    assert_eq!(concepts[1].concept_name, "two");
    let bodies = seen.lock().expect("recorder lock");
    assert_eq!(
        bodies[0],
        json!({
            "QUERY": "diabetes",
            "DOMAIN_ID": ["Condition"],
            "STANDARD_CONCEPT": "S",
            "INVALID_REASON": "V"
        })
    );
}

#[tokio::test]
async fn missing_entities_are_none() {
    let app = Router::new()
        .route(
            "/WebAPI/vocabulary/concept/:id",
            get(|Path(id): Path<i64>| async move {
                if id == 1 {
                    Ok(Json(concept_json(1, "one")))
                } else {
                    Err(StatusCode::NOT_FOUND)
                }
            }),
        )
        .route("/WebAPI/info", get(|| async { "" }));
    let api = spawn(app).await;

    assert!(api.get_concept(1).await.expect("lookup").is_some());
    assert!(api.get_concept(2).await.expect("lookup").is_none());
    assert!(api.info().await.expect("info").is_none());
}

#[tokio::test]
async fn encoded_cohort_expressions_are_parsed() {
    let app = Router::new().route(
        "/WebAPI/cohortdefinition/:id",
        get(|Path(id): Path<i64>| async move {
            Json(json!({
                "id": id,
                "name": "T2DM",
                "expressionType": "SIMPLE_EXPRESSION",
                "expression": "{\"ConceptSets\":[],\"InclusionRules\":[]}",
                "createdDate": 0
            }))
        }),
    );
    let api = spawn(app).await;

    let cohort = api
        .get_cohort_definition(9)
        .await
        .expect("lookup")
        .expect("cohort should exist");
    assert_eq!(cohort.id, 9);
    assert_eq!(
        cohort.expression,
        Some(json!({"ConceptSets": [], "InclusionRules": []}))
    );
}

#[tokio::test]
async fn cohort_creation_sends_simple_envelope() {
    let seen = Arc::new(Mutex::new(None));
    let recorder = seen.clone();
    let app = Router::new().route(
        "/WebAPI/cohortdefinition/",
        post(move |Json(body): Json<Value>| {
            let recorder = recorder.clone();
            async move {
                let mut created = body.clone();
                created["id"] = json!(17);
                *recorder.lock().expect("recorder lock") = Some(body);
                Json(created)
            }
        }),
    );
    let api = spawn(app).await;

    let draft = CohortDefinitionDraft::simple("New", "desc", json!({"ConceptSets": []}));
    let created = api.create_cohort_definition(&draft).await.expect("create");
    assert_eq!(created.id, 17);

    let body = seen.lock().expect("recorder lock").clone().expect("body recorded");
    assert_eq!(body["expressionType"], "SIMPLE_EXPRESSION");
    assert_eq!(body["name"], "New");
    assert_eq!(body["expression"], json!({"ConceptSets": []}));
}

#[tokio::test]
async fn server_errors_carry_status_and_body() {
    let app = Router::new().route(
        "/WebAPI/source/sources",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database offline") }),
    );
    let api = spawn(app).await;

    let err = api.list_sources().await.expect_err("listing should fail");
    assert!(matches!(err, ClientError::Status { status: 500, .. }));
    assert!(!err.is_unsupported());
    assert!(err.to_string().ends_with("/WebAPI/source/sources: database offline"));
}

#[tokio::test]
async fn job_listing_accepts_pages_and_reports_unsupported() {
    let app = Router::new().route(
        "/WebAPI/job/execution",
        get(|Query(query): Query<Vec<(String, String)>>| async move {
            let size = query
                .iter()
                .find(|(key, _)| key == "pageSize")
                .map(|(_, value)| value.clone())
                .unwrap_or_default();
            Json(json!({"content": [
                {"executionId": 1, "status": "COMPLETED", "pageSize": size},
                {"executionId": 2, "status": "RUNNING"}
            ]}))
        }),
    );
    let api = spawn(app).await;

    let jobs = api.list_job_executions(1).await.expect("listing");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].execution_id, Some(1));
    assert_eq!(jobs[0].extra.get("pageSize"), Some(&json!("1")));

    let bare = spawn(Router::new()).await;
    let err = bare.list_job_executions(5).await.expect_err("no such route");
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn cancellation_tolerates_non_cancellation_bodies() {
    let app = Router::new().route(
        "/WebAPI/job/execution/:id",
        delete(|Path(id): Path<String>| async move {
            Json(json!({"executionId": id, "status": "STOPPING"}))
        }),
    );
    let api = spawn(app).await;

    let outcome = api.cancel_job_execution("4").await.expect("cancel");
    let outcome = outcome.expect("body decodes leniently");
    assert_eq!(outcome.success, None);
}
