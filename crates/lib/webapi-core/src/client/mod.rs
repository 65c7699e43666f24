//! Typed access to the remote WebAPI.
//!
//! `WebApi` is the contract the control plane is written against; `HttpWebApi`
//! implements it over `reqwest`.

use std::{error::Error, fmt};

use async_trait::async_trait;
use webapi_models::models::{
    CohortDefinition,
    CohortDefinitionDraft,
    Concept,
    ConceptSearch,
    ConceptSetSummary,
    Domain,
    JobCancellation,
    JobExecution,
    RelatedConcept,
    Source,
    Vocabulary,
    WebApiInfo,
};
use webapi_models::schema::ConceptSetExpression;

pub mod http;

pub use http::HttpWebApi;

const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug)]
pub enum ClientError {
    Http(reqwest::Error),
    Status {
        status: u16,
        url: String,
        body: String,
    },
    Decode(String),
}

impl ClientError {
    /// True when the remote version does not provide the endpoint at all.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Status { status: 404 | 405 | 501, .. })
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "request failed: {err}"),
            Self::Status { status, url, body } => {
                let body = body.trim();
                if body.is_empty() {
                    write!(f, "WebAPI returned {status} for {url}")
                } else {
                    let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
                    write!(f, "WebAPI returned {status} for {url}: {snippet}")
                }
            }
            Self::Decode(message) => write!(f, "invalid WebAPI response: {message}"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Status { .. } | Self::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Operations the façade needs from the remote service.
///
/// Single-entity lookups return `Ok(None)` when the entity does not exist.
#[async_trait]
pub trait WebApi: Send + Sync + 'static {
    async fn search_concepts(&self, search: &ConceptSearch) -> ClientResult<Vec<Concept>>;

    async fn get_concept(&self, concept_id: i64) -> ClientResult<Option<Concept>>;

    async fn related_concepts(&self, concept_id: i64) -> ClientResult<Vec<RelatedConcept>>;

    async fn descendant_concepts(&self, concept_id: i64) -> ClientResult<Vec<RelatedConcept>>;

    async fn list_domains(&self) -> ClientResult<Vec<Domain>>;

    async fn list_vocabularies(&self) -> ClientResult<Vec<Vocabulary>>;

    async fn list_concept_sets(&self) -> ClientResult<Vec<ConceptSetSummary>>;

    async fn get_concept_set(&self, concept_set_id: i64) -> ClientResult<Option<ConceptSetSummary>>;

    async fn concept_set_expression(
        &self,
        concept_set_id: i64,
    ) -> ClientResult<Option<ConceptSetExpression>>;

    async fn list_cohort_definitions(&self) -> ClientResult<Vec<CohortDefinition>>;

    async fn get_cohort_definition(&self, cohort_id: i64) -> ClientResult<Option<CohortDefinition>>;

    async fn create_cohort_definition(
        &self,
        draft: &CohortDefinitionDraft,
    ) -> ClientResult<CohortDefinition>;

    async fn list_sources(&self) -> ClientResult<Vec<Source>>;

    async fn job_execution(&self, execution_id: &str) -> ClientResult<Option<JobExecution>>;

    async fn list_job_executions(&self, limit: usize) -> ClientResult<Vec<JobExecution>>;

    async fn cancel_job_execution(&self, execution_id: &str)
        -> ClientResult<Option<JobCancellation>>;

    async fn info(&self) -> ClientResult<Option<WebApiInfo>>;
}
