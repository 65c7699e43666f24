use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use webapi_models::models::{
    CohortDefinition,
    CohortDefinitionDraft,
    Concept,
    ConceptSearch,
    ConceptSetSummary,
    Domain,
    JobCancellation,
    JobExecution,
    JobExecutionPage,
    RelatedConcept,
    Source,
    Vocabulary,
    WebApiInfo,
};
use webapi_models::schema::ConceptSetExpression;

use super::{ClientError, ClientResult, WebApi};

/// `reqwest`-backed client for a single WebAPI base URL.
///
/// The underlying `reqwest::Client` is shared; cloning this type is cheap.
#[derive(Clone)]
pub struct HttpWebApi {
    http: Client,
    base_url: String,
}

impl HttpWebApi {
    #[must_use]
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends a request and returns the status and raw body.
    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> ClientResult<(StatusCode, String, String)> {
        let url = self.url(path);
        debug!(%method, %url, "webapi request");
        let mut request = self
            .http
            .request(method, &url)
            .header(reqwest::header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%url, status = status.as_u16(), bytes = text.len(), "webapi response");
        Ok((status, url, text))
    }

    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> ClientResult<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let (status, url, text) = self.send(method, path, query, body).await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url,
                body: text,
            });
        }
        decode_optional(&text)
    }

    /// GET where a 404 or an empty body means the entity does not exist.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> ClientResult<Option<T>> {
        match self.request::<T, ()>(Method::GET, path, &[], None).await {
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            other => other,
        }
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> ClientResult<Vec<T>> {
        Ok(self.get_optional(path).await?.unwrap_or_default())
    }
}

fn decode_optional<T: DeserializeOwned>(text: &str) -> ClientResult<Option<T>> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

fn job_execution_path(execution_id: &str) -> String {
    format!("job/execution/{}", urlencoding::encode(execution_id.trim()))
}

#[async_trait]
impl WebApi for HttpWebApi {
    async fn search_concepts(&self, search: &ConceptSearch) -> ClientResult<Vec<Concept>> {
        let mut concepts: Vec<Concept> = self
            .request(Method::POST, "vocabulary/search", &[], Some(search))
            .await?
            .unwrap_or_default();
        concepts.truncate(search.page_size);
        Ok(concepts)
    }

    async fn get_concept(&self, concept_id: i64) -> ClientResult<Option<Concept>> {
        self.get_optional(&format!("vocabulary/concept/{concept_id}"))
            .await
    }

    async fn related_concepts(&self, concept_id: i64) -> ClientResult<Vec<RelatedConcept>> {
        self.get_list(&format!("vocabulary/concept/{concept_id}/related"))
            .await
    }

    async fn descendant_concepts(&self, concept_id: i64) -> ClientResult<Vec<RelatedConcept>> {
        self.get_list(&format!("vocabulary/concept/{concept_id}/descendants"))
            .await
    }

    async fn list_domains(&self) -> ClientResult<Vec<Domain>> {
        self.get_list("vocabulary/domains").await
    }

    async fn list_vocabularies(&self) -> ClientResult<Vec<Vocabulary>> {
        self.get_list("vocabulary/vocabularies").await
    }

    async fn list_concept_sets(&self) -> ClientResult<Vec<ConceptSetSummary>> {
        self.get_list("conceptset/").await
    }

    async fn get_concept_set(&self, concept_set_id: i64) -> ClientResult<Option<ConceptSetSummary>> {
        self.get_optional(&format!("conceptset/{concept_set_id}"))
            .await
    }

    async fn concept_set_expression(
        &self,
        concept_set_id: i64,
    ) -> ClientResult<Option<ConceptSetExpression>> {
        self.get_optional(&format!("conceptset/{concept_set_id}/expression"))
            .await
    }

    async fn list_cohort_definitions(&self) -> ClientResult<Vec<CohortDefinition>> {
        self.get_list("cohortdefinition/").await
    }

    async fn get_cohort_definition(&self, cohort_id: i64) -> ClientResult<Option<CohortDefinition>> {
        self.get_optional(&format!("cohortdefinition/{cohort_id}"))
            .await
    }

    async fn create_cohort_definition(
        &self,
        draft: &CohortDefinitionDraft,
    ) -> ClientResult<CohortDefinition> {
        self.request(Method::POST, "cohortdefinition/", &[], Some(draft))
            .await?
            .ok_or_else(|| ClientError::Decode("empty response to cohort creation".to_string()))
    }

    async fn list_sources(&self) -> ClientResult<Vec<Source>> {
        self.get_list("source/sources").await
    }

    async fn job_execution(&self, execution_id: &str) -> ClientResult<Option<JobExecution>> {
        self.get_optional(&job_execution_path(execution_id)).await
    }

    async fn list_job_executions(&self, limit: usize) -> ClientResult<Vec<JobExecution>> {
        let query = [
            ("pageIndex", "0".to_string()),
            ("pageSize", limit.to_string()),
            ("comprehensivePage", "false".to_string()),
        ];
        let page: Option<JobExecutionPage> = self
            .request::<_, ()>(Method::GET, "job/execution", &query, None)
            .await?;
        let mut executions = page.map(JobExecutionPage::into_vec).unwrap_or_default();
        executions.truncate(limit);
        Ok(executions)
    }

    async fn cancel_job_execution(
        &self,
        execution_id: &str,
    ) -> ClientResult<Option<JobCancellation>> {
        let path = job_execution_path(execution_id);
        let (status, url, text) = self.send::<()>(Method::DELETE, &path, &[], None).await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                url,
                body: text,
            });
        }
        // Some versions answer with the execution record instead of a cancellation result.
        Ok(decode_optional::<JobCancellation>(&text).unwrap_or_default())
    }

    async fn info(&self) -> ClientResult<Option<WebApiInfo>> {
        self.get_optional("info").await
    }
}
