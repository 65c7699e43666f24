//! In-memory `WebApi` used by tests across the workspace.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
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

use crate::client::{ClientError, ClientResult, WebApi};
use crate::control::WebApiControlPlane;
use crate::services::{ConnectFn, WebApiConnector, WebApiSettings};

pub const FAKE_BASE_URL: &str = "http://webapi.test/WebAPI";

#[derive(Default)]
struct FakeState {
    concepts: HashMap<i64, Concept>,
    search_results: HashMap<String, Vec<Concept>>,
    failing_queries: HashSet<String>,
    related: HashMap<i64, Vec<RelatedConcept>>,
    descendants: HashMap<i64, Vec<RelatedConcept>>,
    domains: Vec<Domain>,
    vocabularies: Vec<Vocabulary>,
    concept_sets: Vec<ConceptSetSummary>,
    concept_set_expressions: HashMap<i64, ConceptSetExpression>,
    cohorts: Vec<CohortDefinition>,
    sources: Vec<Source>,
    jobs: Vec<JobExecution>,
    job_listing_unsupported: bool,
    job_cancellation_unsupported: bool,
    info: Option<WebApiInfo>,
    offline: bool,
    searches: Vec<ConceptSearch>,
    created: Vec<CohortDefinitionDraft>,
    cancelled: Vec<String>,
}

/// Seedable stand-in for the remote service. Clones share state.
#[derive(Clone, Default)]
pub struct FakeWebApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeWebApi {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn seed(self, apply: impl FnOnce(&mut FakeState)) -> Self {
        apply(&mut self.state());
        self
    }

    #[must_use]
    pub fn with_concept(self, concept: Concept) -> Self {
        self.seed(|state| {
            state.concepts.insert(concept.concept_id, concept);
        })
    }

    /// Registers the result list for a query; matching is case-insensitive.
    #[must_use]
    pub fn with_search_results(self, query: &str, concepts: Vec<Concept>) -> Self {
        self.seed(|state| {
            for concept in &concepts {
                state
                    .concepts
                    .entry(concept.concept_id)
                    .or_insert_with(|| concept.clone());
            }
            state.search_results.insert(query.to_lowercase(), concepts);
        })
    }

    #[must_use]
    pub fn with_failing_query(self, query: &str) -> Self {
        self.seed(|state| {
            state.failing_queries.insert(query.to_lowercase());
        })
    }

    #[must_use]
    pub fn with_related(self, concept_id: i64, related: Vec<RelatedConcept>) -> Self {
        self.seed(|state| {
            state.related.insert(concept_id, related);
        })
    }

    #[must_use]
    pub fn with_descendants(self, concept_id: i64, descendants: Vec<RelatedConcept>) -> Self {
        self.seed(|state| {
            state.descendants.insert(concept_id, descendants);
        })
    }

    #[must_use]
    pub fn with_domains(self, domains: Vec<Domain>) -> Self {
        self.seed(|state| state.domains = domains)
    }

    #[must_use]
    pub fn with_vocabularies(self, vocabularies: Vec<Vocabulary>) -> Self {
        self.seed(|state| state.vocabularies = vocabularies)
    }

    #[must_use]
    pub fn with_concept_set(self, summary: ConceptSetSummary, expression: ConceptSetExpression) -> Self {
        self.seed(|state| {
            state.concept_set_expressions.insert(summary.id, expression);
            state.concept_sets.push(summary);
        })
    }

    #[must_use]
    pub fn with_cohort(self, cohort: CohortDefinition) -> Self {
        self.seed(|state| state.cohorts.push(cohort))
    }

    #[must_use]
    pub fn with_source(self, source: Source) -> Self {
        self.seed(|state| state.sources.push(source))
    }

    #[must_use]
    pub fn with_job(self, job: JobExecution) -> Self {
        self.seed(|state| state.jobs.push(job))
    }

    #[must_use]
    pub fn without_job_listing(self) -> Self {
        self.seed(|state| state.job_listing_unsupported = true)
    }

    #[must_use]
    pub fn without_job_cancellation(self) -> Self {
        self.seed(|state| state.job_cancellation_unsupported = true)
    }

    #[must_use]
    pub fn with_info(self, info: WebApiInfo) -> Self {
        self.seed(|state| state.info = Some(info))
    }

    /// Every call fails as if the service were unreachable.
    #[must_use]
    pub fn offline(self) -> Self {
        self.seed(|state| state.offline = true)
    }

    #[must_use]
    pub fn recorded_searches(&self) -> Vec<ConceptSearch> {
        self.state().searches.clone()
    }

    #[must_use]
    pub fn created_cohorts(&self) -> Vec<CohortDefinitionDraft> {
        self.state().created.clone()
    }

    #[must_use]
    pub fn cancelled_jobs(&self) -> Vec<String> {
        self.state().cancelled.clone()
    }

    #[must_use]
    pub fn connect_fn(&self) -> ConnectFn<Self> {
        let fake = self.clone();
        Arc::new(move |_base_url: &str| fake.clone())
    }

    /// Control plane bound to this fake with a base URL and no default source.
    #[must_use]
    pub fn control_plane(&self) -> WebApiControlPlane<Self> {
        self.control_plane_with(WebApiSettings::default().with_base_url(FAKE_BASE_URL))
    }

    #[must_use]
    pub fn control_plane_with(&self, settings: WebApiSettings) -> WebApiControlPlane<Self> {
        WebApiControlPlane::new(WebApiConnector::new(settings, self.connect_fn()))
    }

    fn check_online(&self, path: &str) -> ClientResult<()> {
        if self.state().offline {
            return Err(status_error(503, path));
        }
        Ok(())
    }
}

fn status_error(status: u16, path: &str) -> ClientError {
    ClientError::Status {
        status,
        url: format!("{FAKE_BASE_URL}/{path}"),
        body: String::new(),
    }
}

#[async_trait]
impl WebApi for FakeWebApi {
    async fn search_concepts(&self, search: &ConceptSearch) -> ClientResult<Vec<Concept>> {
        self.check_online("vocabulary/search")?;
        let mut state = self.state();
        state.searches.push(search.clone());
        let key = search.query.to_lowercase();
        if state.failing_queries.contains(&key) {
            return Err(status_error(500, "vocabulary/search"));
        }
        let mut concepts = state.search_results.get(&key).cloned().unwrap_or_default();
        concepts.truncate(search.page_size);
        Ok(concepts)
    }

    async fn get_concept(&self, concept_id: i64) -> ClientResult<Option<Concept>> {
        self.check_online("vocabulary/concept")?;
        Ok(self.state().concepts.get(&concept_id).cloned())
    }

    async fn related_concepts(&self, concept_id: i64) -> ClientResult<Vec<RelatedConcept>> {
        self.check_online("vocabulary/concept/related")?;
        Ok(self.state().related.get(&concept_id).cloned().unwrap_or_default())
    }

    async fn descendant_concepts(&self, concept_id: i64) -> ClientResult<Vec<RelatedConcept>> {
        self.check_online("vocabulary/concept/descendants")?;
        Ok(self
            .state()
            .descendants
            .get(&concept_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_domains(&self) -> ClientResult<Vec<Domain>> {
        self.check_online("vocabulary/domains")?;
        Ok(self.state().domains.clone())
    }

    async fn list_vocabularies(&self) -> ClientResult<Vec<Vocabulary>> {
        self.check_online("vocabulary/vocabularies")?;
        Ok(self.state().vocabularies.clone())
    }

    async fn list_concept_sets(&self) -> ClientResult<Vec<ConceptSetSummary>> {
        self.check_online("conceptset/")?;
        Ok(self.state().concept_sets.clone())
    }

    async fn get_concept_set(&self, concept_set_id: i64) -> ClientResult<Option<ConceptSetSummary>> {
        self.check_online("conceptset")?;
        Ok(self
            .state()
            .concept_sets
            .iter()
            .find(|set| set.id == concept_set_id)
            .cloned())
    }

    async fn concept_set_expression(
        &self,
        concept_set_id: i64,
    ) -> ClientResult<Option<ConceptSetExpression>> {
        self.check_online("conceptset/expression")?;
        Ok(self
            .state()
            .concept_set_expressions
            .get(&concept_set_id)
            .cloned())
    }

    async fn list_cohort_definitions(&self) -> ClientResult<Vec<CohortDefinition>> {
        self.check_online("cohortdefinition/")?;
        Ok(self.state().cohorts.clone())
    }

    async fn get_cohort_definition(&self, cohort_id: i64) -> ClientResult<Option<CohortDefinition>> {
        self.check_online("cohortdefinition")?;
        Ok(self
            .state()
            .cohorts
            .iter()
            .find(|cohort| cohort.id == cohort_id)
            .cloned())
    }

    async fn create_cohort_definition(
        &self,
        draft: &CohortDefinitionDraft,
    ) -> ClientResult<CohortDefinition> {
        self.check_online("cohortdefinition/")?;
        let mut state = self.state();
        let id = state.cohorts.iter().map(|cohort| cohort.id).max().unwrap_or(0) + 1;
        let created = CohortDefinition {
            id,
            name: draft.name.clone(),
            description: Some(draft.description.clone()),
            expression_type: Some(draft.expression_type.clone()),
            expression: Some(draft.expression.clone()),
            created_date: None,
            modified_date: None,
        };
        state.created.push(draft.clone());
        state.cohorts.push(created.clone());
        Ok(created)
    }

    async fn list_sources(&self) -> ClientResult<Vec<Source>> {
        self.check_online("source/sources")?;
        Ok(self.state().sources.clone())
    }

    async fn job_execution(&self, execution_id: &str) -> ClientResult<Option<JobExecution>> {
        self.check_online("job/execution")?;
        Ok(self
            .state()
            .jobs
            .iter()
            .find(|job| job.execution_id.map(|id| id.to_string()).as_deref() == Some(execution_id))
            .cloned())
    }

    async fn list_job_executions(&self, limit: usize) -> ClientResult<Vec<JobExecution>> {
        self.check_online("job/execution")?;
        let state = self.state();
        if state.job_listing_unsupported {
            return Err(status_error(404, "job/execution"));
        }
        Ok(state.jobs.iter().take(limit).cloned().collect())
    }

    async fn cancel_job_execution(
        &self,
        execution_id: &str,
    ) -> ClientResult<Option<JobCancellation>> {
        self.check_online("job/execution")?;
        let mut state = self.state();
        if state.job_cancellation_unsupported {
            return Err(status_error(405, "job/execution"));
        }
        state.cancelled.push(execution_id.to_string());
        Ok(Some(JobCancellation {
            success: Some(true),
            message: None,
        }))
    }

    async fn info(&self) -> ClientResult<Option<WebApiInfo>> {
        self.check_online("info")?;
        Ok(self.state().info.clone())
    }
}

/// Standard, valid concept fixture.
#[must_use]
pub fn concept(concept_id: i64, name: &str, domain: &str) -> Concept {
    Concept {
        concept_id,
        concept_name: name.to_string(),
        standard_concept: Some("S".to_string()),
        concept_code: Some(format!("C{concept_id}")),
        domain_id: domain.to_string(),
        vocabulary_id: "SNOMED".to_string(),
        concept_class_id: "Clinical Finding".to_string(),
        invalid_reason: None,
    }
}

#[must_use]
pub fn related(concept: Concept, relationship: &str, distance: u32) -> RelatedConcept {
    RelatedConcept {
        concept,
        relationships: vec![webapi_models::models::ConceptRelationship {
            relationship_name: relationship.to_string(),
            relationship_distance: Some(distance),
        }],
    }
}

#[must_use]
pub fn cohort(id: i64, name: &str, expression: Value) -> CohortDefinition {
    CohortDefinition {
        id,
        name: name.to_string(),
        description: None,
        expression_type: Some(webapi_models::schema::EXPRESSION_TYPE_SIMPLE.to_string()),
        expression: Some(expression),
        created_date: None,
        modified_date: None,
    }
}

#[must_use]
pub fn source(key: &str, name: &str) -> Source {
    Source {
        source_id: None,
        source_name: name.to_string(),
        source_key: key.to_string(),
        source_dialect: Some("postgresql".to_string()),
        source_connection: None,
        cdm_version: None,
        vocabulary_version: None,
        source_release_date: None,
        cdm_holder: None,
        source_description: None,
        source_documentation_reference: None,
        daimons: Vec::new(),
        extra: std::collections::BTreeMap::new(),
    }
}

#[must_use]
pub fn job(execution_id: i64, status: &str) -> JobExecution {
    JobExecution {
        execution_id: Some(execution_id),
        status: Some(status.to_string()),
        start_date: None,
        end_date: None,
        exit_status: None,
        job_instance_resource_object: None,
        progress: None,
        message: None,
        extra: std::collections::BTreeMap::new(),
    }
}
