use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webapi_core::client::WebApi;

use super::choices::{FailurePolicy, default_max_concepts_per_query, default_true};
use crate::{WebApiMcp, helpers};

/// Parameters for a concept set built from explicit ids.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CreateConceptSetParams {
    /// Name for the concept set.
    pub name: String,
    /// Concept IDs; every id must resolve.
    pub concept_ids: Vec<i64>,
    /// Include descendant concepts.
    #[serde(default = "default_true")]
    pub include_descendants: bool,
    /// Include mapped concepts.
    #[serde(default)]
    pub include_mapped: bool,
}

/// Parameters for a concept set assembled from several searches.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CreateConceptSetFromSearchParams {
    /// Name for the concept set.
    pub name: String,
    /// Search terms; each runs as its own vocabulary search.
    pub search_queries: Vec<String>,
    /// Domain filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Vocabulary filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary: Option<String>,
    #[serde(default = "default_true")]
    pub include_descendants: bool,
    #[serde(default)]
    pub include_mapped: bool,
    /// Maximum concepts kept per search.
    #[serde(default = "default_max_concepts_per_query")]
    pub max_concepts_per_query: usize,
    /// `best_effort` keeps other queries' hits when one fails; `fail_fast` aborts.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ConceptSetDetailsParams {
    /// Concept set ID on the WebAPI.
    pub concept_set_id: i64,
}

#[tool_router(router = tool_router_concept_sets, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "Create a concept set from a list of concept IDs.")]
    async fn create_concept_set(
        &self,
        Parameters(params): Parameters<CreateConceptSetParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("create_concept_set", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Create a concept set by searching for concepts.")]
    async fn create_concept_set_from_search(
        &self,
        Parameters(params): Parameters<CreateConceptSetFromSearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .run("create_concept_set_from_search", helpers::arguments(&params)?)
            .await)
    }

    #[tool(description = "List concept sets stored on the WebAPI.")]
    async fn list_concept_sets(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("list_concept_sets", Value::Null).await)
    }

    #[tool(description = "Show a stored concept set and its first items.")]
    async fn get_concept_set_details(
        &self,
        Parameters(params): Parameters<ConceptSetDetailsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("get_concept_set_details", helpers::arguments(&params)?).await)
    }
}
