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

use super::choices::{Direction, default_limit, default_max_levels, default_true};
use crate::{WebApiMcp, helpers};

/// Parameters for a vocabulary search.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchConceptsParams {
    /// Search term for concepts.
    pub query: String,
    /// Domain filter (e.g. 'Condition', 'Drug').
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Vocabulary filter (e.g. 'SNOMED', 'RxNorm').
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary: Option<String>,
    /// Concept class filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_class: Option<String>,
    /// Return only standard concepts.
    #[serde(default = "default_true")]
    pub standard_only: bool,
    /// Include invalid or deprecated concepts.
    #[serde(default)]
    pub include_invalid: bool,
    /// Maximum number of results, at most 100.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ConceptDetailsParams {
    /// OMOP concept ID.
    pub concept_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BrowseHierarchyParams {
    /// Starting concept ID.
    pub concept_id: i64,
    /// Walk down to descendants, up to ancestors, or both ways.
    #[serde(default)]
    pub direction: Direction,
    /// Maximum hierarchy levels.
    #[serde(default = "default_max_levels")]
    pub max_levels: u32,
    /// Maximum concepts per direction.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[tool_router(router = tool_router_vocabulary, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "Search for medical concepts in OMOP vocabularies.")]
    async fn search_concepts(
        &self,
        Parameters(params): Parameters<SearchConceptsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("search_concepts", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Get detailed information about a specific concept, including related concepts.")]
    async fn get_concept_details(
        &self,
        Parameters(params): Parameters<ConceptDetailsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("get_concept_details", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Browse the concept hierarchy (ancestors and/or descendants).")]
    async fn browse_concept_hierarchy(
        &self,
        Parameters(params): Parameters<BrowseHierarchyParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("browse_concept_hierarchy", helpers::arguments(&params)?).await)
    }

    #[tool(description = "List all available domains in the OMOP CDM.")]
    async fn list_domains(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("list_domains", Value::Null).await)
    }

    #[tool(description = "List all available vocabularies in the OMOP CDM.")]
    async fn list_vocabularies(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("list_vocabularies", Value::Null).await)
    }
}
