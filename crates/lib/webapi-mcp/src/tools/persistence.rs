use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use webapi_core::client::WebApi;

use super::choices::default_limit;
use crate::{WebApiMcp, helpers};

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SaveCohortParams {
    /// Name for the cohort definition.
    pub name: String,
    /// Cohort definition expression as a JSON object.
    pub cohort_definition: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Look a cohort up by id, or by name when no id is given.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct LoadCohortParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_id: Option<i64>,
    /// Exact (case-insensitive) or partial cohort name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListCohortsParams {
    /// Maximum number of cohorts to show.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Case-insensitive filter on name and description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CompareCohortsParams {
    /// First cohort expression.
    pub cohort_a: Value,
    /// Second cohort expression.
    pub cohort_b: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_a_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_b_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CloneCohortParams {
    /// Cohort to copy.
    pub source_cohort_id: i64,
    /// Name of the new cohort.
    pub new_name: String,
    /// Top-level expression keys to overlay on the copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_description: Option<String>,
}

#[tool_router(router = tool_router_persistence, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "Save a cohort definition to the WebAPI.")]
    async fn save_cohort_definition(
        &self,
        Parameters(params): Parameters<SaveCohortParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("save_cohort_definition", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Load an existing cohort definition by id or name.")]
    async fn load_existing_cohort(
        &self,
        Parameters(params): Parameters<LoadCohortParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("load_existing_cohort", helpers::arguments(&params)?).await)
    }

    #[tool(description = "List cohort definitions, optionally filtered by a search term.")]
    async fn list_cohorts(
        &self,
        Parameters(params): Parameters<ListCohortsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("list_cohorts", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Compare two cohort definitions side by side.")]
    async fn compare_cohorts(
        &self,
        Parameters(params): Parameters<CompareCohortsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("compare_cohorts", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Clone an existing cohort under a new name, with optional modifications.")]
    async fn clone_cohort(
        &self,
        Parameters(params): Parameters<CloneCohortParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("clone_cohort", helpers::arguments(&params)?).await)
    }
}
