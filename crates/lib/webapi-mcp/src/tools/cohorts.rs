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

use super::choices::{ClinicalDomain, Occurrence, default_occurrence_count};
use crate::{WebApiMcp, helpers};

/// Parameters for the index event of a cohort.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PrimaryCriteriaParams {
    /// Concept set that qualifies the index event.
    pub concept_set_id: i64,
    /// Clinical domain of the index event.
    pub domain: ClinicalDomain,
    /// Keep the first qualifying event per person, or all of them.
    #[serde(default)]
    pub occurrence_type: Occurrence,
    /// Days of prior observation required.
    #[serde(default)]
    pub observation_window_prior: i64,
    /// Days of post observation required.
    #[serde(default)]
    pub observation_window_post: i64,
}

/// Parameters for one inclusion rule.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InclusionRuleParams {
    /// Name of the rule.
    pub name: String,
    /// Criteria domain, same values as the primary criteria domain.
    pub criteria_type: ClinicalDomain,
    /// Concept set the rule matches against.
    pub concept_set_id: i64,
    /// Window start relative to index start, in days.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_window_start: Option<i32>,
    /// Window end relative to index start, in days.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_window_end: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_window_start: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_window_end: Option<i32>,
    /// Minimum number of occurrences.
    #[serde(default = "default_occurrence_count")]
    pub occurrence_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ValidateCohortParams {
    /// Cohort definition expression as a JSON object.
    pub cohort_definition: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EstimateCohortSizeParams {
    /// Cohort definition expression as a JSON object.
    pub cohort_definition: Value,
    /// Data source key; defaults to the configured source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
}

#[tool_router(router = tool_router_cohorts, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "Define the primary criteria (index event) for a cohort.")]
    async fn define_primary_criteria(
        &self,
        Parameters(params): Parameters<PrimaryCriteriaParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("define_primary_criteria", helpers::arguments(&params)?).await)
    }

    #[tool(
        description = "Build an inclusion rule to add to a cohort definition. Window offsets are signed days relative to the index event; in the returned rule each endpoint's Days is unsigned and Coeff carries the sign (-1 before index, 1 after)."
    )]
    async fn add_inclusion_rule(
        &self,
        Parameters(params): Parameters<InclusionRuleParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("add_inclusion_rule", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Validate a cohort definition for structural errors and warnings.")]
    async fn validate_cohort_definition(
        &self,
        Parameters(params): Parameters<ValidateCohortParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("validate_cohort_definition", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Estimate cohort size (heuristic preview; no generation job is run).")]
    async fn estimate_cohort_size(
        &self,
        Parameters(params): Parameters<EstimateCohortSizeParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("estimate_cohort_size", helpers::arguments(&params)?).await)
    }
}
