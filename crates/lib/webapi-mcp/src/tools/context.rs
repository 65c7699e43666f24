use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use webapi_core::client::WebApi;

use crate::WebApiMcp;

const COMMANDS: &[(&str, &str)] = &[
    ("help", "List the MCP commands and the cohort-building workflow."),
    ("search_concepts", "Search OMOP vocabularies by text with domain/vocabulary/class filters."),
    ("get_concept_details", "Show one concept and its related concepts."),
    ("browse_concept_hierarchy", "Walk ancestors and/or descendants of a concept."),
    ("list_domains", "List OMOP domains."),
    ("list_vocabularies", "List loaded vocabularies."),
    ("create_concept_set", "Build a concept set expression from explicit concept ids."),
    ("create_concept_set_from_search", "Build a concept set from several searches."),
    ("list_concept_sets", "List stored concept sets."),
    ("get_concept_set_details", "Show a stored concept set."),
    ("define_primary_criteria", "Build the index event of a cohort."),
    ("add_inclusion_rule", "Build an inclusion rule with temporal windows."),
    ("validate_cohort_definition", "Check a cohort expression for errors and warnings."),
    ("estimate_cohort_size", "Heuristic size preview for a cohort expression."),
    ("save_cohort_definition", "Persist a cohort expression on the WebAPI."),
    ("load_existing_cohort", "Load a cohort by id or name."),
    ("list_cohorts", "List stored cohorts with an optional search term."),
    ("compare_cohorts", "Compare two cohort expressions."),
    ("clone_cohort", "Copy a stored cohort with optional modifications."),
    ("get_job_status", "Show the status of a job execution."),
    ("list_recent_jobs", "List recent job executions."),
    ("cancel_job", "Cancel a running job."),
    ("monitor_job_progress", "One-shot progress report for a job."),
    ("list_data_sources", "List CDM data sources."),
    ("get_source_details", "Show one data source."),
    ("get_default_source", "Show the default data source."),
    ("get_webapi_info", "Show WebAPI version and build information."),
    ("get_webapi_version", "Show the WebAPI version."),
    ("check_webapi_health", "Probe WebAPI connectivity."),
];

const WORKFLOW: &str = r"
1. Find concepts: `search_concepts`, then refine with `get_concept_details` and `browse_concept_hierarchy`.
2. Group them: `create_concept_set` or `create_concept_set_from_search`. Keep the returned expression.
3. Index event: `define_primary_criteria` with the concept set id and its domain.
4. Restrictions: `add_inclusion_rule` once per rule. Windows are days relative to the index event;
   negative numbers look back.
5. Assemble the ConceptSets, PrimaryCriteria, and InclusionRules into one cohort expression and run
   `validate_cohort_definition`. Fix every error before saving.
6. `estimate_cohort_size` gives a rough preview; `save_cohort_definition` persists the expression.
";

/// Payload listing the MCP commands and the cohort-building workflow.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
    pub workflow: String,
}

impl Default for HelpCommands {
    fn default() -> Self {
        Self {
            commands: COMMANDS
                .iter()
                .map(|(name, summary)| format!("{name} - {summary}"))
                .collect(),
            workflow: WORKFLOW.trim().to_string(),
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "List the MCP commands and how to build a cohort definition with them.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }
}
