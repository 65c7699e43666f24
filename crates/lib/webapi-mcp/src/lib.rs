//! MCP server for the OHDSI WebAPI.
//!
//! This crate wires the control plane into rmcp tool handlers. Every tool is
//! routed through `WebApiControlPlane::dispatch`, so the MCP surface and the
//! REST surface answer from the same catalogue.

mod helpers;
mod tools;
pub mod server;

use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use serde_json::Value;
use webapi_core::client::WebApi;
use webapi_core::control::WebApiControlPlane;

const SERVER_INSTRUCTIONS: &str = r"ohdsi-webapi-mcp exposes an OHDSI WebAPI instance as MCP tools for building cohort definitions.

Workflow:
1. Find concepts with `search_concepts`, then inspect them with `get_concept_details` or
   `browse_concept_hierarchy`. `list_domains` and `list_vocabularies` describe what is available.
2. Group concepts with `create_concept_set` (explicit ids) or `create_concept_set_from_search`.
3. Build the definition: `define_primary_criteria` for the index event, then `add_inclusion_rule`
   for each restriction.
4. Check it with `validate_cohort_definition` and `estimate_cohort_size`, then persist it with
   `save_cohort_definition`.
5. Manage existing work with `list_cohorts`, `load_existing_cohort`, `compare_cohorts`, and `clone_cohort`.

Notes:
- Jobs: `get_job_status`, `list_recent_jobs`, `cancel_job`, `monitor_job_progress`.
- Sources: `list_data_sources`, `get_source_details`, `get_default_source`.
- Service: `get_webapi_info`, `get_webapi_version`, `check_webapi_health`.
- Use `help` for the cohort-building guide. `health` returns `ok`.";

/// MCP server wrapper around the control plane and tool routers.
pub struct WebApiMcp<C: WebApi> {
    tool_router: ToolRouter<Self>,
    control: WebApiControlPlane<C>,
}

impl<C: WebApi> Clone for WebApiMcp<C> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            control: self.control.clone(),
        }
    }
}

impl<C: WebApi> WebApiMcp<C> {
    #[must_use]
    pub fn new(control: WebApiControlPlane<C>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_vocabulary()
            + Self::tool_router_concept_sets()
            + Self::tool_router_cohorts()
            + Self::tool_router_persistence()
            + Self::tool_router_jobs()
            + Self::tool_router_sources()
            + Self::tool_router_info()
            + Self::tool_router_context();
        Self {
            tool_router,
            control,
        }
    }

    #[must_use]
    pub const fn control(&self) -> &WebApiControlPlane<C> {
        &self.control
    }

    /// Runs a catalogued tool; control errors become error results, never protocol errors.
    pub(crate) async fn run(&self, tool: &str, arguments: Value) -> CallToolResult {
        helpers::text_result(tool, self.control.dispatch(tool, arguments).await)
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl<C: WebApi> ServerHandler for WebApiMcp<C> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use serde_json::json;
    use webapi_core::control::TOOL_NAMES;
    use webapi_core::services::WebApiSettings;
    use webapi_core::testing::{FakeWebApi, concept};

    fn texts(result: &CallToolResult) -> Vec<String> {
        result
            .content
            .iter()
            .filter_map(|content| content.as_text().map(|text| text.text.clone()))
            .collect()
    }

    #[test]
    fn router_exposes_the_whole_catalogue() {
        let server = WebApiMcp::new(FakeWebApi::default().control_plane());
        let routed: HashSet<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        for name in TOOL_NAMES.iter().chain(&["help", "health"]) {
            assert!(routed.contains(*name), "{name} is not exposed");
        }
        assert_eq!(routed.len(), TOOL_NAMES.len() + 2);
    }

    fn input_schema(name: &str) -> Value {
        let server = WebApiMcp::new(FakeWebApi::default().control_plane());
        server
            .tool_router
            .list_all()
            .into_iter()
            .find(|tool| tool.name == name)
            .map(|tool| Value::Object((*tool.input_schema).clone()))
            .unwrap_or_else(|| panic!("{name} is not routed"))
    }

    /// A property schema, following a `$ref` when the type is not inlined.
    fn property<'a>(schema: &'a Value, name: &str) -> &'a Value {
        let property = &schema["properties"][name];
        let Some(reference) = property["$ref"].as_str() else {
            return property;
        };
        let key = reference.rsplit('/').next().unwrap_or_default();
        if schema["$defs"][key].is_null() {
            &schema["definitions"][key]
        } else {
            &schema["$defs"][key]
        }
    }

    #[test]
    fn constrained_arguments_publish_their_values() {
        let hierarchy = input_schema("browse_concept_hierarchy");
        assert_eq!(
            property(&hierarchy, "direction")["enum"],
            json!(["descendants", "ancestors", "both"])
        );

        let primary = input_schema("define_primary_criteria");
        assert_eq!(property(&primary, "occurrence_type")["enum"], json!(["First", "All"]));
        assert_eq!(
            property(&primary, "domain")["enum"],
            json!(["Condition", "Drug", "Procedure", "Measurement", "Observation", "Device"])
        );

        let rule = input_schema("add_inclusion_rule");
        assert_eq!(property(&rule, "criteria_type")["enum"], property(&primary, "domain")["enum"]);

        let from_search = input_schema("create_concept_set_from_search");
        assert_eq!(
            property(&from_search, "failure_policy")["enum"],
            json!(["best_effort", "fail_fast"])
        );
    }

    #[test]
    fn defaulted_arguments_publish_their_defaults() {
        let search = input_schema("search_concepts");
        assert_eq!(search["properties"]["limit"]["default"], json!(20));
        assert_eq!(search["properties"]["standard_only"]["default"], json!(true));
        assert_eq!(search["properties"]["include_invalid"]["default"], json!(false));

        let hierarchy = input_schema("browse_concept_hierarchy");
        assert_eq!(hierarchy["properties"]["direction"]["default"], json!("descendants"));
        assert_eq!(hierarchy["properties"]["max_levels"]["default"], json!(2));

        let from_search = input_schema("create_concept_set_from_search");
        assert_eq!(from_search["properties"]["max_concepts_per_query"]["default"], json!(10));
        assert_eq!(from_search["properties"]["include_descendants"]["default"], json!(true));
        assert_eq!(from_search["properties"]["include_mapped"]["default"], json!(false));

        let primary = input_schema("define_primary_criteria");
        assert_eq!(primary["properties"]["occurrence_type"]["default"], json!("First"));
        assert_eq!(primary["properties"]["observation_window_prior"]["default"], json!(0));
        assert_eq!(primary["properties"]["observation_window_post"]["default"], json!(0));

        let rule = input_schema("add_inclusion_rule");
        assert_eq!(rule["properties"]["occurrence_count"]["default"], json!(1));

        assert_eq!(input_schema("monitor_job_progress")["properties"]["check_interval"]["default"], json!(30));
        assert_eq!(input_schema("list_recent_jobs")["properties"]["limit"]["default"], json!(20));
        assert_eq!(input_schema("list_cohorts")["properties"]["limit"]["default"], json!(20));

        let required = primary["required"].as_array().cloned().unwrap_or_default();
        assert!(!required.contains(&json!("occurrence_type")));
    }

    #[test]
    fn inclusion_rule_description_explains_window_signs() {
        let server = WebApiMcp::new(FakeWebApi::default().control_plane());
        let tool = server
            .tool_router
            .list_all()
            .into_iter()
            .find(|tool| tool.name == "add_inclusion_rule")
            .expect("add_inclusion_rule is routed");
        let description = tool.description.unwrap_or_default();
        assert!(description.contains("Days is unsigned"));
        assert!(description.contains("Coeff carries the sign"));
    }

    #[tokio::test]
    async fn defaulted_params_reach_the_control_plane() {
        let params: tools::cohorts::PrimaryCriteriaParams =
            serde_json::from_value(json!({"concept_set_id": 7, "domain": "Drug"})).expect("params");
        let server = WebApiMcp::new(FakeWebApi::default().control_plane());
        let result = server
            .run("define_primary_criteria", helpers::arguments(&params).expect("arguments"))
            .await;

        assert_ne!(result.is_error, Some(true));
        let text = texts(&result).join("\n");
        assert!(text.contains("Occurrence Type: First"));
        assert!(text.contains("0 days prior, 0 days post"));
    }

    #[test]
    fn lowercase_occurrence_is_a_decode_error() {
        let decoded = serde_json::from_value::<tools::cohorts::PrimaryCriteriaParams>(json!({
            "concept_set_id": 7,
            "domain": "Drug",
            "occurrence_type": "first"
        }));
        assert!(decoded.is_err());
    }

    #[tokio::test]
    async fn search_results_become_one_content_item_per_block() {
        let fake = FakeWebApi::default().with_search_results(
            "metformin",
            vec![concept(1_503_297, "metformin", "Drug"), concept(2, "metformin 500 MG", "Drug")],
        );
        let server = WebApiMcp::new(fake.control_plane());
        let result = server
            .run("search_concepts", json!({"query": "metformin"}))
            .await;

        assert_ne!(result.is_error, Some(true));
        let texts = texts(&result);
        assert_eq!(texts.len(), 3);
        assert!(texts[0].starts_with("Found 2 concepts"));
    }

    #[tokio::test]
    async fn control_errors_are_tool_errors() {
        let server = WebApiMcp::new(
            FakeWebApi::default().control_plane_with(WebApiSettings::default()),
        );
        let result = server.run("list_domains", Value::Null).await;

        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            texts(&result),
            vec![
                "Error executing list_domains: Missing required setting: WEBAPI_BASE_URL environment variable is required"
                    .to_string()
            ]
        );
    }
}
