//! Name-based entry point shared by the generic tool route and tests.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::info;

use crate::client::WebApi;
use crate::text::ToolText;

use super::cohorts::{add_inclusion_rule, define_primary_criteria, validate_cohort_definition};
use super::persistence::compare_cohorts;
use super::{ControlError, WebApiControlPlane};

/// Every tool the control plane answers to, in catalogue order.
pub const TOOL_NAMES: &[&str] = &[
    "search_concepts",
    "get_concept_details",
    "browse_concept_hierarchy",
    "list_domains",
    "list_vocabularies",
    "create_concept_set",
    "create_concept_set_from_search",
    "list_concept_sets",
    "get_concept_set_details",
    "define_primary_criteria",
    "add_inclusion_rule",
    "validate_cohort_definition",
    "estimate_cohort_size",
    "save_cohort_definition",
    "load_existing_cohort",
    "list_cohorts",
    "compare_cohorts",
    "clone_cohort",
    "get_job_status",
    "list_recent_jobs",
    "cancel_job",
    "monitor_job_progress",
    "list_data_sources",
    "get_source_details",
    "get_default_source",
    "get_webapi_info",
    "get_webapi_version",
    "check_webapi_health",
];

fn decode<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ControlError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|err| ControlError::InvalidInput(format!("invalid arguments for {tool}: {err}")))
}

impl<C: WebApi> WebApiControlPlane<C> {
    /// Runs a tool by name with a JSON arguments object; `null` means no arguments.
    ///
    /// # Errors
    /// Returns `ControlError::UnknownTool` for names outside `TOOL_NAMES`,
    /// `ControlError::InvalidInput` when the arguments do not decode, and
    /// whatever the tool itself returns.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolText, ControlError> {
        info!(tool = name, "tool call");
        match name {
            "search_concepts" => self.search_concepts(decode(name, arguments)?).await,
            "get_concept_details" => self.get_concept_details(decode(name, arguments)?).await,
            "browse_concept_hierarchy" => self.browse_concept_hierarchy(decode(name, arguments)?).await,
            "list_domains" => self.list_domains().await,
            "list_vocabularies" => self.list_vocabularies().await,
            "create_concept_set" => self.create_concept_set(decode(name, arguments)?).await,
            "create_concept_set_from_search" => {
                self.create_concept_set_from_search(decode(name, arguments)?).await
            }
            "list_concept_sets" => self.list_concept_sets().await,
            "get_concept_set_details" => self.get_concept_set_details(decode(name, arguments)?).await,
            "define_primary_criteria" => Ok(define_primary_criteria(&decode(name, arguments)?)),
            "add_inclusion_rule" => Ok(add_inclusion_rule(&decode(name, arguments)?)),
            "validate_cohort_definition" => Ok(validate_cohort_definition(&decode(name, arguments)?)),
            "estimate_cohort_size" => self.estimate_cohort_size(&decode(name, arguments)?),
            "save_cohort_definition" => self.save_cohort_definition(decode(name, arguments)?).await,
            "load_existing_cohort" => self.load_existing_cohort(decode(name, arguments)?).await,
            "list_cohorts" => self.list_cohorts(decode(name, arguments)?).await,
            "compare_cohorts" => Ok(compare_cohorts(&decode(name, arguments)?)),
            "clone_cohort" => self.clone_cohort(decode(name, arguments)?).await,
            "get_job_status" => self.get_job_status(decode(name, arguments)?).await,
            "list_recent_jobs" => self.list_recent_jobs(decode(name, arguments)?).await,
            "cancel_job" => self.cancel_job(decode(name, arguments)?).await,
            "monitor_job_progress" => self.monitor_job_progress(decode(name, arguments)?).await,
            "list_data_sources" => self.list_data_sources().await,
            "get_source_details" => self.get_source_details(decode(name, arguments)?).await,
            "get_default_source" => self.get_default_source().await,
            "get_webapi_info" => self.get_webapi_info().await,
            "get_webapi_version" => self.get_webapi_version().await,
            "check_webapi_health" => self.check_webapi_health().await,
            other => Err(ControlError::UnknownTool(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeWebApi, cohort, concept};
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn catalogue_names_are_unique() {
        let unique: HashSet<_> = TOOL_NAMES.iter().collect();
        assert_eq!(unique.len(), TOOL_NAMES.len());
        assert_eq!(TOOL_NAMES.len(), 28);
    }

    #[tokio::test]
    async fn every_catalogued_name_is_routed() {
        let control = FakeWebApi::default().control_plane();
        for name in TOOL_NAMES {
            let result = control.dispatch(name, Value::Null).await;
            assert!(
                !matches!(result, Err(ControlError::UnknownTool(_))),
                "{name} was not routed"
            );
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_named() {
        let result = FakeWebApi::default()
            .control_plane()
            .dispatch("drop_database", json!({}))
            .await;
        assert_eq!(result, Err(ControlError::UnknownTool("drop_database".to_string())));
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid_input() {
        let result = FakeWebApi::default()
            .control_plane()
            .dispatch("get_concept_details", json!({}))
            .await;
        match result {
            Err(ControlError::InvalidInput(message)) => {
                assert!(message.starts_with("invalid arguments for get_concept_details: "));
                assert!(message.contains("concept_id"));
            }
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn arguments_reach_the_tool() {
        let fake = FakeWebApi::default()
            .with_concept(concept(201_826, "Type 2 diabetes mellitus", "Condition"))
            .with_cohort(cohort(3, "T2DM", json!({})));
        let control = fake.control_plane();

        let details = control
            .dispatch("get_concept_details", json!({"concept_id": 201_826}))
            .await
            .expect("details should run");
        assert!(details.joined().contains("Type 2 diabetes mellitus"));

        let status = control
            .dispatch("get_job_status", json!({"execution_id": 12}))
            .await
            .expect("status should run");
        assert_eq!(status.joined(), "No job found with execution ID: 12");

        let compared = control
            .dispatch(
                "compare_cohorts",
                json!({"cohort_a": {}, "cohort_b": {}, "cohort_a_name": "Left"}),
            )
            .await
            .expect("compare should run");
        assert!(compared.joined().starts_with("Cohort Comparison: Left vs Cohort B\n"));
    }
}
