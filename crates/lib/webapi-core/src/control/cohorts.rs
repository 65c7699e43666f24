use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use webapi_models::schema::DEFAULT_OCCURRENCE_COUNT;

use crate::client::WebApi;
use crate::cohort::estimate::render_size_estimate;
use crate::cohort::{AssemblyError, InclusionRuleSpec, OccurrenceType, PrimaryCriteriaSpec, validate_expression};
use crate::text::ToolText;

use super::{ControlError, WebApiControlPlane, failure};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryCriteriaRequest {
    pub concept_set_id: i64,
    pub domain: String,
    #[serde(default)]
    pub occurrence_type: OccurrenceType,
    #[serde(default)]
    pub observation_window_prior: i64,
    #[serde(default)]
    pub observation_window_post: i64,
}

const fn default_occurrence_count() -> u32 {
    DEFAULT_OCCURRENCE_COUNT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InclusionRuleRequest {
    pub name: String,
    pub criteria_type: String,
    pub concept_set_id: i64,
    #[serde(default)]
    pub start_window_start: Option<i32>,
    #[serde(default)]
    pub start_window_end: Option<i32>,
    #[serde(default)]
    pub end_window_start: Option<i32>,
    #[serde(default)]
    pub end_window_end: Option<i32>,
    #[serde(default = "default_occurrence_count")]
    pub occurrence_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateCohortRequest {
    pub cohort_definition: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateCohortSizeRequest {
    pub cohort_definition: Value,
    #[serde(default)]
    pub source_key: Option<String>,
}

/// Unsupported labels read as plain guidance; everything else as a failure.
fn assembly_failure(doing: &str, err: &AssemblyError) -> ToolText {
    match err {
        AssemblyError::UnsupportedDomain(_) | AssemblyError::UnsupportedCriteriaType(_) => {
            ToolText::single(err.to_string())
        }
        _ => failure(doing, err),
    }
}

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("<unserializable: {err}>"))
}

/// Assembles the primary-criteria block that defines index events.
#[must_use]
pub fn define_primary_criteria(request: &PrimaryCriteriaRequest) -> ToolText {
    let spec = match PrimaryCriteriaSpec::new(
        request.concept_set_id,
        &request.domain,
        request.occurrence_type,
        request.observation_window_prior,
        request.observation_window_post,
    ) {
        Ok(spec) => spec,
        Err(err) => return assembly_failure("defining primary criteria", &err),
    };
    let criteria_type = spec.criteria_type;

    ToolText::single(format!(
        "Primary Criteria Definition:\n\n\
         Domain: {} ({criteria_type})\n\
         Concept Set ID: {}\n\
         Occurrence Type: {}\n\
         Observation Window: {} days prior, {} days post\n\n\
         Primary Criteria JSON:\n{}\n\n\
         This defines the index event for your cohort. Subjects will enter the cohort when they have a \
         {} record matching the concepts in concept set {}.\n",
        request.domain.trim(),
        spec.concept_set_id,
        spec.occurrence,
        spec.prior_days,
        spec.post_days,
        pretty(&spec.build()),
        criteria_type.as_str().to_lowercase(),
        spec.concept_set_id,
    ))
}

/// Assembles a single-criteria inclusion rule.
#[must_use]
pub fn add_inclusion_rule(request: &InclusionRuleRequest) -> ToolText {
    let spec = match InclusionRuleSpec::new(
        request.name.clone(),
        &request.criteria_type,
        request.concept_set_id,
        request.occurrence_count,
    ) {
        Ok(spec) => spec
            .with_start_window(request.start_window_start, request.start_window_end)
            .with_end_window(request.end_window_start, request.end_window_end),
        Err(err) => return assembly_failure("creating inclusion rule", &err),
    };

    let mut text = format!(
        "Inclusion Rule '{}':\n\nCriteria: {} matching concept set {}\nOccurrence count: {}\n",
        spec.name, spec.criteria_type, spec.concept_set_id, spec.occurrence_count
    );
    for (label, window) in [("Start", spec.start_window), ("End", spec.end_window)] {
        if let Some(window) = window {
            let _ = writeln!(
                text,
                "{label} window: {} to {} days relative to index",
                window.start.offset(),
                window.end.offset()
            );
        }
    }
    let _ = write!(text, "\nInclusion Rule JSON:\n{}", pretty(&spec.build()));

    ToolText::single(text)
}

/// Checks a cohort expression against the schema, then for semantic issues.
#[must_use]
pub fn validate_cohort_definition(request: &ValidateCohortRequest) -> ToolText {
    ToolText::single(match validate_expression(&request.cohort_definition) {
        Ok(report) => report.to_string(),
        Err(err) => format!(
            "Validation failed with error: {err}\n\nThis may indicate invalid cohort definition structure."
        ),
    })
}

impl<C: WebApi> WebApiControlPlane<C> {
    /// Static size guidance for a definition on a data source.
    ///
    /// # Errors
    /// Returns `ControlError::MissingSetting` when no base URL or source key is available.
    pub fn estimate_cohort_size(&self, request: &EstimateCohortSizeRequest) -> Result<ToolText, ControlError> {
        let settings = self.settings();
        settings.require_base_url()?;
        let source_key = settings.resolve_source_key(request.source_key.as_deref())?;
        Ok(ToolText::single(render_size_estimate(
            source_key,
            &request.cohort_definition,
        )))
    }
}
