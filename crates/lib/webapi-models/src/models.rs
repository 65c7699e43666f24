use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserializes `null` as the type's default value.
///
/// # Errors
/// Returns the underlying deserializer error for values of the wrong shape.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Timestamp as returned by the remote service: epoch milliseconds or a preformatted string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Timestamp {
    #[must_use]
    pub const fn as_millis(&self) -> Option<i64> {
        match self {
            Self::Millis(millis) => Some(*millis),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(millis) => match DateTime::from_timestamp_millis(*millis) {
                Some(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => write!(f, "{millis}"),
            },
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Renders an optional timestamp, falling back to `Unknown`.
#[must_use]
pub fn display_timestamp(value: Option<&Timestamp>) -> String {
    value.map_or_else(|| "Unknown".to_string(), ToString::to_string)
}

/// Vocabulary concept as returned by the vocabulary endpoints.
///
/// The same upper-case field layout is embedded verbatim in concept-set expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Concept {
    pub concept_id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub concept_name: String,
    #[serde(default)]
    pub standard_concept: Option<String>,
    #[serde(default)]
    pub concept_code: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub domain_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub vocabulary_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub concept_class_id: String,
    #[serde(default)]
    pub invalid_reason: Option<String>,
}

impl Concept {
    #[must_use]
    pub fn is_standard(&self) -> bool {
        self.standard_concept.as_deref() == Some("S")
    }

    /// Returns the invalid-reason code, treating blank and `V` (valid) as none.
    #[must_use]
    pub fn invalid_reason_code(&self) -> Option<&str> {
        self.invalid_reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty() && *reason != "V")
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.invalid_reason_code().is_none()
    }

    #[must_use]
    pub fn code(&self) -> &str {
        self.concept_code.as_deref().unwrap_or("")
    }
}

/// Relationship annotation attached to related/descendant concepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConceptRelationship {
    #[serde(default, deserialize_with = "nullable")]
    pub relationship_name: String,
    #[serde(default)]
    pub relationship_distance: Option<u32>,
}

/// Concept returned by the related/descendant endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedConcept {
    #[serde(flatten)]
    pub concept: Concept,
    #[serde(rename = "RELATIONSHIPS", default, deserialize_with = "nullable")]
    pub relationships: Vec<ConceptRelationship>,
}

impl RelatedConcept {
    /// Smallest hierarchy distance across the attached relationships.
    #[must_use]
    pub fn distance(&self) -> Option<u32> {
        self.relationships
            .iter()
            .filter_map(|relationship| relationship.relationship_distance)
            .min()
    }

    #[must_use]
    pub fn has_relationship_containing(&self, fragment: &str) -> bool {
        let fragment = fragment.to_ascii_lowercase();
        self.relationships.iter().any(|relationship| {
            relationship
                .relationship_name
                .to_ascii_lowercase()
                .contains(&fragment)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(rename = "DOMAIN_ID", alias = "domainId")]
    pub domain_id: String,
    #[serde(rename = "DOMAIN_NAME", alias = "domainName", default)]
    pub domain_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(rename = "VOCABULARY_ID", alias = "vocabularyId")]
    pub vocabulary_id: String,
    #[serde(rename = "VOCABULARY_NAME", alias = "vocabularyName", default)]
    pub vocabulary_name: Option<String>,
    #[serde(rename = "VOCABULARY_VERSION", alias = "vocabularyVersion", default)]
    pub vocabulary_version: Option<String>,
}

impl Vocabulary {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.vocabulary_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.vocabulary_id)
    }
}

/// Body of the vocabulary search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConceptSearch {
    pub query: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain_id: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vocabulary_id: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub concept_class_id: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_concept: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// Maximum number of concepts kept from the response.
    #[serde(skip)]
    pub page_size: usize,
}

impl ConceptSearch {
    #[must_use]
    pub fn new(query: impl Into<String>, page_size: usize) -> Self {
        Self {
            query: query.into(),
            domain_id: Vec::new(),
            vocabulary_id: Vec::new(),
            concept_class_id: Vec::new(),
            standard_concept: None,
            invalid_reason: None,
            page_size,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Option<&str>) -> Self {
        self.domain_id = non_blank(domain).into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Option<&str>) -> Self {
        self.vocabulary_id = non_blank(vocabulary).into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_concept_class(mut self, concept_class: Option<&str>) -> Self {
        self.concept_class_id = non_blank(concept_class).into_iter().collect();
        self
    }

    #[must_use]
    pub fn standard_only(mut self, standard_only: bool) -> Self {
        self.standard_concept = standard_only.then(|| "S".to_string());
        self
    }

    /// Restricts results to valid concepts unless invalid ones are requested.
    #[must_use]
    pub fn include_invalid(mut self, include_invalid: bool) -> Self {
        self.invalid_reason = (!include_invalid).then(|| "V".to_string());
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Concept-set header as listed by the concept-set endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptSetSummary {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_date: Option<Timestamp>,
    #[serde(default)]
    pub modified_date: Option<Timestamp>,
}

/// Cohort definition record. `expression` is always a JSON value here, even when
/// the service delivers it as an encoded string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortDefinition {
    pub id: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expression_type: Option<String>,
    #[serde(default, deserialize_with = "expression_value")]
    pub expression: Option<Value>,
    #[serde(default)]
    pub created_date: Option<Timestamp>,
    #[serde(default)]
    pub modified_date: Option<Timestamp>,
}

fn expression_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(encoded)) if encoded.trim().is_empty() => Ok(None),
        Some(Value::String(encoded)) => serde_json::from_str(&encoded)
            .map(Some)
            .map_err(D::Error::custom),
        Some(value) => Ok(Some(value)),
    }
}

/// Payload for creating a cohort definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortDefinitionDraft {
    pub name: String,
    pub description: String,
    pub expression_type: String,
    pub expression: Value,
}

impl CohortDefinitionDraft {
    /// Wraps an expression in the fixed envelope used for simple expressions.
    #[must_use]
    pub fn simple(name: impl Into<String>, description: impl Into<String>, expression: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            expression_type: crate::schema::EXPRESSION_TYPE_SIMPLE.to_string(),
            expression,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDaimon {
    #[serde(default, deserialize_with = "nullable")]
    pub daimon_type: String,
    #[serde(default)]
    pub table_qualifier: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// CDM data source registered with the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default)]
    pub source_id: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub source_name: String,
    pub source_key: String,
    #[serde(default)]
    pub source_dialect: Option<String>,
    #[serde(default)]
    pub source_connection: Option<String>,
    #[serde(default)]
    pub cdm_version: Option<String>,
    #[serde(default)]
    pub vocabulary_version: Option<String>,
    #[serde(default)]
    pub source_release_date: Option<String>,
    #[serde(default)]
    pub cdm_holder: Option<String>,
    #[serde(default)]
    pub source_description: Option<String>,
    #[serde(default)]
    pub source_documentation_reference: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub daimons: Vec<SourceDaimon>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Source {
    /// Highest daimon priority, if any daimon reports one.
    #[must_use]
    pub fn priority(&self) -> Option<i64> {
        self.daimons.iter().filter_map(|daimon| daimon.priority).max()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitStatus {
    #[serde(default)]
    pub exit_code: Option<String>,
    #[serde(default)]
    pub exit_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInstance {
    #[serde(default)]
    pub instance_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

const TERMINAL_JOB_STATUSES: &[&str] = &["COMPLETED", "FAILED", "CANCELED", "STOPPED", "ABANDONED"];
const ACTIVE_JOB_STATUSES: &[&str] = &["RUNNING", "PENDING", "STARTING", "STARTED", "STOPPING"];

/// Batch job execution as reported by the job endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecution {
    #[serde(default, alias = "id")]
    pub execution_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_date: Option<Timestamp>,
    #[serde(default)]
    pub end_date: Option<Timestamp>,
    #[serde(default)]
    pub exit_status: Option<ExitStatus>,
    #[serde(default, alias = "jobInstance")]
    pub job_instance_resource_object: Option<JobInstance>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl JobExecution {
    #[must_use]
    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or("Unknown")
    }

    #[must_use]
    pub fn job_name(&self) -> Option<&str> {
        self.job_instance_resource_object
            .as_ref()
            .and_then(|instance| instance.name.as_deref())
    }

    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        if !self.status_is(&["FAILED"]) {
            return None;
        }
        self.exit_status
            .as_ref()
            .and_then(|exit| exit.exit_description.as_deref())
            .filter(|description| !description.trim().is_empty())
    }

    /// Wall-clock duration when both endpoints are known as epoch milliseconds.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        let start = self.start_date.as_ref()?.as_millis()?;
        let end = self.end_date.as_ref()?.as_millis()?;
        (end >= start).then(|| chrono::Duration::milliseconds(end - start))
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status_is(TERMINAL_JOB_STATUSES)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status_is(ACTIVE_JOB_STATUSES)
    }

    fn status_is(&self, statuses: &[&str]) -> bool {
        self.status.as_deref().is_some_and(|status| {
            statuses
                .iter()
                .any(|candidate| status.eq_ignore_ascii_case(candidate))
        })
    }
}

/// Renders a duration as `1h 2m 3s`, dropping leading zero units.
#[must_use]
pub fn format_duration(duration: chrono::Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Job listing responses come either as a bare array or as a page wrapper.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JobExecutionPage {
    Page { content: Vec<JobExecution> },
    List(Vec<JobExecution>),
}

impl JobExecutionPage {
    #[must_use]
    pub fn into_vec(self) -> Vec<JobExecution> {
        match self {
            Self::Page { content } => content,
            Self::List(executions) => executions,
        }
    }
}

/// Result of a job cancellation request, when the service returns one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCancellation {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Service version and build information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebApiInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build_info: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
