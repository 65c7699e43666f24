use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{Concept, nullable};

pub const EXPRESSION_TYPE_SIMPLE: &str = "SIMPLE_EXPRESSION";

pub const LIMIT_FIRST: &str = "First";
pub const LIMIT_ALL: &str = "All";

pub const GROUP_ALL: &str = "ALL";

/// Occurrence count assumed by the cohort engine when a criteria omits `Occurrence`.
pub const DEFAULT_OCCURRENCE_COUNT: u32 = 1;

/// Concept-set size above which validation warns.
pub const LARGE_CONCEPT_SET: usize = 100;

/// Prior-observation window above which validation warns.
pub const LONG_PRIOR_OBSERVATION_DAYS: u32 = 365;

/// A full cohort expression.
///
/// Only the sections the assembler and validator reason about are typed; the
/// remaining sections pass through untouched as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CohortExpression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdm_version_range: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub concept_sets: Vec<ConceptSet>,
    #[serde(default)]
    pub primary_criteria: Option<PrimaryCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_criteria: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_limit: Option<ResultLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_limit: Option<ResultLimit>,
    #[serde(default, deserialize_with = "nullable")]
    pub inclusion_rules: Vec<InclusionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_strategy: Option<Value>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub censoring_criteria: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_settings: Option<CollapseSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub censor_window: Option<Value>,
}

impl CohortExpression {
    #[must_use]
    pub fn total_concepts(&self) -> usize {
        self.concept_sets.iter().map(ConceptSet::len).sum()
    }
}

/// Named concept set as embedded in a cohort expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptSet {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub expression: Option<ConceptSetExpression>,
}

impl ConceptSet {
    /// Concept set ready to embed; the cohort editor assigns the final id.
    #[must_use]
    pub fn new(name: impl Into<String>, expression: ConceptSetExpression) -> Self {
        Self {
            id: 0,
            name: name.into(),
            expression: Some(expression),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.expression.as_ref().map_or(0, ConceptSetExpression::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptSetExpression {
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<ConceptSetItem>,
}

impl ConceptSetExpression {
    /// Collects items, keeping the first item seen for each concept id.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = ConceptSetItem>) -> Self {
        let mut expression = Self::default();
        for item in items {
            expression.push(item);
        }
        expression
    }

    /// Appends an item unless its concept id is already present.
    pub fn push(&mut self, item: ConceptSetItem) -> bool {
        if self.contains(item.concept.concept_id) {
            return false;
        }
        self.items.push(item);
        true
    }

    #[must_use]
    pub fn contains(&self, concept_id: i64) -> bool {
        self.items
            .iter()
            .any(|item| item.concept.concept_id == concept_id)
    }

    #[must_use]
    pub fn concept_ids(&self) -> Vec<i64> {
        self.items.iter().map(|item| item.concept.concept_id).collect()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct concept ids, which differs from `len` only for hand-written input.
    #[must_use]
    pub fn distinct_len(&self) -> usize {
        self.items
            .iter()
            .map(|item| item.concept.concept_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// One concept in a concept set with its inclusion flags.
///
/// The three flags are independent of each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptSetItem {
    pub concept: Concept,
    #[serde(default)]
    pub is_excluded: bool,
    #[serde(default)]
    pub include_descendants: bool,
    #[serde(default)]
    pub include_mapped: bool,
}

impl ConceptSetItem {
    #[must_use]
    pub const fn new(concept: Concept) -> Self {
        Self {
            concept,
            is_excluded: false,
            include_descendants: false,
            include_mapped: false,
        }
    }

    #[must_use]
    pub const fn with_descendants(mut self, include_descendants: bool) -> Self {
        self.include_descendants = include_descendants;
        self
    }

    #[must_use]
    pub const fn with_mapped(mut self, include_mapped: bool) -> Self {
        self.include_mapped = include_mapped;
        self
    }

    #[must_use]
    pub const fn excluded(mut self, is_excluded: bool) -> Self {
        self.is_excluded = is_excluded;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrimaryCriteria {
    #[serde(default, deserialize_with = "nullable")]
    pub criteria_list: Vec<Map<String, Value>>,
    #[serde(default)]
    pub observation_window: Option<ObservationWindow>,
    #[serde(default)]
    pub primary_criteria_limit: Option<ResultLimit>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObservationWindow {
    #[serde(default)]
    pub prior_days: u32,
    #[serde(default)]
    pub post_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLimit {
    #[serde(rename = "Type", default = "default_limit_type")]
    pub limit_type: String,
}

impl ResultLimit {
    #[must_use]
    pub fn new(limit_type: impl Into<String>) -> Self {
        Self {
            limit_type: limit_type.into(),
        }
    }
}

fn default_limit_type() -> String {
    LIMIT_FIRST.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollapseSettings {
    #[serde(default = "default_collapse_type")]
    pub collapse_type: String,
    #[serde(default)]
    pub era_pad: i64,
}

fn default_collapse_type() -> String {
    "ERA".to_string()
}

/// Named inclusion rule. `expression` is a criteria group, kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InclusionRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub expression: Option<Value>,
}

/// Boolean criteria group; only the single-criteria `ALL` shape is assembled locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CriteriaGroup {
    #[serde(rename = "Type")]
    pub group_type: String,
    #[serde(default)]
    pub criteria_list: Vec<Map<String, Value>>,
    #[serde(default)]
    pub demographic_criteria_list: Vec<Value>,
    #[serde(default)]
    pub groups: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_window: Option<Window>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_window: Option<Window>,
}

impl CriteriaGroup {
    #[must_use]
    pub fn all(criteria: Map<String, Value>) -> Self {
        Self {
            group_type: GROUP_ALL.to_string(),
            criteria_list: vec![criteria],
            demographic_criteria_list: Vec::new(),
            groups: Vec::new(),
            start_window: None,
            end_window: None,
        }
    }
}

/// Day-offset window relative to the index event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Window {
    pub start: WindowEndpoint,
    pub end: WindowEndpoint,
    #[serde(default)]
    pub use_index_end: bool,
    #[serde(default)]
    pub use_event_end: bool,
}

impl Window {
    /// Builds a window from signed offsets; `None` when both bounds are unset.
    /// An unset bound becomes day zero.
    #[must_use]
    pub fn from_offsets(start: Option<i32>, end: Option<i32>) -> Option<Self> {
        if start.is_none() && end.is_none() {
            return None;
        }
        Some(Self {
            start: WindowEndpoint::from_offset(start.unwrap_or(0)),
            end: WindowEndpoint::from_offset(end.unwrap_or(0)),
            use_index_end: false,
            use_event_end: false,
        })
    }
}

/// `Days` carries the magnitude and `Coeff` the direction (-1 before, 1 after).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WindowEndpoint {
    pub days: u32,
    pub coeff: i8,
}

impl WindowEndpoint {
    #[must_use]
    pub const fn from_offset(offset: i32) -> Self {
        Self {
            days: offset.unsigned_abs(),
            coeff: if offset < 0 { -1 } else { 1 },
        }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.days) * i64::from(self.coeff)
    }
}
