use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use webapi_models::schema::{
    CriteriaGroup,
    DEFAULT_OCCURRENCE_COUNT,
    InclusionRule,
    LIMIT_ALL,
    LIMIT_FIRST,
    ObservationWindow,
    PrimaryCriteria,
    ResultLimit,
    Window,
};

/// Criteria types a concept set can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriteriaType {
    ConditionOccurrence,
    DrugExposure,
    ProcedureOccurrence,
    Measurement,
    Observation,
    DeviceExposure,
}

/// Accepted labels, in the order they are reported back to callers.
const LABELS: &[(&str, CriteriaType)] = &[
    ("ConditionOccurrence", CriteriaType::ConditionOccurrence),
    ("Condition", CriteriaType::ConditionOccurrence),
    ("DrugExposure", CriteriaType::DrugExposure),
    ("Drug", CriteriaType::DrugExposure),
    ("ProcedureOccurrence", CriteriaType::ProcedureOccurrence),
    ("Procedure", CriteriaType::ProcedureOccurrence),
    ("Measurement", CriteriaType::Measurement),
    ("Observation", CriteriaType::Observation),
    ("DeviceExposure", CriteriaType::DeviceExposure),
    ("Device", CriteriaType::DeviceExposure),
];

impl CriteriaType {
    pub const ALL: [Self; 6] = [
        Self::ConditionOccurrence,
        Self::DrugExposure,
        Self::ProcedureOccurrence,
        Self::Measurement,
        Self::Observation,
        Self::DeviceExposure,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConditionOccurrence => "ConditionOccurrence",
            Self::DrugExposure => "DrugExposure",
            Self::ProcedureOccurrence => "ProcedureOccurrence",
            Self::Measurement => "Measurement",
            Self::Observation => "Observation",
            Self::DeviceExposure => "DeviceExposure",
        }
    }

    /// Resolves a domain label or criteria-type name.
    #[must_use]
    pub fn resolve(label: &str) -> Option<Self> {
        let label = label.trim();
        LABELS
            .iter()
            .find(|(candidate, _)| *candidate == label)
            .map(|(_, criteria_type)| *criteria_type)
    }

    #[must_use]
    pub fn supported_labels() -> String {
        LABELS
            .iter()
            .map(|(label, _)| *label)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Single criteria keyed by this type and bound to a concept set.
    #[must_use]
    pub fn criteria(self, codeset_id: i64) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("CodesetId".to_string(), Value::from(codeset_id));
        body.insert(format!("{}TypeExclude", self.as_str()), Value::Bool(false));
        let mut criteria = Map::new();
        criteria.insert(self.as_str().to_string(), Value::Object(body));
        criteria
    }
}

impl fmt::Display for CriteriaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which qualifying events become index events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccurrenceType {
    #[default]
    First,
    All,
}

impl OccurrenceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => LIMIT_FIRST,
            Self::All => LIMIT_ALL,
        }
    }
}

impl fmt::Display for OccurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    UnsupportedDomain(String),
    UnsupportedCriteriaType(String),
    NegativeObservationWindow { prior: i64, post: i64 },
    ObservationWindowTooLarge { prior: i64, post: i64 },
    ZeroOccurrenceCount,
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDomain(domain) => write!(
                f,
                "Unsupported domain: {domain}. Supported domains: {}",
                CriteriaType::supported_labels()
            ),
            Self::UnsupportedCriteriaType(criteria_type) => write!(
                f,
                "Unsupported criteria type: {criteria_type}. Supported criteria types: {}",
                CriteriaType::supported_labels()
            ),
            Self::NegativeObservationWindow { prior, post } => write!(
                f,
                "observation window days must be non-negative (got {prior} prior, {post} post)"
            ),
            Self::ObservationWindowTooLarge { prior, post } => write!(
                f,
                "observation window days are out of range (got {prior} prior, {post} post)"
            ),
            Self::ZeroOccurrenceCount => f.write_str("occurrence_count must be at least 1"),
        }
    }
}

impl Error for AssemblyError {}

/// Validated inputs for a primary-criteria block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryCriteriaSpec {
    pub concept_set_id: i64,
    pub criteria_type: CriteriaType,
    pub occurrence: OccurrenceType,
    pub prior_days: u32,
    pub post_days: u32,
}

impl PrimaryCriteriaSpec {
    /// Resolves the domain label and checks the observation window.
    ///
    /// # Errors
    /// Returns `AssemblyError` for an unknown domain or a negative window.
    pub fn new(
        concept_set_id: i64,
        domain: &str,
        occurrence: OccurrenceType,
        prior_days: i64,
        post_days: i64,
    ) -> Result<Self, AssemblyError> {
        let criteria_type = CriteriaType::resolve(domain)
            .ok_or_else(|| AssemblyError::UnsupportedDomain(domain.to_string()))?;
        if prior_days < 0 || post_days < 0 {
            return Err(AssemblyError::NegativeObservationWindow {
                prior: prior_days,
                post: post_days,
            });
        }
        let (Ok(prior), Ok(post)) = (u32::try_from(prior_days), u32::try_from(post_days)) else {
            return Err(AssemblyError::ObservationWindowTooLarge {
                prior: prior_days,
                post: post_days,
            });
        };
        Ok(Self {
            concept_set_id,
            criteria_type,
            occurrence,
            prior_days: prior,
            post_days: post,
        })
    }

    #[must_use]
    pub fn build(&self) -> PrimaryCriteria {
        PrimaryCriteria {
            criteria_list: vec![self.criteria_type.criteria(self.concept_set_id)],
            observation_window: Some(ObservationWindow {
                prior_days: self.prior_days,
                post_days: self.post_days,
            }),
            primary_criteria_limit: Some(ResultLimit::new(self.occurrence.as_str())),
        }
    }
}

/// Validated inputs for a single-criteria inclusion rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionRuleSpec {
    pub name: String,
    pub criteria_type: CriteriaType,
    pub concept_set_id: i64,
    pub start_window: Option<Window>,
    pub end_window: Option<Window>,
    pub occurrence_count: u32,
}

impl InclusionRuleSpec {
    /// Resolves the criteria type and checks the occurrence count.
    ///
    /// # Errors
    /// Returns `AssemblyError` for an unknown criteria type or a zero count.
    pub fn new(
        name: impl Into<String>,
        criteria_type: &str,
        concept_set_id: i64,
        occurrence_count: u32,
    ) -> Result<Self, AssemblyError> {
        let resolved = CriteriaType::resolve(criteria_type)
            .ok_or_else(|| AssemblyError::UnsupportedCriteriaType(criteria_type.to_string()))?;
        if occurrence_count == 0 {
            return Err(AssemblyError::ZeroOccurrenceCount);
        }
        Ok(Self {
            name: name.into(),
            criteria_type: resolved,
            concept_set_id,
            start_window: None,
            end_window: None,
            occurrence_count,
        })
    }

    #[must_use]
    pub fn with_start_window(mut self, start: Option<i32>, end: Option<i32>) -> Self {
        self.start_window = Window::from_offsets(start, end);
        self
    }

    #[must_use]
    pub fn with_end_window(mut self, start: Option<i32>, end: Option<i32>) -> Self {
        self.end_window = Window::from_offsets(start, end);
        self
    }

    #[must_use]
    pub fn build(&self) -> InclusionRule {
        let mut criteria = self.criteria_type.criteria(self.concept_set_id);
        // The cohort engine assumes the default count when the key is absent.
        if self.occurrence_count > DEFAULT_OCCURRENCE_COUNT
            && let Some(Value::Object(body)) = criteria.get_mut(self.criteria_type.as_str())
        {
            body.insert(
                "OccurrenceCount".to_string(),
                Value::from(self.occurrence_count),
            );
        }

        let mut group = CriteriaGroup::all(criteria);
        group.start_window = self.start_window;
        group.end_window = self.end_window;

        InclusionRule {
            name: Some(self.name.clone()),
            description: None,
            expression: serde_json::to_value(group).ok(),
        }
    }
}
