//! Constrained argument values and defaults shared by the tool parameters.
//!
//! Serde names match the control-plane requests, so a parameter struct
//! re-serialises into arguments the dispatcher decodes unchanged.

use rmcp::schemars;
use serde::{Deserialize, Serialize};
use webapi_core::control::vocabulary::DEFAULT_RESULT_LIMIT;

/// Which side of the hierarchy to walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
#[schemars(inline)]
pub enum Direction {
    #[default]
    Descendants,
    Ancestors,
    Both,
}

/// Which qualifying events become index events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[schemars(inline)]
pub enum Occurrence {
    #[default]
    First,
    All,
}

/// Clinical domain of a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[schemars(inline)]
pub enum ClinicalDomain {
    Condition,
    Drug,
    Procedure,
    Measurement,
    Observation,
    Device,
}

/// What happens to a multi-query search when one query fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
#[schemars(inline)]
pub enum FailurePolicy {
    #[default]
    BestEffort,
    FailFast,
}

pub(crate) const fn default_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

pub(crate) const fn default_max_levels() -> u32 {
    2
}

pub(crate) const fn default_max_concepts_per_query() -> usize {
    10
}

pub(crate) const fn default_occurrence_count() -> u32 {
    1
}

pub(crate) const fn default_check_interval() -> u64 {
    30
}

pub(crate) const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn choices_serialise_with_control_plane_names() {
        assert_eq!(serde_json::to_value(Direction::Both).expect("direction"), json!("both"));
        assert_eq!(serde_json::to_value(Occurrence::All).expect("occurrence"), json!("All"));
        assert_eq!(
            serde_json::to_value(ClinicalDomain::Device).expect("domain"),
            json!("Device")
        );
        assert_eq!(
            serde_json::to_value(FailurePolicy::FailFast).expect("policy"),
            json!("fail_fast")
        );
    }
}
