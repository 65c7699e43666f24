//! Tool operations over the remote WebAPI.
//!
//! Every operation returns `ToolText`. Transport and lookup failures are
//! rendered into that text; only `ControlError` escapes an operation.

use std::{error::Error, fmt};

use serde_json::Value;
use tracing::warn;

use crate::client::WebApi;
use crate::services::{ENV_BASE_URL, WebApiConnector, WebApiSettings};
use crate::text::ToolText;

pub mod cohorts;
pub mod concept_sets;
pub mod dispatch;
pub mod info;
pub mod jobs;
pub mod persistence;
pub mod sources;
pub mod vocabulary;

pub use cohorts::{
    EstimateCohortSizeRequest,
    InclusionRuleRequest,
    PrimaryCriteriaRequest,
    ValidateCohortRequest,
};
pub use concept_sets::{
    ConceptSetDetailsRequest,
    CreateConceptSetFromSearchRequest,
    CreateConceptSetRequest,
    QueryFailurePolicy,
};
pub use dispatch::TOOL_NAMES;
pub use jobs::{CancelJobRequest, JobStatusRequest, ListJobsRequest, MonitorJobRequest};
pub use persistence::{
    CloneCohortRequest,
    CompareCohortsRequest,
    ListCohortsRequest,
    LoadCohortRequest,
    SaveCohortRequest,
};
pub use sources::SourceDetailsRequest;
pub use vocabulary::{
    BrowseHierarchyRequest,
    ConceptDetailsRequest,
    HierarchyDirection,
    SearchConceptsRequest,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// A required setting is not configured; carries the environment variable name.
    MissingSetting(&'static str),
    InvalidInput(String),
    UnknownTool(String),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) if *name == ENV_BASE_URL => write!(
                f,
                "Missing required setting: {name} environment variable is required"
            ),
            Self::MissingSetting(name) => write!(f, "{name} is required"),
            Self::InvalidInput(message) => f.write_str(message),
            Self::UnknownTool(name) => write!(f, "Unknown tool: {name}"),
        }
    }
}

impl Error for ControlError {}

pub struct WebApiControlPlane<C: WebApi> {
    connector: WebApiConnector<C>,
}

impl<C: WebApi> Clone for WebApiControlPlane<C> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
        }
    }
}

impl<C: WebApi> WebApiControlPlane<C> {
    pub const fn new(connector: WebApiConnector<C>) -> Self {
        Self { connector }
    }

    #[must_use]
    pub fn settings(&self) -> &WebApiSettings {
        self.connector.settings()
    }

    #[must_use]
    pub const fn connector(&self) -> &WebApiConnector<C> {
        &self.connector
    }
}

/// Renders a failure as `Error <doing>: <err>` and logs it.
pub(crate) fn failure(doing: &str, err: &dyn fmt::Display) -> ToolText {
    warn!(error = %err, "error {doing}");
    ToolText::single(format!("Error {doing}: {err}"))
}

pub(crate) const fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// JSON value for display: strings unquoted, everything else compact.
pub(crate) fn plain(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Trimmed optional argument, with blanks treated as absent.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ENV_SOURCE_KEY;

    #[test]
    fn missing_base_url_names_the_variable() {
        assert_eq!(
            ControlError::MissingSetting(ENV_BASE_URL).to_string(),
            "Missing required setting: WEBAPI_BASE_URL environment variable is required"
        );
        assert_eq!(
            ControlError::MissingSetting(ENV_SOURCE_KEY).to_string(),
            "WEBAPI_SOURCE_KEY is required"
        );
        assert_eq!(
            ControlError::UnknownTool("nope".to_string()).to_string(),
            "Unknown tool: nope"
        );
    }
}
