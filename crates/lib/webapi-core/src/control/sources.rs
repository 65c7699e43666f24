use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use webapi_models::models::{Source, SourceDaimon};

use crate::client::WebApi;
use crate::services::ENV_SOURCE_KEY;
use crate::text::ToolText;

use super::{ControlError, WebApiControlPlane, failure, plain};

const MAX_ADDITIONAL_FIELDS: usize = 10;
const OTHER_SOURCES_PREVIEW: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDetailsRequest {
    pub source_key: String,
}

fn daimon_label(daimon: &SourceDaimon) -> String {
    match daimon.table_qualifier.as_deref() {
        Some(qualifier) => format!("{} ({qualifier})", daimon.daimon_type),
        None => daimon.daimon_type.clone(),
    }
}

fn source_line(source: &Source) -> String {
    format!("  - {} (Key: {})\n", source.source_name, source.source_key)
}

/// Short name/key/dialect/CDM block used by the default-source view.
fn source_card(source: &Source) -> String {
    format!(
        "  - Name: {}\n  - Key: {}\n  - Dialect: {}\n  - CDM Version: {}\n",
        source.source_name,
        source.source_key,
        source.source_dialect.as_deref().unwrap_or("Unknown"),
        source.cdm_version.as_deref().unwrap_or("Unknown"),
    )
}

impl<C: WebApi> WebApiControlPlane<C> {
    /// Every CDM data source registered on the service.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn list_data_sources(&self) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let sources = match api.client().list_sources().await {
            Ok(sources) => sources,
            Err(err) => return Ok(failure("retrieving data sources", &err)),
        };
        if sources.is_empty() {
            return Ok(ToolText::single("No data sources found"));
        }

        let mut text = format!("Available Data Sources ({} total):\n\n", sources.len());
        for source in &sources {
            let _ = write!(text, "• {} (Key: {})", source.source_name, source.source_key);
            for (label, value) in [
                ("Dialect", source.source_dialect.as_deref()),
                ("Connection", source.source_connection.as_deref()),
                ("CDM Version", source.cdm_version.as_deref()),
                ("Vocabulary Version", source.vocabulary_version.as_deref()),
            ] {
                if let Some(value) = value.filter(|value| !value.is_empty()) {
                    let _ = write!(text, "\n  {label}: {value}");
                }
            }
            if let Some(priority) = source.priority() {
                let _ = write!(text, "\n  Priority: {priority}");
            }
            text.push_str("\n\n");
        }

        Ok(ToolText::single(text))
    }

    /// Full record of one source, looked up by exact key.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn get_source_details(&self, request: SourceDetailsRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let key = request.source_key.trim();
        let sources = match api.client().list_sources().await {
            Ok(sources) => sources,
            Err(err) => return Ok(failure("retrieving source details", &err)),
        };
        let Some(source) = sources.iter().find(|source| source.source_key == key) else {
            return Ok(ToolText::single(format!("No data source found with key: {key}")));
        };

        let mut text = format!(
            "Data Source Details for '{key}':\n\nName: {}\nKey: {}",
            source.source_name, source.source_key
        );
        let priority = source.priority().map(|priority| priority.to_string());
        for (label, value) in [
            ("Dialect", source.source_dialect.as_deref()),
            ("Connection", source.source_connection.as_deref()),
            ("CDM Version", source.cdm_version.as_deref()),
            ("Vocabulary Version", source.vocabulary_version.as_deref()),
            ("Priority", priority.as_deref()),
            ("Release Date", source.source_release_date.as_deref()),
            ("CDM Holder", source.cdm_holder.as_deref()),
            ("Description", source.source_description.as_deref()),
            ("Documentation", source.source_documentation_reference.as_deref()),
        ] {
            if let Some(value) = value.filter(|value| !value.is_empty()) {
                let _ = write!(text, "\n{label}: {value}");
            }
        }

        let mut additional = Vec::new();
        if let Some(id) = source.source_id {
            additional.push(format!("sourceId: {id}"));
        }
        if !source.daimons.is_empty() {
            let daimons: Vec<String> = source.daimons.iter().map(daimon_label).collect();
            additional.push(format!("daimons: {}", daimons.join(", ")));
        }
        additional.extend(
            source
                .extra
                .iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| format!("{key}: {}", plain(value))),
        );
        if !additional.is_empty() {
            text.push_str("\n\nAdditional Information:");
            for field in additional.iter().take(MAX_ADDITIONAL_FIELDS) {
                let _ = write!(text, "\n  - {field}");
            }
        }

        Ok(ToolText::single(text))
    }

    /// The configured default source, or the first one the service lists.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn get_default_source(&self) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let sources = match api.client().list_sources().await {
            Ok(sources) => sources,
            Err(err) => return Ok(failure("retrieving default source", &err)),
        };
        let Some(first) = sources.first() else {
            return Ok(ToolText::single("No data sources available"));
        };

        let mut text = String::from("Default Data Source Information:\n\n");
        match self.settings().source_key.as_deref() {
            Some(configured) => {
                if let Some(source) = sources.iter().find(|source| source.source_key == configured) {
                    let _ = writeln!(text, "Configured Source (from {ENV_SOURCE_KEY}):");
                    text.push_str(&source_card(source));
                } else {
                    let _ = write!(text, "⚠️  Configured source key '{configured}' not found!\n\nAvailable sources:\n");
                    for source in sources.iter().take(OTHER_SOURCES_PREVIEW) {
                        text.push_str(&source_line(source));
                    }
                }
            }
            None => {
                let _ = writeln!(text, "No {ENV_SOURCE_KEY} configured. First available source:");
                text.push_str(&source_card(first));
                let _ = writeln!(
                    text,
                    "\nTo set a default source, configure {ENV_SOURCE_KEY} environment variable."
                );
                if sources.len() > 1 {
                    let _ = writeln!(text, "\nOther available sources ({}):", sources.len() - 1);
                    for source in sources.iter().skip(1).take(OTHER_SOURCES_PREVIEW) {
                        text.push_str(&source_line(source));
                    }
                }
            }
        }

        Ok(ToolText::single(text))
    }
}
