use std::fmt::Write as _;

use tracing::warn;

use crate::client::WebApi;
use crate::text::ToolText;

use super::{ControlError, WebApiControlPlane, failure, plain};

impl<C: WebApi> WebApiControlPlane<C> {
    /// Version, build, and any other fields reported by the `info` endpoint.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn get_webapi_info(&self) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let info = match api.client().info().await {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(ToolText::single("No WebAPI information available")),
            Err(err) => return Ok(failure("retrieving WebAPI info", &err)),
        };

        let mut text = format!("WebAPI System Information:\n\nBase URL: {}", api.base_url());
        if let Some(version) = &info.version {
            let _ = write!(text, "\nVersion: {version}");
        }
        if let Some(build) = info.build_info.as_ref().filter(|build| !build.is_null()) {
            let _ = write!(text, "\nBuild Info: {}", plain(build));
        }
        if !info.extra.is_empty() {
            text.push_str("\n\nAdditional Information:");
            for (key, value) in &info.extra {
                let _ = write!(text, "\n  - {key}: {}", plain(value));
            }
        }

        Ok(ToolText::single(text))
    }

    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn get_webapi_version(&self) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let version = match api.client().info().await {
            Ok(info) => info
                .and_then(|info| info.version)
                .unwrap_or_else(|| "Unknown".to_string()),
            Err(err) => return Ok(failure("retrieving WebAPI version", &err)),
        };
        Ok(ToolText::single(format!(
            "WebAPI Version Information:\n\nBase URL: {}\nVersion: {version}",
            api.base_url()
        )))
    }

    /// Connectivity probe; an unreachable service is a FAILED report, not an error.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn check_webapi_health(&self) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let base_url = api.base_url();
        let text = match api.client().info().await {
            Ok(Some(info)) => {
                let mut text = format!(
                    "WebAPI Health Check: ✅ HEALTHY\n\nBase URL: {base_url}\n\
                     Status: Connected successfully\nResponse: Received valid info response"
                );
                if let Some(version) = &info.version {
                    let _ = write!(text, "\nVersion: {version}");
                }
                text
            }
            Ok(None) => format!(
                "WebAPI Health Check: ⚠️  WARNING\n\nBase URL: {base_url}\n\
                 Status: Connected but no info returned\nResponse: Empty or invalid response"
            ),
            Err(err) => {
                warn!(error = %err, base_url, "health check failed");
                format!(
                    "WebAPI Health Check: ❌ FAILED\n\nBase URL: {base_url}\n\
                     Status: Connection failed\nError: {err}\n\n\
                     Please check:\n\
                     \x20 - WebAPI URL is correct and accessible\n\
                     \x20 - WebAPI service is running\n\
                     \x20 - Network connectivity\n\
                     \x20 - Authentication if required"
                )
            }
        };
        Ok(ToolText::single(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ENV_BASE_URL, WebApiSettings};
    use crate::testing::{FAKE_BASE_URL, FakeWebApi};
    use serde_json::json;
    use std::collections::BTreeMap;
    use webapi_models::models::WebApiInfo;

    fn info() -> WebApiInfo {
        WebApiInfo {
            version: Some("2.14.0".to_string()),
            build_info: Some(json!({"branch": "master"})),
            extra: BTreeMap::from([("databaseDialect".to_string(), json!("postgresql"))]),
        }
    }

    #[tokio::test]
    async fn info_lists_version_build_and_extras() {
        let text = FakeWebApi::default()
            .with_info(info())
            .control_plane()
            .get_webapi_info()
            .await
            .expect("info should run")
            .joined();
        assert_eq!(
            text,
            format!(
                "WebAPI System Information:\n\nBase URL: {FAKE_BASE_URL}\nVersion: 2.14.0\n\
                 Build Info: {{\"branch\":\"master\"}}\n\nAdditional Information:\n  - databaseDialect: postgresql"
            )
        );
    }

    #[tokio::test]
    async fn version_defaults_to_unknown() {
        let text = FakeWebApi::default()
            .control_plane()
            .get_webapi_version()
            .await
            .expect("version should run");
        assert!(text.joined().ends_with("\nVersion: Unknown"));
    }

    #[tokio::test]
    async fn health_reports_each_outcome() {
        let healthy = FakeWebApi::default()
            .with_info(info())
            .control_plane()
            .check_webapi_health()
            .await
            .expect("health should run")
            .joined();
        assert!(healthy.starts_with("WebAPI Health Check: ✅ HEALTHY\n"));
        assert!(healthy.ends_with("\nVersion: 2.14.0"));

        let empty = FakeWebApi::default()
            .control_plane()
            .check_webapi_health()
            .await
            .expect("health should run")
            .joined();
        assert!(empty.starts_with("WebAPI Health Check: ⚠️  WARNING\n"));

        let down = FakeWebApi::default()
            .offline()
            .control_plane()
            .check_webapi_health()
            .await
            .expect("health should run")
            .joined();
        assert!(down.starts_with("WebAPI Health Check: ❌ FAILED\n"));
        assert!(down.contains("Error: WebAPI returned 503 for "));
        assert!(down.ends_with("  - Authentication if required"));
    }

    #[tokio::test]
    async fn health_still_requires_a_base_url() {
        let result = FakeWebApi::default()
            .control_plane_with(WebApiSettings::default())
            .check_webapi_health()
            .await;
        assert_eq!(result, Err(ControlError::MissingSetting(ENV_BASE_URL)));
    }
}
