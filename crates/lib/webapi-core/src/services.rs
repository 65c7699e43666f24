use std::sync::Arc;
use std::time::Duration;

use crate::client::WebApi;
use crate::control::ControlError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_BASE_URL: &str = "WEBAPI_BASE_URL";
pub const ENV_SOURCE_KEY: &str = "WEBAPI_SOURCE_KEY";

/// Process-wide WebAPI settings, resolved once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebApiSettings {
    pub base_url: Option<String>,
    pub source_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for WebApiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            source_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl WebApiSettings {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize(Some(base_url.into()))
            .map(|url| url.trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn with_source_key(mut self, source_key: impl Into<String>) -> Self {
        self.source_key = normalize(Some(source_key.into()));
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Base URL of the remote service.
    ///
    /// # Errors
    /// Returns `ControlError::MissingSetting` when no base URL is configured.
    pub fn require_base_url(&self) -> Result<&str, ControlError> {
        self.base_url
            .as_deref()
            .ok_or(ControlError::MissingSetting(ENV_BASE_URL))
    }

    /// Source key from the request, falling back to the configured default.
    ///
    /// # Errors
    /// Returns `ControlError::MissingSetting` when neither is available.
    pub fn resolve_source_key<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str, ControlError> {
        requested
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .or(self.source_key.as_deref())
            .ok_or(ControlError::MissingSetting(ENV_SOURCE_KEY))
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Builds a client handle for a base URL.
pub type ConnectFn<C> = Arc<dyn Fn(&str) -> C + Send + Sync + 'static>;

/// Client handle scoped to one tool invocation; released when dropped.
pub struct WebApiHandle<C: WebApi> {
    client: C,
    base_url: Arc<str>,
}

impl<C: WebApi> WebApiHandle<C> {
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Browser URL of a cohort definition on the remote service.
    #[must_use]
    pub fn cohort_url(&self, cohort_id: i64) -> String {
        format!("{}/cohortdefinition/{cohort_id}", self.base_url)
    }
}

/// Settings plus the factory that opens a fresh client per invocation.
pub struct WebApiConnector<C: WebApi> {
    settings: Arc<WebApiSettings>,
    connect: ConnectFn<C>,
}

impl<C: WebApi> Clone for WebApiConnector<C> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            connect: self.connect.clone(),
        }
    }
}

impl<C: WebApi> WebApiConnector<C> {
    pub fn new(settings: WebApiSettings, connect: ConnectFn<C>) -> Self {
        Self {
            settings: Arc::new(settings),
            connect,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &WebApiSettings {
        &self.settings
    }

    /// Opens a client handle for the configured base URL.
    ///
    /// # Errors
    /// Returns `ControlError::MissingSetting` when no base URL is configured.
    pub fn connect(&self) -> Result<WebApiHandle<C>, ControlError> {
        let base_url = self.settings.require_base_url()?;
        Ok(WebApiHandle {
            client: (self.connect)(base_url),
            base_url: Arc::from(base_url),
        })
    }
}
