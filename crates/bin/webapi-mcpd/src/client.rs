use std::sync::Arc;

use webapi_core::client::HttpWebApi;
use webapi_core::control::WebApiControlPlane;
use webapi_core::services::{ConnectFn, WebApiConnector, WebApiSettings};

/// Control plane over the live WebAPI. One `reqwest` client carries the
/// request timeout and is shared by every per-invocation handle.
pub fn build_control_plane(
    settings: WebApiSettings,
) -> Result<WebApiControlPlane<HttpWebApi>, reqwest::Error> {
    let http = reqwest::Client::builder()
        .timeout(settings.request_timeout)
        .user_agent(concat!("webapi-mcpd/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let connect: ConnectFn<HttpWebApi> =
        Arc::new(move |base_url: &str| HttpWebApi::new(http.clone(), base_url));
    Ok(WebApiControlPlane::new(WebApiConnector::new(settings, connect)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_target_the_configured_base_url() {
        let control = build_control_plane(
            WebApiSettings::default().with_base_url("http://localhost:8080/WebAPI/"),
        )
        .expect("client should build");

        let handle = control.connector().connect().expect("base URL is set");
        assert_eq!(handle.base_url(), "http://localhost:8080/WebAPI");
        assert_eq!(handle.client().base_url(), "http://localhost:8080/WebAPI");
    }

    #[test]
    fn missing_base_url_surfaces_per_request() {
        let control = build_control_plane(WebApiSettings::default()).expect("client should build");
        assert!(control.connector().connect().is_err());
    }
}
