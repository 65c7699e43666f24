//! REST surface for ohdsi-webapi-mcp.
//!
//! Resource routes mirror the MCP tool catalogue. Successful calls answer
//! `{"status": "success", "data": ...}`; failures answer `500 {"detail": ...}`.

mod persistence;
mod resources;

use std::net::{Ipv4Addr, SocketAddr};

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use webapi_core::client::WebApi;
use webapi_core::control::{ControlError, WebApiControlPlane};
use webapi_core::text::ToolText;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const SERVICE_NAME: &str = "ohdsi-webapi-mcp";

/// Configuration for the REST server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub addr: SocketAddr,
}

impl HttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_HTTP_PORT)))
    }
}

/// REST server wrapper.
pub struct HttpServer<C: WebApi> {
    config: HttpServerConfig,
    control: WebApiControlPlane<C>,
}

impl<C: WebApi> HttpServer<C> {
    #[must_use]
    pub const fn new(control: WebApiControlPlane<C>, config: HttpServerConfig) -> Self {
        Self { config, control }
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = router(self.control);

        info!("{SERVICE_NAME} REST API listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

pub(crate) struct AppState<C: WebApi> {
    control: WebApiControlPlane<C>,
}

impl<C: WebApi> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
        }
    }
}

impl<C: WebApi> AppState<C> {
    /// Runs a catalogued tool and wraps its text in the success envelope.
    pub(crate) async fn call(&self, tool: &str, arguments: Value) -> ApiResult<ToolText> {
        let text = self
            .control
            .dispatch(tool, arguments)
            .await
            .map_err(|err| ApiError::from_control(tool, &err))?;
        Ok(Envelope::success(text))
    }
}

/// Success envelope shared by every resource route.
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T> {
    status: &'static str,
    data: T,
}

impl<T: Serialize> Envelope<T> {
    pub(crate) const fn success(data: T) -> Json<Self> {
        Json(Self {
            status: "success",
            data,
        })
    }
}

pub(crate) type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    message: String,
}

impl ApiError {
    fn from_control(tool: &str, err: &ControlError) -> Self {
        warn!(tool, error = %err, "tool call failed");
        Self {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            detail: self.message,
        });
        (StatusCode::INTERNAL_SERVER_ERROR, payload).into_response()
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

/// Builds the REST router: resource routes, the generic `/tools/:name` route,
/// `/health`, permissive CORS, and request tracing.
pub fn router<C: WebApi>(control: WebApiControlPlane<C>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(resources::routes())
        .merge(persistence::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { control })
}
