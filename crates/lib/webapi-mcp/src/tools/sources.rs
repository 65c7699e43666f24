use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use webapi_core::client::WebApi;

use crate::{WebApiMcp, helpers};

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SourceDetailsParams {
    /// Exact source key, e.g. `SYNPUF`.
    pub source_key: String,
}

#[tool_router(router = tool_router_sources, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "List all CDM data sources registered on the WebAPI.")]
    async fn list_data_sources(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("list_data_sources", Value::Null).await)
    }

    #[tool(description = "Get detailed information about one data source.")]
    async fn get_source_details(
        &self,
        Parameters(params): Parameters<SourceDetailsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("get_source_details", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Show the configured default data source, or the first available one.")]
    async fn get_default_source(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("get_default_source", Value::Null).await)
    }
}
