use rmcp::{ErrorData, model::CallToolResult, tool, tool_router};
use serde_json::Value;
use webapi_core::client::WebApi;

use crate::WebApiMcp;

#[tool_router(router = tool_router_info, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "Get WebAPI version, build, and system information.")]
    async fn get_webapi_info(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("get_webapi_info", Value::Null).await)
    }

    #[tool(description = "Get the WebAPI version.")]
    async fn get_webapi_version(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("get_webapi_version", Value::Null).await)
    }

    #[tool(description = "Check WebAPI connectivity and report HEALTHY, WARNING, or FAILED.")]
    async fn check_webapi_health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("check_webapi_health", Value::Null).await)
    }
}
