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

use super::choices::{default_check_interval, default_limit};
use crate::{WebApiMcp, helpers};

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct JobExecutionParams {
    /// Job execution id, as a string or an integer.
    pub execution_id: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ListJobsParams {
    /// Maximum number of jobs to show.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MonitorJobParams {
    /// Job execution id, as a string or an integer.
    pub execution_id: Value,
    /// Seconds the caller should wait between checks.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

#[tool_router(router = tool_router_jobs, vis = "pub")]
impl<C: WebApi> WebApiMcp<C> {
    #[tool(description = "Get the status of a WebAPI job execution.")]
    async fn get_job_status(
        &self,
        Parameters(params): Parameters<JobExecutionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("get_job_status", helpers::arguments(&params)?).await)
    }

    #[tool(description = "List recent job executions.")]
    async fn list_recent_jobs(
        &self,
        Parameters(params): Parameters<ListJobsParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("list_recent_jobs", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Cancel a running job execution.")]
    async fn cancel_job(
        &self,
        Parameters(params): Parameters<JobExecutionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("cancel_job", helpers::arguments(&params)?).await)
    }

    #[tool(description = "Report job progress once, with guidance for checking again.")]
    async fn monitor_job_progress(
        &self,
        Parameters(params): Parameters<MonitorJobParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.run("monitor_job_progress", helpers::arguments(&params)?).await)
    }
}
