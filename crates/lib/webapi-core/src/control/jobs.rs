use std::fmt::Write as _;

use serde::{Deserialize, Deserializer, Serialize};
use webapi_models::models::{JobCancellation, JobExecution, display_timestamp, format_duration};

use crate::client::WebApi;
use crate::text::ToolText;

use super::vocabulary::default_limit;
use super::{ControlError, WebApiControlPlane, failure, plain};

const PROGRESS_BAR_CELLS: u32 = 20;
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;

/// Execution ids are accepted as JSON strings or integers.
fn execution_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text.trim().to_string(),
        RawId::Number(number) => number.to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusRequest {
    #[serde(deserialize_with = "execution_id")]
    pub execution_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJobsRequest {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ListJobsRequest {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelJobRequest {
    #[serde(deserialize_with = "execution_id")]
    pub execution_id: String,
}

const fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorJobRequest {
    #[serde(deserialize_with = "execution_id")]
    pub execution_id: String,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

fn status_emoji(status: &str) -> &'static str {
    match status.to_ascii_uppercase().as_str() {
        "COMPLETED" => "✅",
        "RUNNING" | "STARTED" | "STARTING" => "🔄",
        "FAILED" => "❌",
        "PENDING" => "⏳",
        "CANCELED" | "STOPPED" => "⏹️",
        _ => "❓",
    }
}

/// Twenty cells, one per five percent completed.
fn progress_bar(progress: f64) -> String {
    (1..=PROGRESS_BAR_CELLS)
        .map(|cell| if f64::from(cell * 5) <= progress { '█' } else { '░' })
        .collect()
}

fn not_found(execution_id: &str) -> ToolText {
    ToolText::single(format!("No job found with execution ID: {execution_id}"))
}

fn render_status(execution_id: &str, job: &JobExecution) -> String {
    let mut text = format!(
        "Job Status for Execution ID: {execution_id}\n\nStatus: {}",
        job.status_label()
    );
    if let Some(name) = job.job_name() {
        let _ = write!(text, "\nJob Name: {name}");
    }
    if let Some(start) = &job.start_date {
        let _ = write!(text, "\nStart Time: {start}");
    }
    if let Some(end) = &job.end_date {
        let _ = write!(text, "\nEnd Time: {end}");
    }
    if let Some(duration) = job.duration() {
        let _ = write!(text, "\nDuration: {}", format_duration(duration));
    }
    if let Some(progress) = job.progress {
        let _ = write!(text, "\nProgress: {progress}%");
    }
    if let Some(message) = job.message.as_deref().filter(|message| !message.is_empty()) {
        let _ = write!(text, "\nMessage: {message}");
    }
    if let Some(message) = job.failure_message() {
        let _ = write!(text, "\n⚠️  Failure Message: {message}");
    }

    let additional: Vec<_> = job.extra.iter().filter(|(_, value)| !value.is_null()).collect();
    if !additional.is_empty() {
        text.push_str("\n\nAdditional Information:");
        for (key, value) in additional {
            let _ = write!(text, "\n  - {key}: {}", plain(value));
        }
    }
    text
}

impl<C: WebApi> WebApiControlPlane<C> {
    /// Status of one job execution.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn get_job_status(&self, request: JobStatusRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        match api.client().job_execution(&request.execution_id).await {
            Ok(Some(job)) => Ok(ToolText::single(render_status(&request.execution_id, &job))),
            Ok(None) => Ok(not_found(&request.execution_id)),
            Err(err) => Ok(failure("retrieving job status", &err)),
        }
    }

    /// Most recent job executions.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn list_recent_jobs(&self, request: ListJobsRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let jobs = match api.client().list_job_executions(request.limit).await {
            Ok(jobs) => jobs,
            Err(err) if err.is_unsupported() => {
                return Ok(ToolText::single("Job listing not available in this WebAPI version"));
            }
            Err(err) => return Ok(failure("retrieving job list", &err)),
        };
        if jobs.is_empty() {
            return Ok(ToolText::single("No recent jobs found"));
        }

        let mut text = format!("Recent Job Executions ({} shown):\n\n", jobs.len());
        for job in &jobs {
            let id = job
                .execution_id
                .map_or_else(|| "Unknown".to_string(), |id| id.to_string());
            let _ = write!(text, "• Execution ID: {id}");
            if let Some(name) = job.job_name() {
                let _ = write!(text, "\n  Name: {name}");
            }
            if let Some(status) = job.status.as_deref() {
                let _ = write!(text, "\n  Status: {} {status}", status_emoji(status));
            }
            let _ = write!(text, "\n  Started: {}", display_timestamp(job.start_date.as_ref()));
            if let Some(duration) = job.duration() {
                let _ = write!(text, "\n  Duration: {}", format_duration(duration));
            }
            text.push_str("\n\n");
        }

        Ok(ToolText::single(text))
    }

    /// Requests cancellation of a job that has not finished yet.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn cancel_job(&self, request: CancelJobRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let id = request.execution_id.as_str();
        let current = match api.client().job_execution(id).await {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(not_found(id)),
            Err(err) => return Ok(failure("canceling job", &err)),
        };
        if current.is_terminal() {
            return Ok(ToolText::single(format!(
                "Job {id} is already {} and cannot be canceled",
                current.status_label().to_lowercase()
            )));
        }

        let outcome = match api.client().cancel_job_execution(id).await {
            Ok(outcome) => outcome,
            Err(err) if err.is_unsupported() => {
                return Ok(ToolText::single(
                    "Job cancellation not available in this WebAPI version",
                ));
            }
            Err(err) => return Ok(failure("canceling job", &err)),
        };

        let mut text = format!("Job Cancellation Request for {id}:\n\nStatus: Cancellation requested");
        match outcome {
            Some(outcome) if outcome.success == Some(true) => {
                text.push_str("\nResult: ✅ Successfully canceled");
            }
            Some(JobCancellation {
                message: Some(message),
                ..
            }) => {
                let _ = write!(text, "\nMessage: {message}");
            }
            _ => text.push_str("\nResult: Cancellation request submitted"),
        }
        let _ = write!(text, "\n\nTo check the current status, use: get_job_status('{id}')");

        Ok(ToolText::single(text))
    }

    /// Single progress snapshot with follow-up guidance for unfinished jobs.
    ///
    /// # Errors
    /// Returns `ControlError` when no base URL is configured.
    pub async fn monitor_job_progress(&self, request: MonitorJobRequest) -> Result<ToolText, ControlError> {
        let api = self.connector.connect()?;
        let id = request.execution_id.as_str();
        let job = match api.client().job_execution(id).await {
            Ok(Some(job)) => job,
            Ok(None) => return Ok(not_found(id)),
            Err(err) => return Ok(failure("monitoring job", &err)),
        };

        let status = job.status_label();
        let mut text = format!("Job Monitor for Execution ID: {id}\n\nCurrent Status: {status}");
        if let Some(progress) = job.progress {
            let _ = write!(
                text,
                "\nProgress: {progress}%\nProgress Bar: [{}] {progress}%",
                progress_bar(progress)
            );
        }
        let _ = write!(text, "\nStarted: {}", display_timestamp(job.start_date.as_ref()));
        if let Some(message) = job.message.as_deref().filter(|message| !message.is_empty()) {
            let _ = write!(text, "\nMessage: {message}");
        }

        if job.is_active() {
            let _ = write!(
                text,
                "\n\n📊 Job is still {}. To continue monitoring:\n\
                 \x20 - Check status again: get_job_status('{id}')\n\
                 \x20 - For real-time monitoring, check status every {} seconds\n\
                 \x20 - Cancel if needed: cancel_job('{id}')",
                status.to_lowercase(),
                request.check_interval
            );
        } else {
            let _ = write!(text, "\n\n✅ Job monitoring complete. Final status: {status}");
        }

        Ok(ToolText::single(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeWebApi, job};
    use serde_json::{Value, json};
    use webapi_models::models::{ExitStatus, JobInstance, Timestamp};

    #[test]
    fn execution_id_accepts_numbers_and_strings() {
        let numeric: JobStatusRequest =
            serde_json::from_value(json!({"execution_id": 42})).expect("numeric id");
        let text: JobStatusRequest =
            serde_json::from_value(json!({"execution_id": " 42 "})).expect("string id");
        assert_eq!(numeric.execution_id, "42");
        assert_eq!(text.execution_id, "42");
    }

    #[test]
    fn progress_bar_fills_one_cell_per_five_percent() {
        assert_eq!(progress_bar(0.0), "░".repeat(20));
        assert_eq!(progress_bar(47.5), format!("{}{}", "█".repeat(9), "░".repeat(11)));
        assert_eq!(progress_bar(100.0), "█".repeat(20));
    }

    #[tokio::test]
    async fn status_lists_failure_and_extra_fields() {
        let mut failed = job(7, "FAILED");
        failed.start_date = Some(Timestamp::Millis(0));
        failed.end_date = Some(Timestamp::Millis(125_000));
        failed.exit_status = Some(ExitStatus {
            exit_code: Some("FAILED".to_string()),
            exit_description: Some("relation does not exist".to_string()),
        });
        failed.job_instance_resource_object = Some(JobInstance {
            instance_id: Some(3),
            name: Some("generateCohort".to_string()),
        });
        failed.extra.insert("jobType".to_string(), json!("GENERATION"));
        failed.extra.insert("owner".to_string(), Value::Null);

        let text = FakeWebApi::default()
            .with_job(failed)
            .control_plane()
            .get_job_status(JobStatusRequest {
                execution_id: "7".to_string(),
            })
            .await
            .expect("status should run")
            .joined();

        assert!(text.starts_with("Job Status for Execution ID: 7\n\nStatus: FAILED\nJob Name: generateCohort\n"));
        assert!(text.contains("\nEnd Time: 1970-01-01 00:02:05 UTC\nDuration: 2m 5s"));
        assert!(text.contains("\n⚠️  Failure Message: relation does not exist"));
        assert!(text.ends_with("\n\nAdditional Information:\n  - jobType: GENERATION"));
    }

    #[tokio::test]
    async fn unknown_job_is_reported() {
        let text = FakeWebApi::default()
            .control_plane()
            .get_job_status(JobStatusRequest {
                execution_id: "99".to_string(),
            })
            .await
            .expect("status should run");
        assert_eq!(text.joined(), "No job found with execution ID: 99");
    }

    #[tokio::test]
    async fn listing_marks_status_and_handles_unsupported_versions() {
        let fake = FakeWebApi::default()
            .with_job(job(1, "COMPLETED"))
            .with_job(job(2, "RUNNING"));
        let text = fake
            .control_plane()
            .list_recent_jobs(ListJobsRequest::default())
            .await
            .expect("list should run")
            .joined();
        assert!(text.starts_with("Recent Job Executions (2 shown):\n\n• Execution ID: 1\n  Status: ✅ COMPLETED\n"));
        assert!(text.contains("• Execution ID: 2\n  Status: 🔄 RUNNING\n"));

        let unsupported = fake
            .without_job_listing()
            .control_plane()
            .list_recent_jobs(ListJobsRequest::default())
            .await
            .expect("list should run");
        assert_eq!(unsupported.joined(), "Job listing not available in this WebAPI version");
    }

    #[tokio::test]
    async fn finished_jobs_are_not_cancelled() {
        let fake = FakeWebApi::default().with_job(job(5, "COMPLETED"));
        let text = fake
            .control_plane()
            .cancel_job(CancelJobRequest {
                execution_id: "5".to_string(),
            })
            .await
            .expect("cancel should run");
        assert_eq!(text.joined(), "Job 5 is already completed and cannot be canceled");
        assert!(fake.cancelled_jobs().is_empty());
    }

    #[tokio::test]
    async fn running_job_is_cancelled() {
        let fake = FakeWebApi::default().with_job(job(6, "RUNNING"));
        let text = fake
            .control_plane()
            .cancel_job(CancelJobRequest {
                execution_id: "6".to_string(),
            })
            .await
            .expect("cancel should run")
            .joined();
        assert_eq!(fake.cancelled_jobs(), vec!["6".to_string()]);
        assert_eq!(
            text,
            "Job Cancellation Request for 6:\n\nStatus: Cancellation requested\nResult: ✅ Successfully canceled\n\n\
             To check the current status, use: get_job_status('6')"
        );

        let refused = FakeWebApi::default()
            .with_job(job(6, "RUNNING"))
            .without_job_cancellation()
            .control_plane()
            .cancel_job(CancelJobRequest {
                execution_id: "6".to_string(),
            })
            .await
            .expect("cancel should run");
        assert_eq!(refused.joined(), "Job cancellation not available in this WebAPI version");
    }

    #[tokio::test]
    async fn monitor_guides_running_jobs() {
        let mut running = job(8, "RUNNING");
        running.progress = Some(50.0);
        let text = FakeWebApi::default()
            .with_job(running)
            .control_plane()
            .monitor_job_progress(MonitorJobRequest {
                execution_id: "8".to_string(),
                check_interval: 10,
            })
            .await
            .expect("monitor should run")
            .joined();

        assert!(text.contains(&format!(
            "Progress: 50%\nProgress Bar: [{}{}] 50%",
            "█".repeat(10),
            "░".repeat(10)
        )));
        assert!(text.contains("📊 Job is still running. To continue monitoring:\n  - Check status again: get_job_status('8')\n"));
        assert!(text.contains("check status every 10 seconds"));
    }

    #[tokio::test]
    async fn monitor_reports_final_status() {
        let text = FakeWebApi::default()
            .with_job(job(9, "COMPLETED"))
            .control_plane()
            .monitor_job_progress(MonitorJobRequest {
                execution_id: "9".to_string(),
                check_interval: 30,
            })
            .await
            .expect("monitor should run")
            .joined();
        assert!(text.ends_with("\n\n✅ Job monitoring complete. Final status: COMPLETED"));
    }
}
