//! Poll-until-terminal loop for parsing jobs.
//!
//! The status query is abstracted behind [`TaskStatusSource`] so the loop can
//! be driven by a scripted source in tests.

use super::client::ParserClient;
use super::types::{TaskState, TaskStatus};
use crate::error::PdfLayoutError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// Anything that can report the state of a job by id.
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, PdfLayoutError>;
}

#[async_trait]
impl TaskStatusSource for ParserClient {
    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, PdfLayoutError> {
        self.poll(task_id).await
    }
}

/// Poll `task_id` every `poll_interval` until it is `done` or `failed`.
///
/// * `done` → the final status (with `full_zip_url`);
/// * `failed` → [`PdfLayoutError::RemoteTaskFailed`] with the job's message;
/// * elapsed time above `max_wait` → [`PdfLayoutError::Timeout`]. The job is
///   not cancelled remotely.
///
/// Any other state, including ones this crate does not know, counts as still
/// running and is subject to the same timeout. Errors from the status query
/// itself abort the loop.
pub async fn await_completion<S>(
    source: &S,
    task_id: &str,
    max_wait: Duration,
    poll_interval: Duration,
) -> Result<TaskStatus, PdfLayoutError>
where
    S: TaskStatusSource + ?Sized,
{
    let started = Instant::now();

    loop {
        let status = source.task_status(task_id).await?;
        info!("Task {} state: {}", task_id, status.state);

        match &status.state {
            TaskState::Done => {
                info!("Task {} done after {:?}", task_id, started.elapsed());
                return Ok(status);
            }
            TaskState::Failed => {
                let message = status
                    .error_message()
                    .unwrap_or("parsing failed")
                    .to_string();
                warn!("Task {} failed: {}", task_id, message);
                return Err(PdfLayoutError::RemoteTaskFailed {
                    task_id: task_id.to_string(),
                    message,
                });
            }
            TaskState::Unknown(other) => {
                warn!("Task {}: unknown state '{}', treating as running", task_id, other);
            }
            _ => {
                if let Some(p) = &status.extract_progress {
                    info!(
                        "Task {} progress: {}/{} pages",
                        task_id, p.extracted_pages, p.total_pages
                    );
                }
            }
        }

        if started.elapsed() > max_wait {
            return Err(PdfLayoutError::Timeout {
                task_id: task_id.to_string(),
                secs: max_wait.as_secs(),
            });
        }
        sleep(poll_interval).await;
    }
}
