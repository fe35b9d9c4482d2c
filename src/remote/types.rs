//! Wire and result types of the remote parsing service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle state of a parsing job.
///
/// `Done` and `Failed` are terminal. Unrecognised strings are kept verbatim
/// in `Unknown` so a new upstream state never breaks deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    Pending,
    Running,
    Converting,
    Done,
    Failed,
    /// Batch entry whose file has not been uploaded yet.
    WaitingFile,
    Unknown(String),
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Converting => "converting",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
            TaskState::WaitingFile => "waiting-file",
            TaskState::Unknown(s) => s,
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Unknown(String::new())
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => TaskState::Pending,
            "running" => TaskState::Running,
            "converting" => TaskState::Converting,
            "done" => TaskState::Done,
            "failed" => TaskState::Failed,
            "waiting-file" => TaskState::WaitingFile,
            _ => TaskState::Unknown(s),
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Unknown(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-level progress reported while a job runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractProgress {
    #[serde(default)]
    pub extracted_pages: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// Snapshot of one job as returned by a status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    #[serde(default)]
    pub state: TaskState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_progress: Option<ExtractProgress>,

    /// Archive location, present once `state == done`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_zip_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
}

impl TaskStatus {
    /// Archive URL, ignoring an empty string.
    pub fn archive_url(&self) -> Option<&str> {
        self.full_zip_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Failure message, ignoring an empty string.
    pub fn error_message(&self) -> Option<&str> {
        self.err_msg.as_deref().filter(|m| !m.is_empty())
    }
}

/// One file entry of a batch status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFileResult {
    #[serde(default)]
    pub file_name: String,

    #[serde(flatten)]
    pub status: TaskStatus,
}

/// Result of a batch status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,

    #[serde(default)]
    pub extract_result: Vec<BatchFileResult>,
}

/// Optional job parameters, forwarded to the service only when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_ocr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_formula: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_table: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_formats: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ranges: Option<String>,
}

/// A file announced in a batch upload-URL request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
}

impl BatchFile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_id: None,
        }
    }
}

/// Pre-signed upload targets for a batch, in the order the files were announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchUpload {
    pub batch_id: String,
    #[serde(alias = "file_urls")]
    pub upload_urls: Vec<String>,
}

/// What was found after unpacking a result archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveContents {
    pub extract_dir: PathBuf,
    pub result_json_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_dir: Option<PathBuf>,
}
