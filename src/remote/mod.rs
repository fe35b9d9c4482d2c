//! Remote task client: submit, poll and collect parsing jobs.
//!
//! ## Job lifecycle
//!
//! ```text
//! submit(file_url) ──► task_id
//!        │
//!        ▼
//! poll(task_id) ── pending / running / converting ──► sleep, poll again
//!        │                                            (until max_wait)
//!        ├── failed ──► RemoteTaskFailed(err_msg)
//!        ▼
//!      done ── full_zip_url ──► fetch_and_unpack ──► result JSON
//! ```
//!
//! Files that are not reachable by URL take the batch route instead:
//! `request_batch_upload_urls` → `upload` → `poll_batch`.

pub mod archive;
pub mod client;
pub mod poll;
pub mod types;

pub use client::ParserClient;
pub use poll::{await_completion, TaskStatusSource};
pub use types::{
    ArchiveContents, BatchFile, BatchFileResult, BatchStatus, BatchUpload, ExtractProgress,
    SubmitOptions, TaskState, TaskStatus,
};
