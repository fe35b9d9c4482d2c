//! Document workflows shared by the HTTP server and the CLI.
//!
//! Each function composes the remote client, the normalizer and the
//! translator into one user-level operation:
//!
//! ```text
//! parse_remote        submit ─► (await ─► fetch ─► normalize)
//! upload_for_parsing  upload URL ─► PUT file ─► batch id
//! task_report         poll ─► (done? fetch ─► normalize)
//! batch_report        poll batch ─► first entry ─► (done? fetch ─► normalize)
//! normalize_file      read JSON ─► normalize ─► write <name>_layout.json
//! translate_document  read JSON ─► normalize ─► translate ─► write <name>_<lang>.json
//! ```
//!
//! Result archives land in `<output_dir>/<task_or_batch_id>/`.

use crate::error::PdfLayoutError;
use crate::layout::{normalize, LayoutBlock};
use crate::remote::{
    await_completion, ArchiveContents, BatchFile, BatchFileResult, BatchUpload, ParserClient,
    SubmitOptions, TaskState, TaskStatus,
};
use crate::storage::{is_plain_component, write_atomic};
use crate::translate::{BatchOptions, BatchSummary, Translator};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ── Result types ─────────────────────────────────────────────────────────────

/// A finished job's archive, its raw result JSON and the normalized layout.
#[derive(Debug, Clone, Serialize)]
pub struct CollectedResult {
    #[serde(flatten)]
    pub archive: ArchiveContents,
    pub raw: Value,
    pub layout: Vec<LayoutBlock>,
}

/// Outcome of [`parse_remote`].
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// Submitted without waiting; poll with the id.
    Submitted { task_id: String },
    /// Waited, fetched and normalized.
    Completed {
        task_id: String,
        result: CollectedResult,
    },
}

/// Status of one task plus its collected result when it is done.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub status: TaskStatus,
    /// `None` while running, or when collecting the finished result failed.
    pub result: Option<CollectedResult>,
}

/// Status of the first file of a batch plus its collected result.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    /// `None` while the service has not registered any file yet.
    pub entry: Option<BatchFileResult>,
    pub result: Option<CollectedResult>,
}

/// A normalized layout written to disk.
#[derive(Debug, Clone)]
pub struct NormalizedFile {
    pub layout: Vec<LayoutBlock>,
    pub output_path: PathBuf,
}

/// A translated layout written to disk.
#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    pub layout: Vec<LayoutBlock>,
    pub summary: BatchSummary,
    pub output_path: PathBuf,
}

// ── Remote workflows ─────────────────────────────────────────────────────────

/// Submit `file_url` for parsing; when `wait` is set, block (asynchronously)
/// until the job is done and collect its result.
pub async fn parse_remote(
    client: &ParserClient,
    file_url: &str,
    model_version: Option<&str>,
    options: &SubmitOptions,
    wait: bool,
    output_dir: &Path,
) -> Result<ParseOutcome, PdfLayoutError> {
    let task_id = client.submit(file_url, model_version, options).await?;
    if !wait {
        return Ok(ParseOutcome::Submitted { task_id });
    }

    let cfg = client.config();
    let status = await_completion(client, &task_id, cfg.max_wait, cfg.poll_interval).await?;
    let archive_url = status.archive_url().ok_or_else(|| PdfLayoutError::Protocol {
        service: "MinerU".into(),
        detail: format!("task {task_id} is done but has no full_zip_url"),
    })?;
    let result = collect_result(client, archive_url, &output_dir.join(&task_id)).await?;
    Ok(ParseOutcome::Completed { task_id, result })
}

/// Upload a local file through the batch upload-URL flow.
///
/// The service starts parsing on its own once the upload lands; follow up
/// with [`batch_report`] using the returned batch id.
pub async fn upload_for_parsing(
    client: &ParserClient,
    file_path: &Path,
    model_version: Option<&str>,
) -> Result<BatchUpload, PdfLayoutError> {
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PdfLayoutError::InvalidInput(format!(
            "'{}' has no file name",
            file_path.display()
        )))?;

    let batch = client
        .request_batch_upload_urls(&[BatchFile::named(name)], model_version)
        .await?;
    let url = batch
        .upload_urls
        .first()
        .ok_or_else(|| PdfLayoutError::Protocol {
            service: "MinerU".into(),
            detail: "no upload URL returned".into(),
        })?;
    client.upload(file_path, url).await?;
    info!("Uploaded {}; batch {}", file_path.display(), batch.batch_id);
    Ok(batch)
}

/// Download, unpack, read and normalize a finished job's result.
pub async fn collect_result(
    client: &ParserClient,
    archive_url: &str,
    destination: &Path,
) -> Result<CollectedResult, PdfLayoutError> {
    let archive = client.fetch_and_unpack(archive_url, destination).await?;
    let raw = load_json(&archive.result_json_path).await?;
    let layout = normalize(&raw);
    Ok(CollectedResult {
        archive,
        raw,
        layout,
    })
}

/// Poll a task once; collect its result if it is done.
///
/// A failure while collecting is logged and leaves `result` empty; the
/// status is still reported.
pub async fn task_report(
    client: &ParserClient,
    task_id: &str,
    output_dir: &Path,
) -> Result<TaskReport, PdfLayoutError> {
    let status = client.poll(task_id).await?;
    let result = collect_if_done(client, &status, &output_dir.join(task_id)).await;
    Ok(TaskReport { status, result })
}

/// Poll a batch once and report its first file.
pub async fn batch_report(
    client: &ParserClient,
    batch_id: &str,
    output_dir: &Path,
) -> Result<BatchReport, PdfLayoutError> {
    let batch = client.poll_batch(batch_id).await?;
    let entry = batch.extract_result.into_iter().next();
    let result = match &entry {
        Some(e) => collect_if_done(client, &e.status, &output_dir.join(batch_id)).await,
        None => None,
    };
    Ok(BatchReport {
        batch_id: batch_id.to_string(),
        entry,
        result,
    })
}

async fn collect_if_done(
    client: &ParserClient,
    status: &TaskStatus,
    destination: &Path,
) -> Option<CollectedResult> {
    if status.state != TaskState::Done {
        return None;
    }
    let url = status.archive_url()?;
    match collect_result(client, url, destination).await {
        Ok(result) => Some(result),
        Err(e) => {
            warn!("Could not collect result into {}: {}", destination.display(), e);
            None
        }
    }
}

// ── Local file workflows ─────────────────────────────────────────────────────

/// Read and parse a JSON file.
pub async fn load_json(path: &Path) -> Result<Value, PdfLayoutError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PdfLayoutError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| PdfLayoutError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize a layout as pretty JSON and write it atomically.
pub async fn write_layout(path: &Path, layout: &[LayoutBlock]) -> Result<(), PdfLayoutError> {
    let json = serde_json::to_vec_pretty(layout)
        .map_err(|e| PdfLayoutError::Internal(format!("serialize layout: {e}")))?;
    write_atomic(path, &json).await
}

/// `dir/name.json` → `dir/name{suffix}.json`.
pub fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}.json"))
}

/// Normalize a raw result file and write the canonical layout next to it
/// (`<name>_layout.json`) or to `output`.
pub async fn normalize_file(
    input: &Path,
    output: Option<&Path>,
) -> Result<NormalizedFile, PdfLayoutError> {
    let raw = load_json(input).await?;
    let layout = normalize(&raw);

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_path(input, "_layout"));
    write_layout(&output_path, &layout).await?;
    info!(
        "Normalized {} → {} ({} blocks)",
        input.display(),
        output_path.display(),
        layout.len()
    );
    Ok(NormalizedFile {
        layout,
        output_path,
    })
}

/// Normalize a raw result file, translate every block and write the
/// translated layout to `<name>_<lang>.json` or `output`.
///
/// Per-block failures are reported in the summary, not as an error. A
/// target language that is not a plain name component (`[A-Za-z0-9_-]+`)
/// is rejected with [`PdfLayoutError::InvalidInput`] before anything is
/// read or translated.
pub async fn translate_document(
    translator: &Translator,
    input: &Path,
    output: Option<&Path>,
    options: &BatchOptions,
) -> Result<TranslatedDocument, PdfLayoutError> {
    if !is_plain_component(&options.target_lang) {
        return Err(PdfLayoutError::InvalidInput(format!(
            "Invalid target language '{}'",
            options.target_lang
        )));
    }
    let raw = load_json(input).await?;
    let mut layout = normalize(&raw);
    let summary = translator.translate_layout(&mut layout, options).await;

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| sibling_path(input, &format!("_{}", options.target_lang)));
    write_layout(&output_path, &layout).await?;
    info!(
        "Translated {} → {} ({} of {} blocks)",
        input.display(),
        output_path.display(),
        summary.translated_count,
        summary.total_count
    );
    Ok(TranslatedDocument {
        layout,
        summary,
        output_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn sibling_paths() {
        assert_eq!(
            sibling_path(Path::new("data/mineru/doc.json"), "_layout"),
            PathBuf::from("data/mineru/doc_layout.json")
        );
        assert_eq!(
            sibling_path(Path::new("doc.json"), "_zh"),
            PathBuf::from("doc_zh.json")
        );
    }

    #[tokio::test]
    async fn normalize_file_writes_layout() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("doc.json");
        let raw = json!([{"text": "Hello", "page_idx": 0, "bbox": [1, 2, 3, 4]}]);
        std::fs::write(&input, raw.to_string()).unwrap();

        let out = normalize_file(&input, None).await.unwrap();
        assert_eq!(out.output_path, tmp.path().join("doc_layout.json"));
        assert_eq!(out.layout.len(), 1);

        let written: Value =
            serde_json::from_slice(&std::fs::read(&out.output_path).unwrap()).unwrap();
        assert_eq!(
            written,
            json!([{"page": 1, "bbox": [1, 2, 3, 4], "text": "Hello", "type": "text"}])
        );
    }

    #[tokio::test]
    async fn load_json_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = load_json(&tmp.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(missing, PdfLayoutError::FileNotFound { .. }));

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        let err = load_json(&bad).await.unwrap_err();
        assert!(matches!(err, PdfLayoutError::Json { .. }));
    }
}
