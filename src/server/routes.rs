//! Request handlers.
//!
//! ```text
//! /api/health                  GET   liveness
//! /api/upload                  POST  multipart file ─► upload dir
//! /api/parse-pdf               POST  file_url ─► submit (─► await ─► collect)
//!                                    file     ─► batch upload URL ─► PUT
//! /api/task/:task_id           GET   poll (done ─► collect)
//! /api/batch/:batch_id         GET   poll batch (done ─► collect)
//! /api/layout                  POST  normalize a result file
//! /api/translate-layout        POST  translate a layout array
//! /api/translate               POST  normalize + translate a result file
//! /api/files/*path             GET   uploaded files
//! /api/results/*path           GET   anything under the output root
//! /api/full-text/:task_id      GET   full.md of a collected task
//! /api/images/:task_id/*name   GET   extracted images
//! ```

use super::response::{translation_summary, ApiError, ApiResponse};
use super::state::AppState;
use crate::error::PdfLayoutError;
use crate::layout::LayoutBlock;
use crate::remote::archive::{find_full_markdown, IMAGES_DIR};
use crate::remote::SubmitOptions;
use crate::storage::{content_type, is_plain_component, resolve_contained, save_upload};
use crate::translate::BatchOptions;
use crate::workflow::{
    batch_report, normalize_file, parse_remote, task_report, translate_document,
    upload_for_parsing, CollectedResult, ParseOutcome,
};
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

type ApiResult = Result<Json<ApiResponse>, ApiError>;

/// The complete application: every route under `/api`, with body limit,
/// CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config().max_upload_bytes;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/parse-pdf", post(parse_pdf))
        .route("/task/:task_id", get(task_status))
        .route("/batch/:batch_id", get(batch_status))
        .route("/layout", post(layout))
        .route("/translate-layout", post(translate_layout))
        .route("/translate", post(translate))
        .route("/files/*path", get(serve_upload))
        .route("/results/*path", get(serve_result))
        .route("/full-text/:task_id", get(full_text))
        .route("/images/:task_id/*name", get(serve_image))
}

// ── Form handling ────────────────────────────────────────────────────────────

struct UploadedFile {
    name: String,
    bytes: Bytes,
}

#[derive(Default)]
struct FormInput {
    file: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

impl FormInput {
    /// A text field, trimmed; blank counts as absent.
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<FormInput, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        ApiError::bad_request(format!("Expected a multipart form: {}", e.body_text()))
    })?;
    let invalid = |e: axum::extract::multipart::MultipartError| {
        ApiError::bad_request(format!("Invalid multipart body: {e}"))
    };

    let mut form = FormInput::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(invalid)?;
            debug!("Received file field '{}' ({} bytes)", file_name, bytes.len());
            form.file = Some(UploadedFile {
                name: file_name,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(invalid)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Check an uploaded file's presence, name and extension.
fn accepted_file(state: &AppState, file: Option<UploadedFile>) -> Result<UploadedFile, ApiError> {
    let file = file.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if file.name.trim().is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    let cfg = state.config();
    if !cfg.is_allowed_file(&file.name) {
        return Err(ApiError::bad_request(format!(
            "Unsupported file type; allowed: {}",
            cfg.allowed_extensions.join(", ")
        )));
    }
    Ok(file)
}

/// The JSON document a local-file endpoint works on: a fresh upload stored
/// in the output root, or an existing file named relative to it.
async fn input_document(
    state: &AppState,
    file: Option<UploadedFile>,
    filename: Option<&str>,
) -> Result<PathBuf, ApiError> {
    let output_dir = &state.config().output_dir;
    match (file, filename) {
        (Some(file), _) => {
            let file = accepted_file(state, Some(file))?;
            Ok(save_upload(output_dir, &file.name, &file.bytes).await?)
        }
        (None, Some(name)) => {
            let path = resolve_contained(output_dir, name).map_err(|e| match e {
                PdfLayoutError::FileNotFound { .. } => {
                    ApiError::not_found(format!("File not found: {name}"))
                }
                other => other.into(),
            })?;
            if path.is_dir() {
                return Err(ApiError::bad_request(format!("'{name}' is a directory")));
            }
            Ok(path)
        }
        (None, None) => Err(ApiError::bad_request("Provide a file or a filename")),
    }
}

/// Task and batch ids become directory names; allow nothing that could
/// escape the output root.
fn checked_id(id: &str) -> Result<&str, ApiError> {
    if is_plain_component(id) {
        Ok(id)
    } else {
        Err(ApiError::bad_request(format!("Invalid id '{id}'")))
    }
}

/// Only `true` (any case) is true. Callers treat an absent field as their
/// own default.
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn display(path: &FsPath) -> Value {
    Value::String(path.display().to_string())
}

fn file_name_of(path: &FsPath) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn result_fields(result: &CollectedResult) -> Map<String, Value> {
    let archive = &result.archive;
    let mut data = Map::new();
    data.insert("layout_count".into(), json!(result.layout.len()));
    data.insert("layout".into(), json!(result.layout));
    data.insert("raw_result".into(), result.raw.clone());
    data.insert("json_path".into(), display(&archive.result_json_path));
    data.insert("extract_dir".into(), display(&archive.extract_dir));
    data.insert(
        "markdown_path".into(),
        archive.markdown_path.as_deref().map_or(Value::Null, display),
    );
    data.insert(
        "images_dir".into(),
        archive.images_dir.as_deref().map_or(Value::Null, display),
    );
    data
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> Json<ApiResponse> {
    ApiResponse::ok("Service is running", json!({ "status": "ok" }))
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let form = read_form(multipart).await?;
    let file = accepted_file(&state, form.file)?;
    let path = save_upload(&state.config().upload_dir, &file.name, &file.bytes)
        .await
        .map_err(|e| ApiError::during("Upload", e))?;

    Ok(ApiResponse::ok(
        "File uploaded",
        json!({
            "filename": file_name_of(&path),
            "filepath": display(&path),
            "size": file.bytes.len(),
        }),
    ))
}

async fn parse_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut form = read_form(multipart).await?;
    let cfg = state.config();

    let saved = match form.file.take() {
        Some(file) if !file.name.trim().is_empty() => {
            let file = accepted_file(&state, Some(file))?;
            Some(
                save_upload(&cfg.upload_dir, &file.name, &file.bytes)
                    .await
                    .map_err(|e| ApiError::during("Upload", e))?,
            )
        }
        _ => None,
    };
    let model_version = form.field("model_version");
    let wait = form.field("wait").map_or(true, parse_flag);

    let Some(file_url) = form.field("file_url") else {
        let path = saved.ok_or_else(|| ApiError::bad_request("Provide file_url or upload a PDF file"))?;
        let batch = upload_for_parsing(state.parser(), &path, model_version)
            .await
            .map_err(|e| ApiError::during("Upload for parsing", e))?;
        return Ok(ApiResponse::ok(
            "File uploaded; parsing starts automatically",
            json!({
                "batch_id": batch.batch_id,
                "state": "waiting-file",
                "message": format!("Poll /api/batch/{} for the result", batch.batch_id),
            }),
        ));
    };

    let outcome = parse_remote(
        state.parser(),
        file_url,
        model_version,
        &SubmitOptions::default(),
        wait,
        &cfg.output_dir,
    )
    .await
    .map_err(|e| ApiError::during("Parsing", e))?;

    match outcome {
        ParseOutcome::Submitted { task_id } => Ok(ApiResponse::ok(
            "Task submitted",
            json!({
                "task_id": task_id,
                "state": "pending",
                "message": format!("Poll /api/task/{task_id} for the result"),
            }),
        )),
        ParseOutcome::Completed { task_id, result } => {
            info!("Task {} parsed: {} blocks", task_id, result.layout.len());
            let mut data = result_fields(&result);
            data.insert("task_id".into(), json!(task_id));
            data.insert("state".into(), json!("done"));
            Ok(ApiResponse::ok("Parsing complete", Value::Object(data)))
        }
    }
}

async fn task_status(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult {
    let task_id = checked_id(&task_id)?;
    let report = task_report(state.parser(), task_id, &state.config().output_dir)
        .await
        .map_err(|e| ApiError::during("Status query", e))?;

    let mut data = to_object(&report.status);
    data.entry("task_id").or_insert_with(|| json!(task_id));
    if let Some(result) = &report.result {
        data.extend(result_fields(result));
    }
    Ok(ApiResponse::ok("Status retrieved", Value::Object(data)))
}

async fn batch_status(State(state): State<AppState>, Path(batch_id): Path<String>) -> ApiResult {
    let batch_id = checked_id(&batch_id)?;
    let report = batch_report(state.parser(), batch_id, &state.config().output_dir)
        .await
        .map_err(|e| ApiError::during("Batch query", e))?;

    let Some(entry) = &report.entry else {
        return Ok(ApiResponse::ok(
            "Status retrieved",
            json!({
                "batch_id": report.batch_id,
                "state": "pending",
                "message": "No file registered for this batch yet",
            }),
        ));
    };

    let mut data = Map::new();
    data.insert("batch_id".into(), json!(report.batch_id));
    data.insert("file_name".into(), json!(entry.file_name));
    data.insert("state".into(), json!(entry.status.state.as_str()));
    data.insert("err_msg".into(), json!(entry.status.error_message()));
    data.insert("extract_progress".into(), json!(entry.status.extract_progress));
    data.insert("layout".into(), json!([]));
    data.insert("layout_count".into(), json!(0));
    if let Some(result) = &report.result {
        data.extend(result_fields(result));
    }
    Ok(ApiResponse::ok("Status retrieved", Value::Object(data)))
}

async fn layout(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut form = read_form(multipart).await?;
    let file = form.file.take();
    let input = input_document(&state, file, form.field("filename")).await?;

    let normalized = normalize_file(&input, None)
        .await
        .map_err(|e| ApiError::during("Normalization", e))?;
    Ok(ApiResponse::ok(
        format!("Layout normalized: {} blocks", normalized.layout.len()),
        json!({
            "layout_count": normalized.layout.len(),
            "layout_file": display(&normalized.output_path),
            "layout": normalized.layout,
        }),
    ))
}

/// A client block: the canonical fields plus whatever else the client sent,
/// returned untouched.
#[derive(Debug, Serialize, Deserialize)]
struct ClientBlock {
    #[serde(flatten)]
    block: LayoutBlock,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TranslateLayoutRequest {
    #[serde(default)]
    layout: Vec<ClientBlock>,
    #[serde(default)]
    target_lang: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    force_retranslate: bool,
}

async fn translate_layout(State(state): State<AppState>, body: Bytes) -> ApiResult {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("Request body is empty"));
    }
    let request: TranslateLayoutRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;
    if request.layout.is_empty() {
        return Err(ApiError::bad_request("layout is empty"));
    }

    let target_lang = request
        .target_lang
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.config().default_target_lang.clone());
    let mut options = BatchOptions::new(target_lang);
    options.model = request.model.filter(|m| !m.trim().is_empty());
    options.force_retranslate = request.force_retranslate;

    let (mut blocks, extras): (Vec<LayoutBlock>, Vec<Map<String, Value>>) = request
        .layout
        .into_iter()
        .map(|b| (b.block, b.extra))
        .unzip();
    let translator = state.translator();
    let summary = translator.translate_layout(&mut blocks, &options).await;
    let message = translation_summary(&summary, translator.config());
    let layout: Vec<ClientBlock> = blocks
        .into_iter()
        .zip(extras)
        .map(|(block, extra)| ClientBlock { block, extra })
        .collect();

    let mut data = Map::new();
    data.insert("layout".into(), json!(layout));
    data.insert("translated_count".into(), json!(summary.translated_count));
    data.insert("skipped_count".into(), json!(summary.skipped_count));
    data.insert("failed_count".into(), json!(summary.failed_count));
    data.insert("total_count".into(), json!(summary.total_count));
    if let Some(first_error) = &summary.first_error {
        let llm = translator.config();
        data.insert("first_error".into(), json!(first_error));
        data.insert(
            "error_summary".into(),
            json!({
                "api_configured": llm.is_configured(),
                "primary_configured": llm.primary.key().is_some(),
                "fallback_configured": llm.fallback.key().is_some(),
            }),
        );
    }
    Ok(ApiResponse::ok(message, Value::Object(data)))
}

async fn translate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut form = read_form(multipart).await?;
    let cfg = state.config();
    let target_lang = form
        .field("target_lang")
        .unwrap_or(cfg.default_target_lang.as_str())
        .to_string();
    if !is_plain_component(&target_lang) {
        return Err(ApiError::bad_request(format!(
            "Invalid target_lang '{target_lang}'"
        )));
    }

    let file = form.file.take();
    let input = input_document(&state, file, form.field("filename")).await?;
    let mut options = BatchOptions::new(target_lang.clone());
    options.model = form.field("model").map(str::to_string);

    let translator = state.translator();
    let document = translate_document(translator, &input, None, &options)
        .await
        .map_err(|e| ApiError::during("Translation", e))?;

    let summary = &document.summary;
    Ok(ApiResponse::ok(
        translation_summary(summary, translator.config()),
        json!({
            "translated_file": display(&document.output_path),
            "target_lang": target_lang,
            "layout_count": document.layout.len(),
            "translated_count": summary.translated_count,
            "skipped_count": summary.skipped_count,
            "failed_count": summary.failed_count,
            "first_error": summary.first_error,
        }),
    ))
}

// ── File serving ─────────────────────────────────────────────────────────────

async fn send_file(path: &FsPath) -> Result<Response, ApiError> {
    if path.is_dir() {
        return Err(ApiError::bad_request("Requested path is a directory"));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PdfLayoutError::io(path, e))?;
    Ok(([(header::CONTENT_TYPE, content_type(path))], bytes).into_response())
}

async fn serve_upload(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let file = resolve_contained(&state.config().upload_dir, &path)?;
    send_file(&file).await
}

async fn serve_result(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let file = resolve_contained(&state.config().output_dir, &path)?;
    send_file(&file).await
}

async fn serve_image(
    State(state): State<AppState>,
    Path((task_id, name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let task_id = checked_id(&task_id)?;
    let requested = format!("{task_id}/{IMAGES_DIR}/{name}");
    let file = resolve_contained(&state.config().output_dir, &requested)?;
    send_file(&file).await
}

async fn full_text(State(state): State<AppState>, Path(task_id): Path<String>) -> ApiResult {
    let task_id = checked_id(&task_id)?.to_string();
    let missing = || ApiError::not_found(format!("No full.md for task {task_id}"));

    let dir = match resolve_contained(&state.config().output_dir, &task_id) {
        Ok(dir) => dir,
        Err(PdfLayoutError::FileNotFound { .. }) => return Err(missing()),
        Err(e) => return Err(e.into()),
    };
    let found = tokio::task::spawn_blocking(move || find_full_markdown(&dir))
        .await
        .map_err(|e| PdfLayoutError::Internal(format!("markdown search panicked: {e}")))?;
    let path = found.ok_or_else(missing)?;

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| PdfLayoutError::io(&path, e))?;
    Ok(ApiResponse::ok(
        "Full text retrieved",
        json!({ "content": content, "path": display(&path) }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_single_safe_components() {
        assert!(checked_id("a1b2-c3_d4").is_ok());
        assert!(checked_id("").is_err());
        assert!(checked_id("..").is_err());
        assert!(checked_id("a/b").is_err());
        assert!(checked_id("a b").is_err());
    }

    #[test]
    fn flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("1"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("nonsense"));
    }

    #[test]
    fn blank_form_fields_are_absent() {
        let mut form = FormInput::default();
        form.fields.insert("a".into(), "  ".into());
        form.fields.insert("b".into(), " zh ".into());
        assert_eq!(form.field("a"), None);
        assert_eq!(form.field("b"), Some("zh"));
        assert_eq!(form.field("c"), None);
    }
}
