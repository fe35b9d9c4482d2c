//! Parsing-service workflows against a mock HTTP server.
//!
//! Run with:
//!   cargo test --test remote_workflow

use edgequake_pdflayout::remote::{BatchFile, TaskState};
use edgequake_pdflayout::workflow::{batch_report, task_report, upload_for_parsing};
use edgequake_pdflayout::{
    await_completion, parse_remote, BlockKind, ParseOutcome, ParserApiConfig, ParserClient,
    PdfLayoutError, SubmitOptions,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_bytes, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn client_for(server: &MockServer, token: Option<&str>) -> ParserClient {
    ParserClient::new(ParserApiConfig {
        token: token.map(str::to_string),
        base_url: server.uri(),
        max_wait: Duration::from_secs(5),
        poll_interval: Duration::from_millis(50),
        ..Default::default()
    })
    .unwrap()
}

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "msg": "ok", "data": data}))
}

/// A result archive shaped like the service's: nested-paragraph JSON,
/// full.md in a subdirectory and one image.
fn result_zip() -> Vec<u8> {
    let layout = json!({"pdf_info": [
        {"page_idx": 0, "para_blocks": [
            {"type": "title", "bbox": [72, 60, 540, 90],
             "lines": [{"spans": [{"content": "Attention"}, {"content": "Is All You Need"}]}]},
            {"type": "text", "bbox": [72, 100, 540, 300],
             "lines": [{"spans": [{"content": "The dominant sequence models..."}]}]},
            {"type": "image", "bbox": [72, 320, 540, 500], "lines": []}
        ]}
    ]});

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let opts = zip::write::SimpleFileOptions::default();
    zip.start_file("layout.json", opts).unwrap();
    zip.write_all(layout.to_string().as_bytes()).unwrap();
    zip.start_file("auto/full.md", opts).unwrap();
    zip.write_all(b"# Attention Is All You Need\n").unwrap();
    zip.start_file("images/fig1.png", opts).unwrap();
    zip.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
    zip.finish().unwrap().into_inner()
}

// ── Submit ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_sends_bearer_token_and_returns_task_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract/task"))
        .and(header("authorization", "Bearer tok-123"))
        .and(body_partial_json(
            json!({"url": "https://x.test/a.pdf", "model_version": "vlm"}),
        ))
        .respond_with(ok(json!({"task_id": "t-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok-123"));
    let id = client
        .submit("https://x.test/a.pdf", None, &SubmitOptions::default())
        .await
        .unwrap();
    assert_eq!(id, "t-1");
}

#[tokio::test]
async fn business_error_code_becomes_remote_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract/task"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": -60003, "msg": "file url is invalid", "data": null})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server, Some("tok"))
        .submit("bad", None, &SubmitOptions::default())
        .await
        .unwrap_err();
    match err {
        PdfLayoutError::RemoteApi { message, .. } => assert_eq!(message, "file url is invalid"),
        other => panic!("expected RemoteApi, got {other:?}"),
    }
}

#[tokio::test]
async fn http_failure_becomes_remote_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extract/task/t-9"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client_for(&server, Some("tok")).poll("t-9").await.unwrap_err();
    assert!(matches!(err, PdfLayoutError::RemoteApi { .. }));
    assert!(err.to_string().contains("502"), "{err}");
}

#[tokio::test]
async fn success_without_task_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract/task"))
        .respond_with(ok(json!({})))
        .mount(&server)
        .await;

    let err = client_for(&server, Some("tok"))
        .submit("https://x.test/a.pdf", None, &SubmitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PdfLayoutError::Protocol { .. }), "{err:?}");
}

#[tokio::test]
async fn missing_token_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ok(json!({"task_id": "never"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server, None)
        .submit("https://x.test/a.pdf", None, &SubmitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PdfLayoutError::Configuration { .. }));
}

// ── Await + collect ──────────────────────────────────────────────────────────

#[tokio::test]
async fn parse_remote_waits_downloads_and_normalizes() {
    let server = MockServer::start().await;
    let zip_url = format!("{}/download/t-42.zip", server.uri());

    Mock::given(method("POST"))
        .and(path("/extract/task"))
        .respond_with(ok(json!({"task_id": "t-42"})))
        .mount(&server)
        .await;
    // Two polls report progress, then the task is done.
    Mock::given(method("GET"))
        .and(path("/extract/task/t-42"))
        .respond_with(ok(json!({
            "task_id": "t-42",
            "state": "running",
            "extract_progress": {"extracted_pages": 1, "total_pages": 2}
        })))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/extract/task/t-42"))
        .respond_with(ok(json!({"task_id": "t-42", "state": "done", "full_zip_url": zip_url})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/t-42.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(result_zip()))
        .expect(1)
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let client = client_for(&server, Some("tok"));
    let outcome = parse_remote(
        &client,
        "https://x.test/paper.pdf",
        None,
        &SubmitOptions::default(),
        true,
        out.path(),
    )
    .await
    .unwrap();

    let ParseOutcome::Completed { task_id, result } = outcome else {
        panic!("expected a completed parse");
    };
    assert_eq!(task_id, "t-42");
    assert_eq!(result.archive.extract_dir, out.path().join("t-42"));
    assert_eq!(result.archive.result_json_path, out.path().join("t-42/layout.json"));
    assert_eq!(
        result.archive.markdown_path.as_deref(),
        Some(out.path().join("t-42/auto/full.md").as_path())
    );
    assert!(result.archive.images_dir.is_some());

    assert_eq!(result.layout.len(), 2);
    assert_eq!(result.layout[0].text, "Attention Is All You Need");
    assert_eq!(result.layout[0].kind, BlockKind::Title);
    assert_eq!(result.layout[1].kind, BlockKind::Text);
    assert!(result.layout.iter().all(|b| b.page == 1 && b.bbox.len() == 4));
    assert!(result.raw.get("pdf_info").is_some());
}

#[tokio::test]
async fn parse_remote_without_wait_only_submits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/extract/task"))
        .respond_with(ok(json!({"task_id": "t-7"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ok(json!({"state": "done"})))
        .expect(0)
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let outcome = parse_remote(
        &client_for(&server, Some("tok")),
        "https://x.test/a.pdf",
        Some("pipeline"),
        &SubmitOptions::default(),
        false,
        out.path(),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, ParseOutcome::Submitted { task_id } if task_id == "t-7"));
}

#[tokio::test]
async fn await_completion_times_out_after_max_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extract/task/slow"))
        .respond_with(ok(json!({"task_id": "slow", "state": "running"})))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("tok"));
    let started = std::time::Instant::now();
    let err = await_completion(
        &client,
        "slow",
        Duration::from_secs(1),
        Duration::from_secs(1),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PdfLayoutError::Timeout { ref task_id, .. } if task_id == "slow"));
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn failed_task_reports_remote_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extract/task/bad"))
        .respond_with(ok(json!({"task_id": "bad", "state": "failed", "err_msg": "file is encrypted"})))
        .mount(&server)
        .await;

    let err = await_completion(
        &client_for(&server, Some("tok")),
        "bad",
        Duration::from_secs(5),
        Duration::from_millis(50),
    )
    .await
    .unwrap_err();
    match err {
        PdfLayoutError::RemoteTaskFailed { message, .. } => assert_eq!(message, "file is encrypted"),
        other => panic!("expected RemoteTaskFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn task_report_keeps_status_when_download_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extract/task/t-5"))
        .respond_with(ok(json!({
            "task_id": "t-5",
            "state": "done",
            "full_zip_url": format!("{}/gone.zip", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let report = task_report(&client_for(&server, Some("tok")), "t-5", out.path())
        .await
        .unwrap();
    assert_eq!(report.status.state, TaskState::Done);
    assert!(report.result.is_none());
}

// ── Batch upload flow ────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_for_parsing_puts_file_to_signed_url() {
    let server = MockServer::start().await;
    let signed = format!("{}/oss/upload-abc", server.uri());

    Mock::given(method("POST"))
        .and(path("/file-urls/batch"))
        .and(body_partial_json(json!({"files": [{"name": "report.pdf"}], "model_version": "vlm"})))
        .respond_with(ok(json!({"batch_id": "b-1", "file_urls": [signed]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/oss/upload-abc"))
        .and(body_bytes(b"%PDF-1.7 test".to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("report.pdf");
    std::fs::write(&file, b"%PDF-1.7 test").unwrap();

    let batch = upload_for_parsing(&client_for(&server, Some("tok")), &file, None)
        .await
        .unwrap();
    assert_eq!(batch.batch_id, "b-1");
    assert_eq!(batch.upload_urls.len(), 1);
}

#[tokio::test]
async fn upload_urls_missing_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file-urls/batch"))
        .respond_with(ok(json!({"batch_id": "b-2", "file_urls": []})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.pdf");
    std::fs::write(&file, b"%PDF").unwrap();

    let err = upload_for_parsing(&client_for(&server, Some("tok")), &file, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PdfLayoutError::Protocol { .. }));
}

#[tokio::test]
async fn batch_report_returns_first_entry_while_running() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extract-results/batch/b-1"))
        .respond_with(ok(json!({
            "batch_id": "b-1",
            "extract_result": [
                {"file_name": "a.pdf", "state": "running",
                 "extract_progress": {"extracted_pages": 3, "total_pages": 10}},
                {"file_name": "b.pdf", "state": "pending"}
            ]
        })))
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let report = batch_report(&client_for(&server, Some("tok")), "b-1", out.path())
        .await
        .unwrap();
    let entry = report.entry.unwrap();
    assert_eq!(entry.file_name, "a.pdf");
    assert_eq!(entry.status.state, TaskState::Running);
    assert_eq!(entry.status.extract_progress.unwrap().total_pages, 10);
    assert!(report.result.is_none());
}

#[tokio::test]
async fn batch_report_with_no_entries_is_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/extract-results/batch/b-0"))
        .respond_with(ok(json!({"batch_id": "b-0", "extract_result": []})))
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let report = batch_report(&client_for(&server, Some("tok")), "b-0", out.path())
        .await
        .unwrap();
    assert!(report.entry.is_none());
}

#[test]
fn batch_file_serializes_without_empty_data_id() {
    let v = serde_json::to_value(BatchFile::named("x.pdf")).unwrap();
    assert_eq!(v, json!({"name": "x.pdf"}));
}
