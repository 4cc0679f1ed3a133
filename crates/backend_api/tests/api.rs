use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use backend_api::{create_router, AppState, FileLedgerRepository, PipelineSettings};
use models::AliasTable;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const PAYABLES: &str = "伝票日付\t仕入先\t品名\t数量\t金額\t伝票番号\n\
                        2024/04/01\t株式会社A\tボルト\t10\t10000\tP-1\n\
                        2024/04/05\t有限会社C\tナット\t0\t5000\t\n";

const RECEIVABLES: &str = "売上日,得意先名,品名,数量,金額,伝票番号\n\
                           2024/04/05,ＡＢＣ商事,部品,4,1000,S-1\n";

const BOUNDARY: &str = "ledger-test-boundary";

struct Fixture {
    dir: TempDir,
    app: Router,
}

impl Fixture {
    fn output(&self) -> std::path::PathBuf {
        self.dir.path().join("normalized_ledgers.tsv")
    }
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("買掛台帳.TXT"), PAYABLES).unwrap();
    fs::write(data_dir.join("売掛台帳.TXT"), RECEIVABLES).unwrap();

    let pipeline = PipelineSettings {
        data_dir,
        output: dir.path().join("normalized_ledgers.tsv"),
        aliases: AliasTable::builtin(),
        delimiter: None,
    };
    let repo = Arc::new(FileLedgerRepository::new(&pipeline.output));
    let app = create_router(AppState::new(repo, pipeline));
    Fixture { dir, app }
}

fn multipart(parts: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.txt\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload_ledgers")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

async fn upload_stored_sources(fixture: &Fixture) {
    let (status, body) = send(&fixture.app, multipart(&[("purchase", PAYABLES.as_bytes())])).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_health() {
    let fixture = fixture();
    let (status, body) = send(&fixture.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "ledger-viewer");
}

#[tokio::test]
async fn test_transactions_before_first_run_is_404() {
    let fixture = fixture();
    let (status, body) = send(&fixture.app, get("/api/transactions")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_upload_publishes_and_stores() {
    let fixture = fixture();
    let (status, body) = send(&fixture.app, multipart(&[("sales", RECEIVABLES.as_bytes())])).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["updated"], serde_json::json!(["sales"]));
    assert_eq!(body["summary"]["records_written"], 3);
    assert!(fixture.output().exists());

    let (status, body) = send(&fixture.app, get("/api/transactions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    let first = &body["items"][0];
    assert_eq!(first["date"], "2024-04-05");
    assert_eq!(first["document_id"], "S-1");
    assert_eq!(first["ledger_type"], "sale");
    assert!(first.get("search_text").is_none());
    // Empty document id sorts after S-1 on the same day
    assert_eq!(body["items"][1]["counterparty"], "有限会社C");
    assert_eq!(body["items"][2]["unit_price"], "1000");
}

#[tokio::test]
async fn test_transaction_filters() {
    let fixture = fixture();
    upload_stored_sources(&fixture).await;

    let (_, body) = send(&fixture.app, get("/api/transactions?type=purchase")).await;
    assert_eq!(body["count"], 2);

    let (_, body) = send(&fixture.app, get("/api/transactions?type=purchase&type=sale")).await;
    assert_eq!(body["count"], 3);

    let (_, body) = send(&fixture.app, get("/api/transactions?q=%EF%BC%A1%EF%BC%A2%EF%BC%A3")).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["counterparty"], "ＡＢＣ商事");

    let (_, body) = send(
        &fixture.app,
        get("/api/transactions?start_date=2024-04-02&end_date=2024%2F04%2F05&document_id=S-1"),
    )
    .await;
    assert_eq!(body["count"], 1);

    let (_, body) = send(&fixture.app, get("/api/transactions?document_date=20240401")).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["item_memo"], "ボルト");
}

#[tokio::test]
async fn test_bad_query_params_are_400() {
    let fixture = fixture();
    upload_stored_sources(&fixture).await;

    let (status, _) = send(&fixture.app, get("/api/transactions?start_date=someday")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&fixture.app, get("/api/transactions?type=refund")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reload_picks_up_external_regeneration() {
    let fixture = fixture();
    upload_stored_sources(&fixture).await;

    let header = fs::read_to_string(fixture.output()).unwrap();
    let header = header.lines().next().unwrap().to_string();
    fs::write(fixture.output(), format!("{header}\n")).unwrap();

    let (_, body) = send(&fixture.app, get("/api/transactions")).await;
    assert_eq!(body["count"], 3);

    let (status, body) = send(&fixture.app, post("/api/reload")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "ok", "count": 0}));
}

#[tokio::test]
async fn test_unreadable_upload_is_400_and_changes_nothing() {
    let fixture = fixture();
    upload_stored_sources(&fixture).await;
    let published = fs::read(fixture.output()).unwrap();
    let stored_path = fixture.dir.path().join("data").join("売掛台帳.TXT");

    let garbage: &[u8] = &[0xFF, 0xFE, 0xFD, 0xA0];
    let (status, body) = send(&fixture.app, multipart(&[("sales", garbage)])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unreadable"));

    assert_eq!(fs::read(fixture.output()).unwrap(), published);
    assert_eq!(fs::read_to_string(&stored_path).unwrap(), RECEIVABLES);
    assert_stored_untouched(&fixture.dir.path().join("data"));
}

#[tokio::test]
async fn test_upload_without_date_column_is_400_and_changes_nothing() {
    let fixture = fixture();
    upload_stored_sources(&fixture).await;
    let published = fs::read(fixture.output()).unwrap();
    let stored_path = fixture.dir.path().join("data").join("買掛台帳.TXT");

    let undated = "仕入先,金額\nA社,100\n".as_bytes();
    let (status, body) = send(&fixture.app, multipart(&[("purchase", undated)])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no date column"), "{body}");

    assert_eq!(fs::read(fixture.output()).unwrap(), published);
    assert_eq!(fs::read_to_string(&stored_path).unwrap(), PAYABLES);
    assert_stored_untouched(&fixture.dir.path().join("data"));
}

#[tokio::test]
async fn test_upload_without_parts_is_400() {
    let fixture = fixture();
    let (status, _) = send(&fixture.app, multipart(&[("other", b"x".as_slice())])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn assert_stored_untouched(data_dir: &Path) {
    let names: Vec<String> = fs::read_dir(data_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2, "{names:?}");
}
