#![cfg(feature = "web")]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use sheetdesk::app::{AppState, router};
use sheetdesk::config::Config;
use sheetdesk::loader::{FileKind, HeaderLayout, read_workbook};

const BOUNDARY: &str = "sheetdesk-test-boundary";

const POINTS_CSV: &str = "\
크리에이터ID,총 포인트,인센티브 포인트,시즌1 포인트,시즌2 포인트
c-001,1500,0,500,1000
c-002,300,100,0,200
";

fn app() -> axum::Router {
    router(Arc::new(AppState {
        config: Config::default(),
    }))
}

fn multipart_body(file_name: &str, content_type: &str, data: &str, layout: Option<&str>) -> String {
    let mut body = String::new();
    if let Some(layout) = layout {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"layout\"\r\n\r\n{layout}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n{data}\r\n--{BOUNDARY}--\r\n"
    ));
    body
}

fn upload_request(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_of(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

async fn uploaded_table() -> Value {
    let body = multipart_body("points.csv", "text/csv", POINTS_CSV, None);
    let response = app()
        .oneshot(upload_request("/api/settlement/upload", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_of(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["seasons"], json!([1, 2]));
    json["table"].clone()
}

#[tokio::test]
async fn serves_tool_pages() {
    for uri in ["/", "/settlement", "/linter"] {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("<html"));
    }
}

#[tokio::test]
async fn rejects_unsupported_upload_type() {
    let body = multipart_body("notes.txt", "text/plain", "hello", None);
    let response = app()
        .oneshot(upload_request("/api/settlement/upload", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json_of(response).await["status"], "error");
}

#[tokio::test]
async fn header_only_upload_is_a_bad_request() {
    let body = multipart_body("points.csv", "text/csv", "크리에이터ID,총 포인트\n", None);
    let response = app()
        .oneshot(upload_request("/api/settlement/upload", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn computes_settlement_from_uploaded_table() {
    let table = uploaded_table().await;
    let request = json!({
        "table": table,
        "prices": [
            { "season": 1, "pointPrice": "1", "mbxPrice": "1" },
            { "season": 2, "pointPrice": "2", "mbxPrice": "1" },
        ],
    });
    let response = app()
        .oneshot(json_request("/api/settlement/compute", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_of(response).await;
    let rows = json["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["creatorId"], "c-001");
    assert_eq!(rows[0]["seasonPoints"], "season2:1000, season1:500");
    assert_eq!(decimal(&rows[0]["totalMbx"]), Decimal::from(2500));
    // 100 incentive points at season 2 prices, then 200 season-2 points.
    assert_eq!(decimal(&rows[1]["incentiveMbx"]), Decimal::from(200));
    assert_eq!(rows[1]["seasonPoints"], "season2:200");
    assert_eq!(rows[1]["lastUsedSeason"], 1);
    assert_eq!(json["summary"]["totalCreators"], 2);
    assert_eq!(decimal(&json["summary"]["totalMbx"]), Decimal::from(3100));
}

#[tokio::test]
async fn missing_prices_come_back_as_field_errors() {
    let table = uploaded_table().await;
    let request = json!({
        "table": table,
        "prices": [
            { "season": 1, "pointPrice": null, "mbxPrice": "0" },
            { "season": 2, "pointPrice": "1", "mbxPrice": "1" },
        ],
    });
    let response = app()
        .oneshot(json_request("/api/settlement/compute", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = json_of(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(
        json["errors"],
        json!([
            { "season": 1, "field": "pointPrice", "problem": "missing" },
            { "season": 1, "field": "mbxPrice", "problem": "zero" },
        ])
    );
}

#[tokio::test]
async fn unpriced_season_columns_are_missing_fields() {
    let table = uploaded_table().await;
    let request = json!({
        "table": table,
        "prices": [{ "season": 1, "pointPrice": "1", "mbxPrice": "1" }],
    });
    let response = app()
        .oneshot(json_request("/api/settlement/compute", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = json_of(response).await;
    assert_eq!(
        json["errors"],
        json!([
            { "season": 2, "field": "pointPrice", "problem": "missing" },
            { "season": 2, "field": "mbxPrice", "problem": "missing" },
        ])
    );
}

#[tokio::test]
async fn amounts_too_large_for_decimals_are_unprocessable() {
    let request = json!({
        "table": {
            "headers": ["크리에이터ID", "총 포인트", "시즌1 포인트"],
            "rows": [["c-001", 10000000, 10000000]],
        },
        "prices": [{ "season": 1, "pointPrice": "1", "mbxPrice": "0.0000000000000000000001" }],
    });
    let response = app()
        .oneshot(json_request("/api/settlement/compute", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = json_of(response).await;
    assert_eq!(json["status"], "error");
    assert!(json["message"].as_str().unwrap().starts_with("row 1:"));
}

#[tokio::test]
async fn exports_settlement_as_xlsx_attachment() {
    let request = json!({
        "rows": [{
            "no": 1,
            "creatorId": "c-001",
            "creatorName": "Alice",
            "walletAddress": "0xa",
            "totalPoints": "1500",
            "totalMbx": "1500",
            "earlyBirdMbx": "0",
            "earlyBirdPoints": "0",
            "incentiveMbx": "0",
            "incentivePoints": "0",
            "seasonMbx": "1500",
            "seasonPoints": "season2:1000, season1:500",
            "lastUsedSeason": 1,
        }],
    });
    let response = app()
        .oneshot(json_request("/api/settlement/export", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    // "정산결과" percent-encoded.
    assert!(disposition.starts_with("attachment; filename*=UTF-8''%EC%A0%95%EC%82%B0"));
    assert!(disposition.ends_with(".xlsx"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let tables = read_workbook(&bytes, FileKind::Xlsx, HeaderLayout::FirstRow).unwrap();
    assert_eq!(tables[0].rows.len(), 1);
}

#[tokio::test]
async fn lints_and_cleans_an_upload() {
    let csv = "key,text\nk1,줄\u{2028}바꿈\nk2,ok\n";
    let body = multipart_body("strings.csv", "text/csv", csv, Some("first_row"));
    let response = app()
        .oneshot(upload_request("/api/lint/upload", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_of(response).await;
    let sheet = &json["sheets"][0];
    assert_eq!(sheet["report"]["summary"], "LS: 1");
    assert_eq!(sheet["report"]["invalidRows"], json!([{ "row": 1, "firstColumn": "k1" }]));
    assert_eq!(sheet["report"]["cells"][0]["occurrences"][0]["kind"], "LS");

    let request = json!({ "table": sheet["table"] });
    let response = app()
        .oneshot(json_request("/api/lint/clean", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let tables = read_workbook(&bytes, FileKind::Xlsx, HeaderLayout::Preamble).unwrap();
    assert_eq!(tables[0].headers, vec!["key", "text"]);
    assert_eq!(
        tables[0].rows[0][1],
        sheetdesk::CellValue::Text("줄\n바꿈".into())
    );
}

#[tokio::test]
async fn unknown_layout_is_a_bad_request() {
    let body = multipart_body("strings.csv", "text/csv", "a\nb\n", Some("sideways"));
    let response = app()
        .oneshot(upload_request("/api/lint/upload", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    let app = router(Arc::new(AppState {
        config: Config {
            max_upload_mb: 0,
            ..Config::default()
        },
    }));
    let request = json!({ "table": { "headers": ["a"], "rows": [["b"]] } });
    let response = app
        .oneshot(json_request("/api/lint/clean", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
