//! Router-level tests: requests go through the full axum stack against an
//! in-memory store and wiremock upstreams.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{build_app, get_request, json_request, raw_request, send, test_config, MemoryStore};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn blackcat_success() -> Value {
    json!({
        "success": true,
        "data": {
            "transactionId": "bc_tx_1",
            "amount": 6473,
            "status": "PENDING",
            "paymentData": {
                "copyPaste": "00020126580014br.gov.bcb.pix0136abc",
                "qrCodeBase64": "base64,iVBORw0KGgo"
            }
        }
    })
}

fn payment_body() -> Value {
    json!({
        "nome": "Ana Souza",
        "email": "ana@example.com",
        "cpf": "123.456.789-01",
        "phone": "(11) 99999-8888",
        "amount": "64,73",
        "tracking": {"utm": {"utm_source": "google"}, "src": "ads"}
    })
}

// ============ POST /payment ============

#[tokio::test]
async fn test_payment_happy_path_records_two_leads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sales/create-sale"))
        .and(header("X-API-Key", "bc_test_key"))
        .and(body_partial_json(json!({
            "amount": 6473,
            "customer": {"phone": "11999998888", "document": {"type": "cpf", "number": "12345678901"}},
            "utm_source": "google"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(blackcat_success()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config(&server.uri()), Some(store.clone()));

    let (status, body) = send(&app, json_request("POST", "/payment", payment_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["transaction_id"], "bc_tx_1");
    assert_eq!(body["pix_code"], "00020126580014br.gov.bcb.pix0136abc");
    assert_eq!(body["amount"], 6473);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["qr_code"], "data:image/png;base64,iVBORw0KGgo");
    assert_eq!(body["pix_qr_code"], body["qr_code"]);

    let leads = store.leads();
    assert_eq!(leads.len(), 2);
    assert_eq!(leads[0].source.as_deref(), Some("payment_request"));
    assert_eq!(leads[0].transaction_id.as_deref(), Some(""));
    assert_eq!(leads[0].amount_cents, Some(6473));
    assert_eq!(leads[1].source.as_deref(), Some("payment_response"));
    assert_eq!(leads[1].transaction_id.as_deref(), Some("bc_tx_1"));
    assert_eq!(leads[1].status.as_deref(), Some("PENDING"));

    let tracking: Value = serde_json::from_str(leads[0].tracking.as_deref().unwrap()).unwrap();
    assert_eq!(tracking, json!({"utm": {"utm_source": "google"}, "src": "ads"}));
    assert_eq!(leads[1].tracking, leads[0].tracking);
}

#[tokio::test]
async fn test_payment_missing_nome_is_rejected_before_any_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blackcat_success()))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config(&server.uri()), Some(store.clone()));

    let (status, body) = send(
        &app,
        json_request("POST", "/payment", json!({"email": "ana@example.com"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(store.leads().is_empty());
}

#[tokio::test]
async fn test_payment_amount_below_minimum_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blackcat_success()))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config(&server.uri()), Some(store.clone()));

    let mut body = payment_body();
    body["amount"] = json!("0,50");
    let (status, _) = send(&app, json_request("POST", "/payment", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.leads().is_empty());
}

#[tokio::test]
async fn test_payment_without_credentials_fails_before_validation() {
    let mut config = test_config("http://127.0.0.1:9");
    config.blackcat.api_key = None;
    let app = build_app(config, None);

    let (status, body) = send(&app, json_request("POST", "/payment", json!({}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_payment_upstream_error_is_502() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sales/create-sale"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "Internal gateway error"})),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config(&server.uri()), Some(store.clone()));

    let (status, body) = send(&app, json_request("POST", "/payment", payment_body())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Internal gateway error");
    // pre-call lead only
    assert_eq!(store.leads().len(), 1);
}

#[tokio::test]
async fn test_payment_works_without_database() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sales/create-sale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blackcat_success()))
        .mount(&server)
        .await;

    let app = build_app(test_config(&server.uri()), None);
    let (status, body) = send(&app, json_request("POST", "/payment", payment_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction_id"], "bc_tx_1");
}

#[tokio::test]
async fn test_payment_amount_above_ceiling_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blackcat_success()))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config(&server.uri()), Some(store.clone()));

    let mut body = payment_body();
    body["amount"] = json!(1e20);
    let (status, body) = send(&app, json_request("POST", "/payment", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap_or_default().contains("maximum"));
    assert!(store.leads().is_empty());
}

#[tokio::test]
async fn test_payment_succeeds_when_lead_writes_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sales/create-sale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blackcat_success()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::unavailable());
    let app = build_app(test_config(&server.uri()), Some(store.clone()));

    let (status, body) = send(&app, json_request("POST", "/payment", payment_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["transaction_id"], "bc_tx_1");
    assert_eq!(body["pix_code"], "00020126580014br.gov.bcb.pix0136abc");
    assert_eq!(body["amount"], 6473);
    assert_eq!(body["qr_code"], "data:image/png;base64,iVBORw0KGgo");
    assert!(store.leads().is_empty());
}

#[tokio::test]
async fn test_payment_malformed_json_uses_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blackcat_success()))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config(&server.uri()), Some(store.clone()));

    let (status, body) = send(
        &app,
        raw_request("/payment", "{not json", Some("application/json")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "message": "Invalid JSON body"}));
    assert!(store.leads().is_empty());
}

#[tokio::test]
async fn test_payment_accepts_json_without_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sales/create-sale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blackcat_success()))
        .expect(2)
        .mount(&server)
        .await;

    let app = build_app(test_config(&server.uri()), None);
    let raw = payment_body().to_string();

    for content_type in [None, Some("text/plain;charset=UTF-8")] {
        let (status, body) = send(&app, raw_request("/payment", &raw, content_type)).await;
        assert_eq!(status, StatusCode::OK, "{:?}", content_type);
        assert_eq!(body["transaction_id"], "bc_tx_1");
    }
}

// ============ GET /payment/status ============

#[tokio::test]
async fn test_payment_status_reports_gateway_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sales/bc_tx_1/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "bc_tx_1", "status": "PAID"}})),
        )
        .mount(&server)
        .await;

    let app = build_app(test_config(&server.uri()), None);
    let (status, body) = send(&app, get_request("/payment/status?id=bc_tx_1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "PAID");
    assert_eq!(body["transaction"]["id"], "bc_tx_1");
}

#[tokio::test]
async fn test_payment_status_relays_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sales/unknown/status"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
        .mount(&server)
        .await;

    let app = build_app(test_config(&server.uri()), None);
    let (status, body) = send(&app, get_request("/payment/status?transaction_id=unknown")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["response"]["status"], 404);
    assert_eq!(body["response"]["data"]["message"], "not found");
}

#[tokio::test]
async fn test_payment_status_requires_id() {
    let app = build_app(test_config("http://127.0.0.1:9"), None);
    let (status, _) = send(&app, get_request("/payment/status")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============ POST /{gateway}/webhook ============

#[tokio::test]
async fn test_paid_webhook_is_idempotent_and_reports_conversion() {
    let utmify = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("x-api-token", "utm_token"))
        .and(body_partial_json(json!({
            "orderId": "T1",
            "platform": "Blackcat",
            "status": "paid",
            "trackingParameters": {"utm_source": "google", "src": "ads"},
            "commission": {"totalPriceInCents": 6473}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(2)
        .mount(&utmify)
        .await;

    let mut config = test_config("http://127.0.0.1:9");
    config.utmify.api_token = Some("utm_token".to_string());
    config.utmify.base_url = format!("{}/orders", utmify.uri());

    let store = Arc::new(MemoryStore::default());
    store.seed_pending_transaction("T1");
    store.seed_pending_transaction("OTHER");
    let app = build_app(config, Some(store.clone()));

    let postback = json!({"event": "transaction.paid", "transactionId": "T1"});
    for _ in 0..2 {
        let (status, body) = send(&app, json_request("POST", "/blackcat/webhook", postback.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
    }

    let leads = store.leads();
    assert_eq!(leads[0].status.as_deref(), Some("PAID"));
    assert_eq!(leads[1].status.as_deref(), Some("PENDING"));
    let receipts = store.receipts();
    assert_eq!(receipts[0].status.as_deref(), Some("paid"));
    assert_eq!(receipts[1].status, None);
}

#[tokio::test]
async fn test_non_paid_webhook_is_ignored() {
    let store = Arc::new(MemoryStore::default());
    store.seed_pending_transaction("T2");
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store.clone()));

    let postback = json!({"event": "transaction.created", "data": {"id": "T2", "status": "pending"}});
    let (status, body) = send(&app, json_request("POST", "/freepay/webhook", postback)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(store.leads()[0].status.as_deref(), Some("PENDING"));
}

#[tokio::test]
async fn test_freepay_payment_paid_event_marks_paid() {
    let store = Arc::new(MemoryStore::default());
    store.seed_pending_transaction("fp_9");
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store.clone()));

    let postback = json!({"event": "payment.paid", "data": {"id": "fp_9"}});
    let (status, _) = send(&app, json_request("POST", "/freepay/webhook", postback)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.leads()[0].status.as_deref(), Some("PAID"));
}

#[tokio::test]
async fn test_webhook_without_content_type_still_marks_paid() {
    let store = Arc::new(MemoryStore::default());
    store.seed_pending_transaction("T1");
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store.clone()));

    let (status, body) = send(
        &app,
        raw_request("/freepay/webhook", r#"{"event":"payment.paid","id":"T1"}"#, None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
    assert_eq!(store.leads()[0].status.as_deref(), Some("PAID"));
    assert_eq!(store.receipts()[0].status.as_deref(), Some("paid"));
}

#[tokio::test]
async fn test_webhook_garbage_body_is_400_envelope() {
    let store = Arc::new(MemoryStore::default());
    store.seed_pending_transaction("T1");
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store.clone()));

    let (status, body) = send(
        &app,
        raw_request("/blackcat/webhook", "event=transaction.paid", Some("application/x-www-form-urlencoded")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(store.leads()[0].status.as_deref(), Some("PENDING"));
}

#[tokio::test]
async fn test_paid_webhook_with_failing_store_is_500_for_retry() {
    let store = Arc::new(MemoryStore::unavailable());
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/blackcat/webhook",
            json!({"event": "transaction.paid", "transactionId": "T1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unknown_gateway_webhook_is_404() {
    let app = build_app(test_config("http://127.0.0.1:9"), None);
    let (status, _) = send(
        &app,
        json_request("POST", "/stripe/webhook", json!({"event": "transaction.paid", "id": "X"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============ POST /leads/save ============

#[tokio::test]
async fn test_save_lead_normalizes_and_stores() {
    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store.clone()));

    let mut request = json_request(
        "POST",
        "/leads/save",
        json!({
            "cpf": "123.456.789-01",
            "nome": "  Ana  ",
            "phone": "(11) 99999-8888",
            "nomeMae": " Maria ",
            "tracking": {"utm_source": "tiktok"}
        }),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.5".parse().unwrap());
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let lead = &store.leads()[0];
    assert_eq!(lead.source.as_deref(), Some("funnel"));
    assert_eq!(lead.cpf.as_deref(), Some("12345678901"));
    assert_eq!(lead.nome.as_deref(), Some("Ana"));
    assert_eq!(lead.phone.as_deref(), Some("11999998888"));
    assert_eq!(lead.title.as_deref(), Some("Lead Funil"));
    assert_eq!(lead.status.as_deref(), Some("LEAD"));
    assert_eq!(lead.ip.as_deref(), Some("203.0.113.5"));
    let tracking: Value = serde_json::from_str(lead.tracking.as_deref().unwrap()).unwrap();
    assert_eq!(tracking, json!({"utm_source": "tiktok", "nome_mae": "Maria"}));
}

#[tokio::test]
async fn test_save_lead_without_identity_is_400() {
    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store.clone()));

    let (status, _) = send(
        &app,
        json_request("POST", "/leads/save", json!({"cpf": "---", "nome": "   "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.leads().is_empty());
}

#[tokio::test]
async fn test_save_lead_malformed_json_is_400_envelope() {
    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store.clone()));

    let (status, body) = send(&app, raw_request("/leads/save", "nome=Ana", None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "message": "Invalid JSON body"}));
    assert!(store.leads().is_empty());
}

#[tokio::test]
async fn test_save_lead_accepts_string_amount() {
    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store.clone()));

    let (status, _) = send(
        &app,
        json_request("POST", "/leads/save", json!({"nome": "Ana", "amount_cents": "6473"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.leads()[0].amount_cents, Some(6473));
}

#[tokio::test]
async fn test_save_lead_without_database_is_500() {
    let app = build_app(test_config("http://127.0.0.1:9"), None);
    let (status, body) = send(&app, json_request("POST", "/leads/save", json!({"nome": "Ana"}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Database not configured");
}

// ============ Admin ============

#[tokio::test]
async fn test_admin_endpoints_require_token() {
    let mut config = test_config("http://127.0.0.1:9");
    config.admin_token = Some("s3cret".to_string());
    let store = Arc::new(MemoryStore::default());
    store.seed_pending_transaction("T1");
    let app = build_app(config, Some(store));

    let (status, body) = send(&app, get_request("/comprovantes/list?token=wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Unauthorized");

    let (status, _) = send(&app, get_request("/comprovantes/export")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri("/comprovantes/list?limit=10")
        .header("x-admin-token", "s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["transaction_id"], "T1");
}

#[tokio::test]
async fn test_export_returns_csv_of_receipts_and_leads() {
    let store = Arc::new(MemoryStore::default());
    store.seed_pending_transaction("T1");
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store));

    let response = app
        .clone()
        .oneshot(get_request("/comprovantes/export"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=comprovantes.csv"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "id,created_at,transaction_id,customer_name,customer_cpf,customer_email,customer_phone,status,file_url,source"
    );
    assert_eq!(lines.len(), 3);
    // receipt is newer than the seeded lead
    assert!(lines[1].ends_with(",comprovante"));
    assert!(lines[2].ends_with(",,lead"));
}

#[tokio::test]
async fn test_admin_without_database_is_500() {
    let app = build_app(test_config("http://127.0.0.1:9"), None);
    let (status, _) = send(&app, get_request("/comprovantes/list")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// ============ GET /qr ============

#[tokio::test]
async fn test_qr_proxy_streams_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/qr/abc.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"),
        )
        .mount(&server)
        .await;

    let app = build_app(test_config("http://127.0.0.1:9"), None);
    let uri = format!("/qr?u={}/qr/abc.png", server.uri());
    let response = app.clone().oneshot(get_request(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["cache-control"], "public, max-age=300");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_qr_proxy_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let app = build_app(test_config("http://127.0.0.1:9"), None);

    let (status, body) = send(&app, get_request("/qr")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing url"}));

    let (status, body) = send(&app, get_request("/qr?u=ftp://example.com/a.png")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid url"}));

    let (status, body) = send(&app, get_request(&format!("/qr?u={}/missing.png", server.uri()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Failed to fetch QR"}));
}

// ============ POST /comprovantes/upload ============

fn multipart_body(boundary: &str, with_file: bool) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("transaction_id", "T1"), ("customer_name", "Ana Souza")] {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    if with_file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"comprovante\"; filename=\"recibo pix.png\"\r\nContent-Type: image/png\r\n\r\n",
                boundary
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0, 1, 2, 3]);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

fn upload_request(body: Vec<u8>, boundary: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/comprovantes/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_stores_blob_and_receipt() {
    let blob = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/comprovantes/.+_recibo_pix\.png$"))
        .and(header("authorization", "Bearer blob_token"))
        .and(header("x-content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://blob.example.com/comprovantes/2025_recibo_pix.png",
            "pathname": "comprovantes/2025_recibo_pix.png"
        })))
        .expect(1)
        .mount(&blob)
        .await;

    let mut config = test_config("http://127.0.0.1:9");
    config.blob.token = Some("blob_token".to_string());
    config.blob.base_url = blob.uri();
    let store = Arc::new(MemoryStore::default());
    let app = build_app(config, Some(store.clone()));

    let boundary = "X-CHECKOUT-BOUNDARY";
    let (status, body) = send(&app, upload_request(multipart_body(boundary, true), boundary)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["url"], "https://blob.example.com/comprovantes/2025_recibo_pix.png");

    let receipts = store.receipts();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].transaction_id.as_deref(), Some("T1"));
    assert_eq!(receipts[0].customer_name.as_deref(), Some("Ana Souza"));
    assert_eq!(receipts[0].file_name.as_deref(), Some("2025_recibo_pix.png"));
    assert_eq!(receipts[0].size_bytes, Some(8));
    assert_eq!(receipts[0].mimetype.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn test_upload_without_file_is_400() {
    let mut config = test_config("http://127.0.0.1:9");
    config.blob.token = Some("blob_token".to_string());
    let store = Arc::new(MemoryStore::default());
    let app = build_app(config, Some(store.clone()));

    let boundary = "X-CHECKOUT-BOUNDARY";
    let (status, _) = send(&app, upload_request(multipart_body(boundary, false), boundary)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.receipts().is_empty());
}

#[tokio::test]
async fn test_upload_without_blob_storage_is_500() {
    let store = Arc::new(MemoryStore::default());
    let app = build_app(test_config("http://127.0.0.1:9"), Some(store));

    let boundary = "X-CHECKOUT-BOUNDARY";
    let (status, _) = send(&app, upload_request(multipart_body(boundary, true), boundary)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health() {
    let app = build_app(test_config("http://127.0.0.1:9"), None);
    let (status, body) = send(&app, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["gateway"], "blackcat");
}
