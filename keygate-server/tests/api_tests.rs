use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, routing::post};
use keygate_activation::{ActivationStore, Notifier, TelegramSink};
use keygate_server::{AppState, ServerConfig, build_router};
use serde_json::{Value, json};

fn test_state(notifier: Notifier, config: ServerConfig) -> AppState {
    AppState::new(
        Arc::new(ActivationStore::open_in_memory().unwrap()),
        Arc::new(notifier),
        config,
    )
}

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
async fn spawn_server(state: AppState) -> String {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

type SentMessages = Arc<Mutex<Vec<String>>>;

async fn fake_send_message(State(sent): State<SentMessages>, Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    sent.lock().unwrap().push(text);
    Json(json!({"ok": true}))
}

/// Stand-in for the Telegram Bot API that records every message text.
async fn spawn_fake_telegram() -> (String, SentMessages) {
    let sent: SentMessages = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/bot{token}/sendMessage", post(fake_send_message))
        .with_state(sent.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://127.0.0.1:{}", port), sent)
}

fn code_from_message(msg: &str) -> String {
    msg.lines()
        .find_map(|l| l.strip_prefix("Code: "))
        .expect("message carries a Code line")
        .to_string()
}

#[tokio::test]
async fn full_activation_flow_end_to_end() {
    let (api_base, sent) = spawn_fake_telegram().await;
    let sink = TelegramSink::with_api_base("TESTTOKEN".into(), "42".into(), api_base).unwrap();
    let state = test_state(Notifier::Telegram(sink), ServerConfig::default());
    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    // Request a code for a fresh hwid.
    let resp = client
        .post(format!("{base}/request_activation"))
        .json(&json!({"hwid": "HW-1", "device_name": "Laptop"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["sent_to_admin"], json!(true));

    // The operator message carries the plaintext code; the API never does.
    let code = {
        let msgs = sent.lock().unwrap();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("HWID: HW-1"));
        assert!(msgs[0].contains("Device: Laptop"));
        code_from_message(&msgs[0])
    };
    assert_eq!(code.len(), 12);

    // Pending listing shows one row with a truncated sample.
    let rows: Value = client
        .get(format!("{base}/admin/list_pending"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["hwid"], json!("HW-1"));
    assert_eq!(rows[0]["code_sample"], json!(format!("{}...", &code[..4])));

    // Redeem the code.
    let resp = client
        .post(format!("{base}/verify_activation"))
        .json(&json!({"hwid": "HW-1", "activation_code": code, "device_name": "Laptop"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], json!(true));
    assert!(body["activated_at"].is_i64());

    // Pending is gone, activation is listed.
    let rows: Value = client
        .get(format!("{base}/admin/list_pending"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(rows.as_array().unwrap().is_empty());
    let rows: Value = client
        .get(format!("{base}/admin/list_activations"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rows[0]["hwid"], json!("HW-1"));

    // The same code cannot redeem twice.
    let resp = client
        .post(format!("{base}/verify_activation"))
        .json(&json!({"hwid": "HW-1", "activation_code": code, "device_name": "Laptop"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // An activated device cannot be re-pended.
    let resp = client
        .post(format!("{base}/request_activation"))
        .json(&json!({"hwid": "HW-1", "device_name": "Laptop"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], json!("already_activated"));
}

#[tokio::test]
async fn request_reports_failed_delivery() {
    let state = test_state(Notifier::Disabled, ServerConfig::default());
    let base = spawn_server(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/request_activation"))
        .json(&json!({"hwid": "HW-1", "device_name": "Laptop"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    // The code is still issued and redeemable; only delivery failed.
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["sent_to_admin"], json!(false));
}

#[tokio::test]
async fn malformed_json_rejected() {
    let state = test_state(Notifier::Disabled, ServerConfig::default());
    let base = spawn_server(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/request_activation"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], json!("invalid_json"));
}

#[tokio::test]
async fn missing_fields_rejected() {
    let state = test_state(Notifier::Disabled, ServerConfig::default());
    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/request_activation"))
        .json(&json!({"device_name": "Laptop"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], json!("missing_hwid"));

    let resp = client
        .post(format!("{base}/verify_activation"))
        .json(&json!({"hwid": "HW-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], json!("missing_fields"));
}

#[tokio::test]
async fn verify_without_pending_request_is_404() {
    let state = test_state(Notifier::Disabled, ServerConfig::default());
    let base = spawn_server(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/verify_activation"))
        .json(&json!({"hwid": "HW-404", "activation_code": "ABCDEFGHJKLM"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], json!("no_pending_request"));
}

#[tokio::test]
async fn wrong_code_is_403_and_pending_survives() {
    let state = test_state(Notifier::Disabled, ServerConfig::default());
    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/request_activation"))
        .json(&json!({"hwid": "HW-1", "device_name": "Laptop"}))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{base}/verify_activation"))
        .json(&json!({"hwid": "HW-1", "activation_code": "WRONGWRONGWR"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], json!("invalid_code"));

    let rows: Value = client
        .get(format!("{base}/admin/list_pending"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_routes_require_bearer_token_when_configured() {
    let config = ServerConfig {
        admin_token: Some("sekret".to_string()),
        ..ServerConfig::default()
    };
    let state = test_state(Notifier::Disabled, config);
    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/admin/list_pending"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{base}/admin/list_pending"))
        .header("authorization", "Bearer wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{base}/admin/list_activations"))
        .header("authorization", "Bearer sekret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Non-admin routes stay open.
    let resp = client
        .post(format!("{base}/request_activation"))
        .json(&json!({"hwid": "HW-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn healthz_and_unknown_routes() {
    let state = test_state(Notifier::Disabled, ServerConfig::default());
    let base = spawn_server(state).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/healthz")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{base}/nonexistent"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
