use std::path::Path;

use claude_settings::server::{serve, ServerState};
use claude_settings::SettingsStore;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    base: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(settings_path: &Path) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (tx, rx) = oneshot::channel::<()>();
        let state = ServerState::new(SettingsStore::new(settings_path));
        let handle = tokio::spawn(serve(listener, state, async move {
            let _ = rx.await;
        }));
        Self {
            base: format!("http://{addr}"),
            shutdown: Some(tx),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("join").expect("serve");
    }
}

#[tokio::test]
async fn health_reports_the_settings_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    let server = TestServer::start(&path).await;

    let body: Value = reqwest::get(server.url("/health"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["settingsPath"], json!(path.display().to_string()));

    server.stop().await;
}

#[tokio::test]
async fn get_then_post_settings_merges_into_the_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    let server = TestServer::start(&path).await;
    let client = reqwest::Client::new();

    let initial: Value = client
        .get(server.url("/api/settings"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(initial["permissions"]["defaultMode"], json!("acceptEdits"));

    let response = client
        .post(server.url("/api/settings"))
        .json(&json!({ "env": { "ANTHROPIC_AUTH_TOKEN": "tok_123" } }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let saved: Value = response.json().await.expect("json");
    assert_eq!(saved["success"], json!(true));
    assert_eq!(saved["settings"]["env"]["ANTHROPIC_AUTH_TOKEN"], json!("tok_123"));
    assert_eq!(
        saved["settings"]["env"]["ANTHROPIC_MODEL"],
        initial["env"]["ANTHROPIC_MODEL"]
    );

    let on_disk: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(on_disk, saved["settings"]);

    server.stop().await;
}

#[tokio::test]
async fn legacy_view_is_flat_and_clamped() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"model":"claude-legacy","max_tokens":1000000,"api_config":{"base_url":"https://gateway.local"}}"#,
    )
    .expect("seed");
    let server = TestServer::start(&path).await;

    let view: Value = reqwest::get(server.url("/api/settings/legacy"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(view["model"], json!("claude-legacy"));
    assert_eq!(view["max_tokens"], json!(8192));
    assert_eq!(view["anthropic_base_url"], json!("https://gateway.local"));
    assert_eq!(view["api_endpoint"], json!("https://gateway.local"));
    assert!(view.get("anthropic_auth_token").is_none());

    server.stop().await;
}

#[tokio::test]
async fn invalid_payloads_are_rejected_without_touching_the_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    std::fs::write(&path, r#"{"model":"keep-me"}"#).expect("seed");
    let server = TestServer::start(&path).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/settings"))
        .json(&json!({ "env": "ANTHROPIC_MODEL=x" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("json");
    assert!(body["error"].as_str().expect("message").contains("env"));

    let response = client
        .post(server.url("/api/settings"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(
        std::fs::read_to_string(&path).expect("read"),
        r#"{"model":"keep-me"}"#
    );

    server.stop().await;
}

#[tokio::test]
async fn corrupt_file_maps_to_conflict() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    std::fs::write(&path, "{not json").expect("seed");
    let server = TestServer::start(&path).await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("/api/settings"))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(server.url("/api/settings"))
        .json(&json!({ "model": "claude-x" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(std::fs::read_to_string(&path).expect("read"), "{not json");

    server.stop().await;
}

#[tokio::test]
async fn unknown_install_method_is_a_bad_request() {
    let temp = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(&temp.path().join("settings.json")).await;
    let client = reqwest::Client::new();

    for body in [json!({ "method": "pip" }), json!({})] {
        let response = client
            .post(server.url("/api/install"))
            .json(&body)
            .send()
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.expect("json");
        assert_eq!(body["error"], json!("Invalid installation method"));
    }

    server.stop().await;
}
