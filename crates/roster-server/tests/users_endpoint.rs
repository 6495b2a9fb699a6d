use std::path::{Path, PathBuf};
use std::sync::Arc;

use roster_server::{
    AppConfig, AppState, CacheBackend, CacheStore, RosterService, build_app,
};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const ACCOUNTS: &str = "name,age,country,phone,balance\n\
Ana,30,US,2025550123,-12.5\n\
Bo,41,GB,07400 123456,0\n\
Cy,n/a,US,555,\n";

struct TestServer {
    base: String,
    cache: CacheBackend,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

async fn start_server(source: &Path) -> TestServer {
    let mut config = AppConfig::default();
    config.source.path = source.to_path_buf();
    let cache = CacheBackend::new_local();
    let service = RosterService::new(&config, Arc::new(cache.clone()));
    let app = build_app(AppState::new(service));

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        cache,
        shutdown: tx,
        handle,
    }
}

fn write_source(dir: &Path, contents: &[u8]) -> PathBuf {
    let path = dir.join("accounts.csv");
    std::fs::write(&path, contents).expect("write source");
    path
}

#[tokio::test]
async fn serves_normalized_roster() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(&write_source(dir.path(), ACCOUNTS.as_bytes())).await;

    let resp = reqwest::get(format!("{}/api/users", server.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!([
            {"name": "Ana", "age": 30, "country": "US", "phone": "+12025550123", "balance": -12.5},
            {"name": "Bo", "age": 41, "country": "GB", "phone": "+447400123456", "balance": 0},
            {"name": "Cy", "age": "n/a", "country": "US", "phone": 555, "balance": ""}
        ])
    );

    server.stop().await;
}

#[tokio::test]
async fn field_order_follows_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(&write_source(dir.path(), b"zeta,alpha\n1,b\n")).await;

    let text = reqwest::get(format!("{}/api/users", server.base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(text, r#"[{"zeta":1,"alpha":"b"}]"#);

    server.stop().await;
}

#[tokio::test]
async fn second_request_is_identical_and_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_source(dir.path(), ACCOUNTS.as_bytes());
    let server = start_server(&path).await;
    let url = format!("{}/api/users", server.base);

    let first = reqwest::get(&url).await.unwrap();
    assert_eq!(first.headers()["x-roster-cache"], "miss");
    let first = first.bytes().await.unwrap();

    // The source is gone, so only the cache can answer.
    std::fs::remove_file(&path).unwrap();

    let second = reqwest::get(&url).await.unwrap();
    assert_eq!(second.status(), 200);
    assert_eq!(second.headers()["x-roster-cache"], "hit");
    assert_eq!(second.bytes().await.unwrap(), first);

    server.stop().await;
}

#[tokio::test]
async fn bom_does_not_change_the_output() {
    let plain_dir = tempfile::tempdir().unwrap();
    let bom_dir = tempfile::tempdir().unwrap();
    let mut with_bom = b"\xEF\xBB\xBF".to_vec();
    with_bom.extend_from_slice(ACCOUNTS.as_bytes());

    let plain = start_server(&write_source(plain_dir.path(), ACCOUNTS.as_bytes())).await;
    let bom = start_server(&write_source(bom_dir.path(), &with_bom)).await;

    let a = reqwest::get(format!("{}/api/users", plain.base))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let b = reqwest::get(format!("{}/api/users", bom.base))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(a, b);

    plain.stop().await;
    bom.stop().await;
}

#[tokio::test]
async fn missing_source_returns_500_and_leaves_cache_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.csv");
    let server = start_server(&path).await;

    let resp = reqwest::get(format!("{}/api/users", server.base)).await.unwrap();
    assert_eq!(resp.status(), 500);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("Failed to load accounts.csv because: "), "{body}");
    let io_text = std::fs::File::open(&path).unwrap_err().to_string();
    assert!(body.ends_with(&io_text), "{body}");

    assert_eq!(server.cache.get("users").await.unwrap(), None);

    server.stop().await;
}

#[tokio::test]
async fn unreadable_row_returns_500_and_leaves_cache_empty() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(&write_source(dir.path(), b"name,age\nAna,30\n\xFF\xFE,41\n")).await;

    let resp = reqwest::get(format!("{}/api/users", server.base)).await.unwrap();
    assert_eq!(resp.status(), 500);
    let body = resp.text().await.unwrap();
    assert!(
        body.starts_with("Failed to load accounts.csv because: failed to read record"),
        "{body}"
    );

    assert_eq!(server.cache.get("users").await.unwrap(), None);

    server.stop().await;
}

#[tokio::test]
async fn source_created_after_a_failure_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accounts.csv");
    let server = start_server(&path).await;
    let url = format!("{}/api/users", server.base);

    assert_eq!(reqwest::get(&url).await.unwrap().status(), 500);

    write_source(dir.path(), b"name\nAna\n");
    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!([{"name": "Ana"}]));

    server.stop().await;
}

#[tokio::test]
async fn responses_carry_request_ids() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(&write_source(dir.path(), b"name\n")).await;

    let resp = reqwest::Client::new()
        .get(format!("{}/api/users", server.base))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "req-42");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!([]));

    server.stop().await;
}
