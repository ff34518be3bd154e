// End-to-end runs: configuration on disk, sources and sinks wired by the
// library, remote services replaced by a local HTTP/1.1 mock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use kinenbi_app::app;
use kinenbi_app::delivery::WebhookSink;
use kinenbi_app::config::*;
use kinenbi_core::{Anniversary, DeliveryError, Sink};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

// ===========================================================================
// Test helpers
// ===========================================================================

fn fixture_csv() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/anniversaries.csv")
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Scratch base directory with a kinenbi.toml pointing at the fixture CSV.
/// `extra` is appended to the generated settings.
fn base_dir(name: &str, days: u32, extra: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("kinenbi_e2e_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("config")).unwrap();
    let settings = format!(
        "[dataset]\npath = {:?}\n\n[schedule]\ndays = {days}\n\n[http]\ntimeout_secs = 5\n{extra}",
        fixture_csv().display().to_string()
    );
    std::fs::write(dir.join(CONFIG_FILE), settings).unwrap();
    dir
}

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Default)]
struct CollectingSink {
    delivered: Mutex<Vec<Anniversary>>,
}

impl CollectingSink {
    fn lines(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|a| format!("{} {}", a.date, a))
            .collect()
    }
}

#[async_trait]
impl Sink for CollectingSink {
    async fn deliver(&self, anniversary: &Anniversary) -> Result<(), DeliveryError> {
        self.delivered.lock().unwrap().push(anniversary.clone());
        Ok(())
    }
}

/// A request seen by the mock server: path and body.
type Seen = Arc<Mutex<Vec<(String, String)>>>;

/// Read one full HTTP request (headers plus `Content-Length` body).
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve requests until aborted, answering by exact path from `routes`
/// (path -> status line, body). Unknown paths get a 404.
async fn spawn_mock(routes: Vec<(&'static str, &'static str, String)>) -> (SocketAddr, Seen, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_server = seen.clone();

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut socket).await;
            let path = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("")
                .to_string();
            let body = request
                .split_once("\r\n\r\n")
                .map(|(_, b)| b.to_string())
                .unwrap_or_default();
            seen_by_server.lock().unwrap().push((path.clone(), body));

            let (status_line, response_body) = routes
                .iter()
                .find(|(p, _, _)| *p == path)
                .map(|(_, s, b)| (*s, b.clone()))
                .unwrap_or(("404 Not Found", String::new()));

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response_body}",
                response_body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.flush().await;
        }
    });

    (addr, seen, handle)
}

fn completion_body(content: &str) -> String {
    serde_json::json!({
        "choices": [ { "message": { "role": "assistant", "content": content } } ]
    })
    .to_string()
}

// ===========================================================================
// Record store only
// ===========================================================================

#[tokio::test]
async fn record_only_single_day_returns_exactly_the_matching_rows() {
    let dir = base_dir("record_only", 1, "");
    let config = load_config_from(&dir, &HashMap::new()).unwrap();

    let sink = CollectingSink::default();
    let report = app::run_with_sink(&config, ymd(2025, 3, 14), &sink).await.unwrap();

    let delivered = sink.delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].title, "Pi Day");
    assert_eq!(delivered[1].title, "ホワイトデー");
    assert!(delivered.iter().all(|a| a.source == "Static CSV"));
    assert!(delivered.iter().all(|a| a.date == ymd(2025, 3, 14)));

    assert_eq!(report.lookups, 1);
    assert_eq!(report.failed_lookups, 0);
    assert_eq!(report.emitted, 2);
}

#[tokio::test]
async fn record_only_week_walks_seven_consecutive_days() {
    let dir = base_dir("record_week", 7, "");
    let config = load_config_from(&dir, &HashMap::new()).unwrap();

    let sink = CollectingSink::default();
    let report = app::run_with_sink(&config, ymd(2025, 12, 31), &sink).await.unwrap();

    // 12-31 .. 1-06 covers only the 1-01 row.
    assert_eq!(report.lookups, 7);
    assert_eq!(
        sink.lines(),
        vec!["2026-01-01 [Static CSV] 元日: 年のはじめを祝う国民の祝日"]
    );
}

#[tokio::test]
async fn missing_dataset_is_logged_not_fatal() {
    let dir = std::env::temp_dir().join("kinenbi_e2e_missing_dataset");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let config = load_config_from(&dir, &HashMap::new()).unwrap();

    let sink = CollectingSink::default();
    let report = app::run_with_sink(&config, ymd(2025, 3, 14), &sink).await.unwrap();
    assert_eq!(report.lookups, 7);
    assert_eq!(report.failed_lookups, 7);
    assert!(sink.lines().is_empty());
}

// ===========================================================================
// Generative sources
// ===========================================================================

#[tokio::test]
async fn generative_sources_follow_the_record_store_and_fail_in_isolation() {
    let (addr, seen, server) = spawn_mock(vec![
        ("/openai/chat/completions", "200 OK", completion_body("生成された説明")),
        ("/pplx/chat/completions", "500 Internal Server Error", "boom".to_string()),
    ])
    .await;

    let extra = format!(
        "\n[providers.chatgpt]\nbase_url = \"http://{addr}/openai\"\nmodel = \"gpt-test\"\n\n[providers.perplexity]\nbase_url = \"http://{addr}/pplx\"\nmodel = \"sonar-test\"\n"
    );
    let dir = base_dir("generative", 2, &extra);
    let config = load_config_from(
        &dir,
        &env(&[(ENV_OPENAI_API_KEY, "sk-test"), (ENV_PERPLEXITY_API_KEY, "pplx-test")]),
    )
    .unwrap();

    let sink = CollectingSink::default();
    let report = app::run_with_sink(&config, ymd(2025, 3, 14), &sink).await.unwrap();
    server.abort();

    assert_eq!(
        sink.lines(),
        vec![
            "2025-03-14 [Static CSV] Pi Day: Celebrates π and the mathematical constant 3.14",
            "2025-03-14 [Static CSV] ホワイトデー: バレンタインデーのお返しをする日",
            "2025-03-14 [ChatGPT] 3月14日の出来事: 生成された説明",
            "2025-03-15 [ChatGPT] 3月15日の出来事: 生成された説明",
        ]
    );
    assert_eq!(report.lookups, 6);
    assert_eq!(report.failed_lookups, 2);

    let seen = seen.lock().unwrap();
    let paths: Vec<&str> = seen.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/openai/chat/completions",
            "/pplx/chat/completions",
            "/openai/chat/completions",
            "/pplx/chat/completions",
        ]
    );
    let first: serde_json::Value = serde_json::from_str(&seen[0].1).unwrap();
    assert_eq!(first["model"], "gpt-test");
    let second: serde_json::Value = serde_json::from_str(&seen[1].1).unwrap();
    assert_eq!(second["model"], "sonar-test");
}

// ===========================================================================
// Webhook delivery
// ===========================================================================

#[tokio::test]
async fn webhook_receives_one_post_per_anniversary_in_order() {
    let (addr, seen, server) = spawn_mock(vec![("/hook", "204 No Content", String::new())]).await;

    let dir = base_dir("webhook", 1, "");
    let hook = format!("http://{addr}/hook");
    let config = load_config_from(&dir, &env(&[(ENV_WEBHOOK_URL, hook.as_str())])).unwrap();
    assert!(!config.delivers_to_console());

    let report = app::run(&config, ymd(2025, 3, 14)).await.unwrap();
    server.abort();

    assert_eq!(report.emitted, 2);
    assert_eq!(report.failed_deliveries, 0);

    let seen = seen.lock().unwrap();
    let contents: Vec<String> = seen
        .iter()
        .map(|(path, body)| {
            assert_eq!(path, "/hook");
            let json: serde_json::Value = serde_json::from_str(body).unwrap();
            json["content"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        contents,
        vec![
            "[Static CSV] Pi Day: Celebrates π and the mathematical constant 3.14",
            "[Static CSV] ホワイトデー: バレンタインデーのお返しをする日",
        ]
    );
}

#[tokio::test]
async fn webhook_rejections_are_counted_and_the_run_completes() {
    let (addr, seen, server) =
        spawn_mock(vec![("/hook", "400 Bad Request", r#"{"message":"bad"}"#.to_string())]).await;

    let dir = base_dir("webhook_rejects", 1, "");
    let hook = format!("http://{addr}/hook");
    let config = load_config_from(&dir, &env(&[(ENV_WEBHOOK_URL, hook.as_str())])).unwrap();

    let report = app::run(&config, ymd(2025, 3, 14)).await.unwrap();
    server.abort();

    assert_eq!(report.emitted, 2);
    assert_eq!(report.failed_deliveries, 2);
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn webhook_rejection_with_truncated_body_keeps_the_read_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;
        // Promises 64 bytes, sends 7, then hangs up.
        let _ = socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 64\r\n\r\npartial")
            .await;
        let _ = socket.shutdown().await;
    });

    let sink = WebhookSink::new(format!("http://{addr}/hook"), std::time::Duration::from_secs(5)).unwrap();
    let anniversary = Anniversary::new(ymd(2025, 3, 14), "Pi Day", "Celebrates π", "Static CSV");
    let err = sink.deliver(&anniversary).await.unwrap_err();
    server.await.unwrap();

    match err {
        DeliveryError::Status { status, body } => {
            assert_eq!(status, 500);
            assert!(body.starts_with("<unreadable body: "), "body: {body}");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn dry_run_never_touches_the_webhook() {
    let (addr, seen, server) = spawn_mock(vec![("/hook", "204 No Content", String::new())]).await;

    let dir = base_dir("dry_run", 1, "");
    let hook = format!("http://{addr}/hook");
    let config = load_config_from(
        &dir,
        &env(&[
            (ENV_WEBHOOK_URL, hook.as_str()),
            (ENV_DRY_RUN, "true"),
        ]),
    )
    .unwrap();

    let report = app::run(&config, ymd(2025, 3, 14)).await.unwrap();
    server.abort();

    assert_eq!(report.emitted, 2);
    assert_eq!(report.failed_deliveries, 0);
    assert!(seen.lock().unwrap().is_empty());
}

// ===========================================================================
// Shipped dataset
// ===========================================================================

#[tokio::test]
async fn shipped_dataset_answers_pi_day() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let mut config = load_config_from(&root, &HashMap::new()).unwrap();
    config.days = 1;

    let sink = CollectingSink::default();
    app::run_with_sink(&config, ymd(2026, 3, 14), &sink).await.unwrap();
    assert_eq!(
        sink.lines(),
        vec![
            "2026-03-14 [Static CSV] 円周率の日: 円周率3.14にちなんで数学を楽しむ日",
            "2026-03-14 [Static CSV] ホワイトデー: バレンタインデーのお返しをする日",
        ]
    );
}
