//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: config file → token + page requests →
//! row file (and JSON rendition)

use clap::Parser;
use dirflat::auth::{AuthConfig, Authenticator};
use dirflat::cli::{extract, Cli, Outcome, Runner};
use dirflat::config::ExtractConfig;
use dirflat::http::{HttpClient, HttpClientConfig};
use dirflat::pagination::{Paginator, PaginatorConfig, RetryPolicy, Terminal};
use dirflat::status::{RecordingNotifier, StatusEvent};
use dirflat::Error;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/contoso/oauth2/v2.0/token";

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "tok"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_page(
    server: &MockServer,
    param: (&str, &str),
    body: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param(param.0, param.1))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

fn write_config(server: &MockServer, dir: &Path, emit_json: bool) -> PathBuf {
    let yaml = format!(
        "api_base: {uri}\n\
         token_url: {uri}{TOKEN_PATH}\n\
         client_id: app-1\n\
         client_secret: s3cret\n\
         initial_path: /v1.0/users?$top=2\n\
         output_dir: {out}\n\
         emit_json: {emit_json}\n\
         retry:\n  \
           initial_backoff: 0\n",
        uri = server.uri(),
        out = dir.join("out").display(),
    );
    let path = dir.join("extract.yaml");
    fs::write(&path, yaml).unwrap();
    path
}

fn single_file(dir: &Path, extension: &str) -> PathBuf {
    let files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == extension))
        .collect();
    assert_eq!(files.len(), 1, "{files:?}");
    files.into_iter().next().unwrap()
}

async fn mount_three_pages(server: &MockServer) {
    let uri = server.uri();

    mount_page(
        server,
        ("$top", "2"),
        json!({
            "value": [
                {
                    "id": "u1",
                    "displayName": "Ada",
                    "businessPhones": ["555-1", "555-2"],
                    "manager": null,
                    "accountEnabled": true
                },
                {"id": "u2", "displayName": "Bob", "org": {"level1Code": "C1"}}
            ],
            "@odata.nextLink": format!("{uri}/v1.0/users?$skiptoken=p2")
        }),
    )
    .await;

    mount_page(
        server,
        ("$skiptoken", "p2"),
        json!({
            "value": [
                {"id": "u3", "assignedLicenses": [{"skuId": "s1"}, {"skuId": "s2"}]}
            ],
            "@odata.nextLink": format!("{uri}/v1.0/users?$skiptoken=p3")
        }),
    )
    .await;

    mount_page(server, ("$skiptoken", "p3"), json!({"value": []})).await;
}

// ============================================================================
// Extraction Tests
// ============================================================================

#[tokio::test]
async fn test_extract_three_pages() {
    let server = MockServer::start().await;
    mount_token(&server, 3).await;
    mount_three_pages(&server).await;

    let dir = TempDir::new().unwrap();
    let config = ExtractConfig::from_file(write_config(&server, dir.path(), true)).unwrap();
    let notifier = Arc::new(RecordingNotifier::new());

    let report = extract(&config, notifier.clone()).await.unwrap();

    assert_eq!(report.outcome(), Outcome::Completed);
    assert_eq!(report.summary.fetches, 3);
    assert_eq!(report.summary.pages, 3);
    assert_eq!(report.summary.records, 3);
    assert_eq!(report.summary.rows, 9);
    assert_eq!(report.summary.credentials, 3);
    assert_eq!(report.summary.retries, 0);

    let name = report.output.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("graphapi_users_") && name.ends_with(".txt"), "{name}");

    assert_eq!(
        fs::read_to_string(&report.output).unwrap(),
        "record_id\tkey\tvalue\n\
         u1\tdisplayName\tAda\n\
         u1\tbusinessPhones_1\t555-1\n\
         u1\tbusinessPhones_2\t555-2\n\
         u1\tmanager\tNone\n\
         u1\taccountEnabled\tTrue\n\
         u2\tdisplayName\tBob\n\
         u2\torg.level1Code\tC1\n\
         u3\tskuId\ts1\n\
         u3\tskuId\ts2\n"
    );

    let json_path = report.json_output.unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
    assert_eq!(
        value,
        json!({
            "u1": {
                "displayName": "Ada",
                "businessPhones_1": "555-1",
                "businessPhones_2": "555-2",
                "manager": "None",
                "accountEnabled": "True"
            },
            "u2": {"displayName": "Bob", "org.level1Code": "C1"},
            "u3": {"skuId": ["s1", "s2"]}
        })
    );

    let events = notifier.events();
    assert!(matches!(events.first(), Some(StatusEvent::RunStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(StatusEvent::RunFinished {
            pages: 3,
            records: 3,
            ..
        })
    ));
    let processed: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            StatusEvent::PageProcessed { records, .. } => Some(*records),
            _ => None,
        })
        .collect();
    assert_eq!(processed, vec![2, 1, 0]);
    assert!(!events.iter().any(StatusEvent::is_problem));
}

#[tokio::test]
async fn test_extract_fatal_status() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Authorization_RequestDenied"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = ExtractConfig::from_file(write_config(&server, dir.path(), true)).unwrap();
    let notifier = Arc::new(RecordingNotifier::new());

    let err = extract(&config, notifier.clone()).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 403, .. }));

    // header only, and no JSON rendition
    let txt = single_file(&dir.path().join("out"), "txt");
    assert_eq!(fs::read_to_string(txt).unwrap(), "record_id\tkey\tvalue\n");
    assert!(fs::read_dir(dir.path().join("out"))
        .unwrap()
        .all(|entry| entry.unwrap().path().extension().is_some_and(|e| e == "txt")));

    assert!(!notifier
        .events()
        .iter()
        .any(|e| matches!(e, StatusEvent::RunFinished { .. })));
}

#[tokio::test]
async fn test_extract_rejects_foreign_next_link() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_page(
        &server,
        ("$top", "2"),
        json!({
            "value": [{"id": "u1", "displayName": "Ada"}],
            "@odata.nextLink": "https://elsewhere.example.com/v1.0/users?$skiptoken=p2"
        }),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = ExtractConfig::from_file(write_config(&server, dir.path(), false)).unwrap();

    let err = extract(&config, Arc::new(RecordingNotifier::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedPage { .. }));

    // the first page was written before the link was followed
    let txt = single_file(&dir.path().join("out"), "txt");
    assert_eq!(
        fs::read_to_string(txt).unwrap(),
        "record_id\tkey\tvalue\nu1\tdisplayName\tAda\n"
    );
}

#[tokio::test]
async fn test_extract_token_failure_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = ExtractConfig::from_file(write_config(&server, dir.path(), false)).unwrap();

    let err = extract(&config, Arc::new(RecordingNotifier::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OAuth2 { .. }));
}

// ============================================================================
// CLI Tests
// ============================================================================

#[tokio::test]
async fn test_runner_extract_with_overrides() {
    let server = MockServer::start().await;
    mount_token(&server, 3).await;
    mount_three_pages(&server).await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&server, dir.path(), false);
    let out_dir = dir.path().join("override");

    let cli = Cli::try_parse_from([
        "dirflat",
        "--config",
        config_path.to_str().unwrap(),
        "extract",
        "--output-dir",
        out_dir.to_str().unwrap(),
        "--json",
    ])
    .unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let outcome = Runner::new(cli)
        .with_notifier(notifier.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Completed);
    let txt = single_file(&out_dir, "txt");
    assert_eq!(fs::read_to_string(txt).unwrap().lines().count(), 10);
    single_file(&out_dir, "json");
    assert!(!dir.path().join("out").exists());
}

#[tokio::test]
async fn test_runner_reports_fatal_errors() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(&server, dir.path(), false);
    let cli = Cli::try_parse_from(["dirflat", "-C", config_path.to_str().unwrap(), "extract"])
        .unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let err = Runner::new(cli)
        .with_notifier(notifier.clone())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
    assert!(matches!(
        notifier.events().last(),
        Some(StatusEvent::Fatal { .. })
    ));
}

// ============================================================================
// Dropped Connection Tests
// ============================================================================

/// Serve every connection a 200 whose body stops short of its declared
/// length, then close the socket
async fn serve_truncated_page() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let accepted = Arc::clone(&connections);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{\"value\":[{\"id\":\"1\"},",
                    )
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), connections)
}

#[tokio::test]
async fn test_paginator_self_terminates_on_dropped_connection() {
    let (base_url, connections) = serve_truncated_page().await;

    let client = HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url(&base_url)
            .timeout(Duration::from_secs(10))
            .build(),
    )
    .unwrap();
    let tokens = Authenticator::new(AuthConfig::Bearer {
        token: "tok".to_string(),
    });
    let config = PaginatorConfig {
        api_base: base_url.clone(),
        retry: RetryPolicy::immediate(5),
        ..PaginatorConfig::default()
    };
    let notifier = Arc::new(RecordingNotifier::new());
    let paginator = Paginator::new(Arc::new(client), Arc::new(tokens), config)
        .with_notifier(notifier.clone());

    let mut pages = 0;
    let summary = paginator
        .run("/v1.0/users", |_page| {
            pages += 1;
            Ok(0)
        })
        .await
        .unwrap();

    assert_eq!(summary.terminal, Terminal::Failed { attempts: 5 });
    assert_eq!(summary.fetches, 1);
    assert_eq!(summary.retries, 4);
    assert_eq!(pages, 0);
    // the same response is re-read; no second request is sent
    assert_eq!(connections.load(Ordering::SeqCst), 1);

    let events = notifier.events();
    let retrying = events
        .iter()
        .filter(|e| matches!(e, StatusEvent::Retrying { .. }))
        .count();
    assert_eq!(retrying, 5);
    assert!(!events
        .iter()
        .any(|e| matches!(e, StatusEvent::SelfHealed { .. })));
    assert!(matches!(
        events.last(),
        Some(StatusEvent::SelfTerminated { attempts: 5 })
    ));
}

#[tokio::test]
async fn test_extract_self_terminates_with_exit_code_two() {
    let (base_url, _) = serve_truncated_page().await;
    let dir = TempDir::new().unwrap();

    let config = ExtractConfig {
        api_base: base_url,
        access_token: Some("tok".to_string()),
        initial_path: "/v1.0/users".to_string(),
        output_dir: dir.path().to_path_buf(),
        emit_json: true,
        retry: RetryPolicy::immediate(5),
        ..ExtractConfig::default()
    };

    let report = extract(&config, Arc::new(RecordingNotifier::new()))
        .await
        .unwrap();

    assert_eq!(report.outcome(), Outcome::SelfTerminated { attempts: 5 });
    assert_eq!(report.outcome().exit_code(), 2);
    assert_eq!(report.json_output, None);
    assert_eq!(
        fs::read_to_string(&report.output).unwrap(),
        "record_id\tkey\tvalue\n"
    );
}
