//! End-to-end tests against a live `MockResponder`.
//!
//! # Design
//! Each test starts its own responder on an ephemeral port, points a
//! `RequestExecutor` at it, and checks both what the executor returns and
//! what the server recorded.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use callkit_core::{CallError, DownloadProgress, HttpMethod, ProxyKind, RequestExecutor};
use mock_server::{MockHandler, MockResponder, MockResponse};

fn serve(handler: impl Into<MockHandler>) -> MockResponder {
    let mut responder = MockResponder::new(0);
    responder.start_with(handler).unwrap();
    responder
}

#[test]
fn fetch_text_returns_the_mock_body() {
    let server = serve(MockResponse::new().body("pong"));
    let executor = RequestExecutor::new(server.url("/ping"));

    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("pong"));
    assert_eq!(server.requests()[0].path, "/ping");
}

#[test]
fn fetch_text_reads_bodies_past_ten_mebibytes() {
    let size = 11 * 1024 * 1024;
    let server = serve(MockResponse::new().body(vec![b'a'; size]));
    let text = RequestExecutor::new(server.url("/big")).fetch_text().unwrap().unwrap();
    assert_eq!(text.len(), size);
    assert!(text.bytes().all(|b| b == b'a'));
}

#[test]
fn invalid_utf8_is_decoded_lossily() {
    let server = serve(MockResponse::new().body(vec![0x68, 0xff, 0x69]));
    let executor = RequestExecutor::new(server.url("/"));
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("h\u{FFFD}i"));
    assert_eq!(executor.fetch_response().unwrap().unwrap().body, "h\u{FFFD}i");
}

#[test]
fn default_responder_says_hello_world() {
    let mut server = MockResponder::new(0);
    server.start().unwrap();
    let executor = RequestExecutor::new(server.url("/"));
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("Hello World"));
}

#[test]
fn non_success_status_is_returned_as_data() {
    let server = serve(MockResponse::new().status(404).body("missing"));
    let executor = RequestExecutor::new(server.url("/nope"));

    let response = executor.fetch_response().unwrap().unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    assert_eq!(response.body, "missing");
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("missing"));
}

#[test]
fn fetch_response_exposes_headers() {
    let server = serve(MockResponse::new().header("x-mock", "yes").body("ok"));
    let response = RequestExecutor::new(server.url("/"))
        .fetch_response()
        .unwrap()
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.header("X-Mock"), Some("yes"));
}

#[test]
fn headers_arrive_with_duplicates_in_order() {
    let server = serve(MockResponse::new());
    let mut executor = RequestExecutor::new(server.url("/"));
    executor.add_header("x-token", "one");
    executor.add_headers([("x-other", "o"), ("x-token", "two")]);
    executor.fetch_text().unwrap();

    let recorded = &server.requests()[0];
    assert_eq!(recorded.header_values("x-token"), vec!["one", "two"]);
    assert_eq!(recorded.header("x-other"), Some("o"));
}

#[test]
fn payload_methods_send_body_and_media_type() {
    let server = serve(MockResponse::new());
    for method in [HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete, HttpMethod::Patch] {
        RequestExecutor::new(server.url("/items"))
            .method(method)
            .body(r#"{"name":"x"}"#)
            .media_type("application/json")
            .fetch_text()
            .unwrap();
    }

    let recorded = server.requests();
    let methods: Vec<&str> = recorded.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, vec!["POST", "PUT", "DELETE", "PATCH"]);
    for req in &recorded {
        assert_eq!(req.body_text(), r#"{"name":"x"}"#, "{}", req.method);
        assert_eq!(req.header("content-type"), Some("application/json"), "{}", req.method);
    }
}

#[test]
fn get_and_head_send_no_body() {
    let server = serve(MockResponse::new().body("ignored for head"));
    for method in [HttpMethod::Get, HttpMethod::Head] {
        RequestExecutor::new(server.url("/"))
            .method(method)
            .body("should not be sent")
            .fetch_text()
            .unwrap();
    }

    let recorded = server.requests();
    assert_eq!(recorded.len(), 2);
    for req in &recorded {
        assert!(req.body.is_empty(), "{}", req.method);
        assert_eq!(req.header("content-type"), None, "{}", req.method);
    }
}

#[test]
fn fetch_stream_reads_the_body() {
    let server = serve(MockResponse::new().body("streamed bytes"));
    let mut stream = RequestExecutor::new(server.url("/"))
        .fetch_stream()
        .unwrap()
        .unwrap();
    assert_eq!(stream.status(), 200);
    assert_eq!(stream.content_length(), Some(14));

    let mut text = String::new();
    stream.read_to_string(&mut text).unwrap();
    assert_eq!(text, "streamed bytes");
}

#[test]
fn fetch_file_with_known_length_reports_every_chunk() {
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let server = serve(MockResponse::new().body(payload.clone()));
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("download.bin");

    let mut reports: Vec<DownloadProgress> = Vec::new();
    let written = RequestExecutor::new(server.url("/file"))
        .fetch_file(&target, |p| reports.push(p.clone()))
        .unwrap()
        .unwrap();

    assert_eq!(written, target);
    assert_eq!(std::fs::read(&target).unwrap(), payload);
    assert!(!reports.is_empty());
    assert!(reports.windows(2).all(|w| w[0].current < w[1].current));
    assert!(reports.iter().all(|p| p.max == 5000 && p.file == target));
    let last = reports.last().unwrap();
    assert_eq!(last.current, last.max);
    assert_eq!(last.fraction(), Some(1.0));
}

#[test]
fn fetch_file_without_length_reports_unknown_total() {
    let payload = "y".repeat(3000);
    let server = serve(MockResponse::new().body(payload.clone()).chunked(true));
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("chunked.txt");

    let mut reports: Vec<DownloadProgress> = Vec::new();
    RequestExecutor::new(server.url("/"))
        .fetch_file(&target, |p| reports.push(p.clone()))
        .unwrap()
        .unwrap();

    assert_eq!(std::fs::read_to_string(&target).unwrap(), payload);
    assert!(reports.iter().all(|p| p.max == 0 && p.fraction().is_none()));
    assert_eq!(reports.last().unwrap().current, 3000);
}

#[test]
fn fetch_json_path_selects_prices() {
    let document = r#"{"store":{"book":[{"price":10},{"price":25}]}}"#;
    let server = serve(MockResponse::new().header("content-type", "application/json").body(document));
    let executor = RequestExecutor::new(server.url("/store"));

    let prices: Vec<u32> = executor.fetch_json_path("$.store.book[*].price", false).unwrap();
    assert_eq!(prices, vec![10, 25]);

    let first: u32 = executor.fetch_json_path("$.store.book[0].price", true).unwrap();
    assert_eq!(first, 10);
}

#[test]
fn fetch_json_path_on_empty_body_fails_before_querying() {
    let server = serve(MockResponse::new());
    let executor = RequestExecutor::new(server.url("/"));
    // The path is malformed too; the empty body must win.
    let err = executor.fetch_json_path::<Vec<u32>>("$[", false).unwrap_err();
    assert!(matches!(err, CallError::EmptyResponseBody));
}

#[test]
fn invalid_media_type_never_reaches_the_server() {
    let server = serve(MockResponse::new());
    let err = RequestExecutor::new(server.url("/"))
        .method(HttpMethod::Post)
        .media_type("not/a/valid/type////")
        .fetch_text()
        .unwrap_err();
    assert!(matches!(err, CallError::InvalidMediaType { .. }));
    assert_eq!(server.request_count(), 0);
}

#[test]
fn redirects_follow_only_when_enabled() {
    let handler = MockHandler::computed(|server, req| {
        if req.path == "/old" {
            MockResponse::new().status(302).header("location", server.url("/new"))
        } else {
            MockResponse::new().body("landed")
        }
    });
    let server = serve(handler);

    let followed = RequestExecutor::new(server.url("/old")).fetch_response().unwrap().unwrap();
    assert_eq!(followed.status, 200);
    assert_eq!(followed.body, "landed");

    let stopped = RequestExecutor::new(server.url("/old"))
        .follow_redirects(false)
        .fetch_response()
        .unwrap()
        .unwrap();
    assert_eq!(stopped.status, 302);
}

#[test]
fn restart_on_same_port_uses_only_the_new_handler() {
    let mut server = serve(MockResponse::new().body("old"));
    let port = server.port();
    let executor = RequestExecutor::new(server.url("/"));
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("old"));

    server.start_with(MockResponse::new().body("new")).unwrap();
    assert_eq!(server.port(), port);
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("new"));
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("new"));
}

#[test]
fn set_handler_swaps_without_restart() {
    let mut server = serve(MockResponse::new().body("before"));
    let executor = RequestExecutor::new(server.url("/"));
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("before"));

    server.set_handler(MockResponse::new().body("after"));
    assert!(server.is_running());
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("after"));
    assert_eq!(server.request_count(), 2);
}

#[test]
fn stopped_server_yields_transport_error() {
    let mut server = serve(MockResponse::new());
    let executor = RequestExecutor::new(server.url("/")).retry_on_failure(false);
    server.stop();

    let err = executor.fetch_text().unwrap_err();
    assert!(err.is_transport(), "{err}");
}

#[test]
fn stop_on_never_started_responder_is_a_no_op() {
    let mut server = MockResponder::new(0);
    server.stop();
    assert!(!server.is_running());
}

/// One scripted reply per accepted connection: `None` drops the connection
/// unanswered, `Some(bytes)` reads the request head and writes `bytes` raw.
fn raw_server(script: Vec<Option<Vec<u8>>>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for reply in script {
            let (mut stream, _) = listener.accept().unwrap();
            if let Some(bytes) = reply {
                read_request_head(&mut stream);
                let _ = stream.write_all(&bytes);
            }
        }
    });
    port
}

fn read_request_head(stream: &mut TcpStream) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => head.push(byte[0]),
            _ => return,
        }
    }
}

fn ok_reply(body: &str) -> Option<Vec<u8>> {
    Some(
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .into_bytes(),
    )
}

#[test]
fn retry_resends_after_dropped_connection() {
    let port = raw_server(vec![None, ok_reply("ok")]);
    let executor = RequestExecutor::new(format!("http://127.0.0.1:{port}/")).retry_on_failure(true);
    assert_eq!(executor.fetch_text().unwrap().as_deref(), Some("ok"));
}

#[test]
fn without_retry_a_dropped_connection_fails() {
    let port = raw_server(vec![None, ok_reply("ok")]);
    let executor = RequestExecutor::new(format!("http://127.0.0.1:{port}/")).retry_on_failure(false);
    let err = executor.fetch_text().unwrap_err();
    assert!(err.is_transport(), "{err}");
}

#[test]
fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let (_stream, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_secs(10));
    });

    let started = Instant::now();
    let err = RequestExecutor::new(format!("http://127.0.0.1:{port}/"))
        .timeout_secs(1)
        .retry_on_failure(false)
        .fetch_text()
        .unwrap_err();
    assert!(err.is_transport(), "{err}");
    assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
}

#[test]
fn truncated_download_removes_the_partial_file() {
    let mut reply = b"HTTP/1.1 200 OK\r\nContent-Length: 5000\r\nConnection: close\r\n\r\n".to_vec();
    reply.extend(vec![b'z'; 1500]);
    let port = raw_server(vec![Some(reply)]);
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("partial.bin");

    let mut reports = 0;
    let err = RequestExecutor::new(format!("http://127.0.0.1:{port}/"))
        .retry_on_failure(false)
        .fetch_file(&target, |_| reports += 1)
        .unwrap_err();

    assert!(err.is_transport(), "{err}");
    assert!(reports > 0);
    assert!(!target.exists());
}

#[test]
fn proxy_credentials_reach_the_proxy() {
    let proxy = serve(MockResponse::new());
    let mut executor = RequestExecutor::new("http://example.test/data")
        .timeout_secs(2)
        .retry_on_failure(false);

    // Only the request the proxy saw matters here.
    let _ = executor.fetch_via_proxy(
        "127.0.0.1",
        proxy.port(),
        ProxyKind::Http,
        Some("u".to_string()),
        Some("p".to_string()),
    );

    let seen = proxy.requests();
    let first = seen.first().expect("proxy saw no request");
    assert_eq!(first.method, "CONNECT");
    assert_eq!(first.header("proxy-authorization"), Some("Basic dTpw"));
}

#[test]
fn username_alone_sends_no_proxy_credentials() {
    let proxy = serve(MockResponse::new());
    let mut executor = RequestExecutor::new("http://example.test/data")
        .timeout_secs(2)
        .retry_on_failure(false);

    let _ = executor.fetch_via_proxy(
        "127.0.0.1",
        proxy.port(),
        ProxyKind::Http,
        Some("u".to_string()),
        None,
    );

    let seen = proxy.requests();
    let first = seen.first().expect("proxy saw no request");
    assert_eq!(first.header("proxy-authorization"), None);
}
