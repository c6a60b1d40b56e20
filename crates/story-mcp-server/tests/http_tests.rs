//! HTTP transport coverage: SSE channels, direct requests, parse errors

mod common;

use common::{server, GOLD_SCRIPT};
use serde_json::{json, Value};
use std::sync::Arc;
use story_mcp_server::StoryServer;
use tokio::net::TcpListener;

/// Bind an ephemeral port and serve the protocol in the background
async fn spawn_http() -> (String, Arc<StoryServer>) {
    let srv = server();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = srv.clone();
    tokio::spawn(async move {
        handle.run_http(listener).await.unwrap();
    });
    (format!("http://{addr}"), srv)
}

/// Read the next SSE frame, skipping keep-alive comments.
///
/// Returns (event name, data).
async fn next_event(resp: &mut reqwest::Response, buf: &mut String) -> (String, String) {
    loop {
        if let Some(idx) = buf.find("\n\n") {
            let frame = buf[..idx].to_string();
            buf.drain(..idx + 2);

            let mut event = String::new();
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event = rest.trim().to_string();
                } else if let Some(rest) = line.strip_prefix("data:") {
                    if !data.is_empty() {
                        data.push('\n');
                    }
                    data.push_str(rest.trim_start());
                }
                // Lines starting with ':' are comments (keep-alives)
            }
            if event.is_empty() && data.is_empty() {
                continue;
            }
            return (event, data);
        }

        let chunk = resp
            .chunk()
            .await
            .expect("stream read")
            .expect("stream still open");
        buf.push_str(std::str::from_utf8(&chunk).expect("utf8 frame"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sse_channel_delivers_responses_in_request_order() {
    let (base, _srv) = spawn_http().await;
    let client = reqwest::Client::new();

    let mut stream = client.get(format!("{base}/sse")).send().await.unwrap();
    let mut buf = String::new();

    // First frame hands the client its POST endpoint
    let (event, endpoint) = next_event(&mut stream, &mut buf).await;
    assert_eq!(event, "endpoint");
    assert!(endpoint.starts_with("/messages?session_id="));
    let post_url = format!("{base}{endpoint}");

    // Ping over the channel: acknowledged with 202, answered on the stream
    let ack = client
        .post(&post_url)
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(ack.status(), reqwest::StatusCode::ACCEPTED);
    assert_eq!(ack.text().await.unwrap(), "Accepted");

    let (event, data) = next_event(&mut stream, &mut buf).await;
    assert_eq!(event, "message");
    let response: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"], json!({}));

    // A tool call follows on the same channel, in order
    let ack = client
        .post(&post_url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "start_session", "arguments": {"source": GOLD_SCRIPT}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(ack.status(), reqwest::StatusCode::ACCEPTED);

    let (_, data) = next_event(&mut stream, &mut buf).await;
    let response: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(response["id"], 2);
    let payload: Value =
        serde_json::from_str(response["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["text"], "Step one.");

    // Malformed body: still 202, protocol error arrives on the stream
    let ack = client
        .post(&post_url)
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(ack.status(), reqwest::StatusCode::ACCEPTED);

    let (_, data) = next_event(&mut stream, &mut buf).await;
    let response: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(response["error"]["code"], -32700);
    assert!(response["id"].is_null());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn direct_post_answers_synchronously() {
    let (base, _srv) = spawn_http().await;
    let client = reqwest::Client::new();
    let url = format!("{base}/messages");

    let resp = client
        .post(&url)
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["serverInfo"]["name"], "story-mcp");

    // Notifications are acknowledged without a body
    let resp = client
        .post(&url)
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn direct_parse_error_is_a_protocol_response() {
    let (base, _srv) = spawn_http().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/messages"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
    assert!(body["id"].is_null());
    assert!(body["error"]["message"].as_str().unwrap().starts_with("Parse error"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_channel_is_rejected() {
    let (base, _srv) = spawn_http().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/messages?session_id=no-such-channel"))
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(resp.text().await.unwrap(), "Unknown channel");
}
