//! # Session End-to-End Tests
//!
//! Each test runs a scripted node on `127.0.0.1:0` and drives a real
//! [`Session`] against it over plain `ws://`.

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use block_probe::{
    hash_transaction, ProbeConfig, ProbeError, ProbeEvent, Scheme, Session, SessionOutcome,
    SessionState,
};

// =============================================================================
// TEST HELPERS
// =============================================================================

type NodeSocket = WebSocketStream<TcpStream>;

const ACK: &str = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;

/// Accept one connection, hand the subscribe request back to the test, then
/// run `script` against the socket.
async fn spawn_node<F, Fut>(script: F) -> (SocketAddr, oneshot::Receiver<Value>)
where
    F: FnOnce(NodeSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (request_tx, request_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let request = ws.next().await.unwrap().unwrap();
        let request: Value = serde_json::from_str(request.to_text().unwrap()).unwrap();
        let _ = request_tx.send(request);
        script(ws).await;
    });

    (addr, request_rx)
}

fn config_for(addr: SocketAddr) -> ProbeConfig {
    ProbeConfig {
        scheme: Scheme::Ws,
        ..ProbeConfig::new(addr.to_string())
    }
}

fn block_frame(height: &str, txs: &[&str]) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "query": "tm.event='NewBlock'",
            "data": {
                "type": "tendermint/event/NewBlock",
                "value": {
                    "block": {
                        "header": { "chain_id": "testchain", "height": height },
                        "data": { "txs": txs },
                        "last_commit": { "height": "0", "round": 0, "signatures": [] }
                    },
                    "result_begin_block": { "events": [] },
                    "result_end_block": { "validator_updates": null, "events": [] }
                }
            },
            "events": { "tm.event": ["NewBlock"] }
        }
    })
    .to_string()
}

async fn send_text(ws: &mut NodeSocket, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

/// Read until the client goes away; answers its close frame on the way.
async fn drain(ws: &mut NodeSocket) {
    while let Some(Ok(_)) = ws.next().await {}
}

async fn collect(mut rx: mpsc::Receiver<ProbeEvent>) -> Vec<ProbeEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn expect_block(event: &ProbeEvent) -> &block_probe::BlockResult {
    match event {
        ProbeEvent::Block(block) => block,
        other => panic!("expected block, got {:?}", other),
    }
}

// =============================================================================
// STREAMING
// =============================================================================

#[tokio::test]
async fn test_subscribes_and_reports_blocks_in_order() {
    let (addr, request) = spawn_node(|mut ws| async move {
        send_text(&mut ws, ACK).await;
        send_text(&mut ws, &block_frame("100", &["QQ==", "Qg=="])).await;
        send_text(&mut ws, &block_frame("101", &["QQ==", "QQ=="])).await;
        ws.close(None).await.unwrap();
        drain(&mut ws).await;
    })
    .await;

    let (event_tx, event_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    let session = Session::new(config_for(addr), event_tx);
    let state = session.state();

    let outcome = session.run(shutdown_rx).await.unwrap();
    assert_eq!(outcome, SessionOutcome::PeerClosed);
    assert_eq!(*state.borrow(), SessionState::Closed);

    let request = request.await.unwrap();
    assert_eq!(request["jsonrpc"], "2.0");
    assert_eq!(request["method"], "subscribe");
    assert_eq!(request["params"], json!(["tm.event='NewBlock'"]));
    assert_eq!(request["id"], 1);

    let events = collect(event_rx).await;
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], ProbeEvent::Subscribed);

    let first = expect_block(&events[1]);
    assert_eq!(first.height, 100);
    assert_eq!(first.chain_id, "testchain");
    assert!(first.hashes.contains(&hash_transaction("QQ==").unwrap()));
    assert!(first.hashes.contains(&hash_transaction("Qg==").unwrap()));
    assert_eq!(first.hashes.len(), 2);

    let second = expect_block(&events[2]);
    assert_eq!(second.height, 101);
    assert_eq!(second.tx_count, 2);
    assert_eq!(second.hashes.len(), 1);
}

#[tokio::test]
async fn test_binary_and_control_frames() {
    let (addr, _request) = spawn_node(|mut ws| async move {
        send_text(&mut ws, ACK).await;
        ws.send(Message::Ping(b"hi".to_vec().into())).await.unwrap();
        let frame = block_frame("7", &["Qw=="]);
        ws.send(Message::Binary(frame.into_bytes().into())).await.unwrap();
        ws.close(None).await.unwrap();
        drain(&mut ws).await;
    })
    .await;

    let (event_tx, event_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    let outcome = Session::new(config_for(addr), event_tx)
        .run(shutdown_rx)
        .await
        .unwrap();
    assert_eq!(outcome, SessionOutcome::PeerClosed);

    let events = collect(event_rx).await;
    assert_eq!(events.len(), 2);
    assert_eq!(expect_block(&events[1]).height, 7);
}

#[tokio::test]
async fn test_dropped_shutdown_sender_keeps_streaming() {
    let (addr, _request) = spawn_node(|mut ws| async move {
        send_text(&mut ws, ACK).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        send_text(&mut ws, &block_frame("3", &[])).await;
        ws.close(None).await.unwrap();
        drain(&mut ws).await;
    })
    .await;

    let (event_tx, event_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    drop(shutdown_tx);

    let outcome = Session::new(config_for(addr), event_tx)
        .run(shutdown_rx)
        .await
        .unwrap();
    assert_eq!(outcome, SessionOutcome::PeerClosed);
    assert_eq!(collect(event_rx).await.len(), 2);
}

// =============================================================================
// FATAL ERRORS
// =============================================================================

#[tokio::test]
async fn test_bad_base64_ends_session_before_reporting_block() {
    let (addr, _request) = spawn_node(|mut ws| async move {
        send_text(&mut ws, ACK).await;
        send_text(&mut ws, &block_frame("200", &["QQ==", "@@@"])).await;
        send_text(&mut ws, &block_frame("201", &["QQ=="])).await;
        drain(&mut ws).await;
    })
    .await;

    let (event_tx, event_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    let session = Session::new(config_for(addr), event_tx);
    let state = session.state();

    let err = session.run(shutdown_rx).await.unwrap_err();
    assert!(matches!(err, ProbeError::PayloadDecode { index: 1, .. }));
    assert_eq!(*state.borrow(), SessionState::Closed);

    let events = collect(event_rx).await;
    assert_eq!(events, vec![ProbeEvent::Subscribed]);
}

#[tokio::test]
async fn test_malformed_frame_ends_session() {
    let (addr, _request) = spawn_node(|mut ws| async move {
        send_text(&mut ws, "this is not json").await;
        drain(&mut ws).await;
    })
    .await;

    let (event_tx, event_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    let err = Session::new(config_for(addr), event_tx)
        .run(shutdown_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::ProtocolDecode(_)));
    assert!(collect(event_rx).await.is_empty());
}

#[tokio::test]
async fn test_rpc_error_ends_session() {
    let (addr, _request) = spawn_node(|mut ws| async move {
        let error = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"Internal error","data":"already subscribed"}}"#;
        send_text(&mut ws, error).await;
        drain(&mut ws).await;
    })
    .await;

    let (event_tx, _event_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    let err = Session::new(config_for(addr), event_tx)
        .run(shutdown_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Rpc { code: -32603, .. }));
}

#[tokio::test]
async fn test_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (event_tx, event_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    let session = Session::new(config_for(addr), event_tx);
    let state = session.state();

    let err = session.run(shutdown_rx).await.unwrap_err();
    assert!(matches!(err, ProbeError::Connect { .. }));
    assert_eq!(*state.borrow(), SessionState::Closed);
    assert!(collect(event_rx).await.is_empty());
}

// =============================================================================
// SHUTDOWN
// =============================================================================

#[tokio::test]
async fn test_shutdown_acknowledged_by_node() {
    let (addr, _request) = spawn_node(|mut ws| async move {
        send_text(&mut ws, ACK).await;
        drain(&mut ws).await;
    })
    .await;

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let session = tokio::spawn(Session::new(config_for(addr), event_tx).run(shutdown_rx));

    assert_eq!(event_rx.recv().await, Some(ProbeEvent::Subscribed));
    let started = Instant::now();
    shutdown_tx.send(()).unwrap();

    let outcome = session.await.unwrap().unwrap();
    assert_eq!(outcome, SessionOutcome::ShutdownAcknowledged);
    assert!(outcome.is_clean());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_frames_during_close_are_not_reported() {
    let (go_tx, go_rx) = oneshot::channel::<()>();
    let (addr, _request) = spawn_node(|mut ws| async move {
        send_text(&mut ws, ACK).await;
        // Send once the client is closing but before reading its close frame.
        go_rx.await.unwrap();
        send_text(&mut ws, &block_frame("300", &["QQ=="])).await;
        drain(&mut ws).await;
    })
    .await;

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let session = Session::new(config_for(addr), event_tx);
    let mut state = session.state();
    let session = tokio::spawn(session.run(shutdown_rx));

    assert_eq!(event_rx.recv().await, Some(ProbeEvent::Subscribed));
    shutdown_tx.send(()).unwrap();
    state
        .wait_for(|s| *s == SessionState::Closing)
        .await
        .unwrap();
    go_tx.send(()).unwrap();

    let outcome = session.await.unwrap().unwrap();
    assert_eq!(outcome, SessionOutcome::ShutdownAcknowledged);
    assert!(collect(event_rx).await.is_empty());
}

#[tokio::test]
async fn test_shutdown_times_out_on_silent_node() {
    let (addr, _request) = spawn_node(|mut ws| async move {
        send_text(&mut ws, ACK).await;
        // Never read again, so the close frame is never answered.
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(ws);
    })
    .await;

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let session = tokio::spawn(Session::new(config_for(addr), event_tx).run(shutdown_rx));

    assert_eq!(event_rx.recv().await, Some(ProbeEvent::Subscribed));
    let started = Instant::now();
    shutdown_tx.send(()).unwrap();

    let outcome = session.await.unwrap().unwrap();
    let elapsed = started.elapsed();
    assert_eq!(outcome, SessionOutcome::ShutdownUnacknowledged);
    assert!(outcome.is_clean());
    assert!(elapsed >= Duration::from_millis(900), "waited only {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "waited {:?}", elapsed);
}
