//! Gateway session tests against an in-process WebSocket server
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use anyhow::{Context, Result};
use chat_core::Intents;
use chat_gateway::{
    ConnectionPhase, GatewayError, GatewayMessage, GatewaySession, OpCode, SessionOutcome,
};
use chat_rest::{RequestDispatcher, RestOptions, TransportOptions};
use integration_tests::{
    message_create, ready, recorder, test_options, MockApi, MockGateway, TOKEN, WAIT,
};
use serde_json::json;
use tokio::time::timeout;

const INTENTS: Intents = Intents::GUILDS.union(Intents::GUILD_MESSAGES);

/// Long enough that no periodic heartbeat interferes
const QUIET_INTERVAL_MS: u64 = 45_000;

fn op(raw: &str) -> GatewayMessage {
    GatewayMessage::from_json(raw).unwrap()
}

#[tokio::test]
async fn test_identify_dispatch_and_heartbeat_request() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, mut events) = recorder();
    let session =
        GatewaySession::connect_to(gateway.url(), TOKEN, INTENTS, handler, test_options());

    let mut peer = gateway.accept().await?;
    assert_eq!(peer.uri, "/?v=10&encoding=json");

    let identify = peer
        .handshake(QUIET_INTERVAL_MS)
        .await?
        .as_identify()
        .context("expected Identify")?;
    assert_eq!(identify.token, TOKEN);
    assert_eq!(identify.intents, INTENTS);
    assert_eq!(identify.properties.browser, "chat-client");

    peer.send(&ready(1, "abc", None)).await?;
    events.next_named("READY").await?;
    assert_eq!(session.session_id().as_deref(), Some("abc"));
    assert_eq!(session.phase(), ConnectionPhase::Connected);

    peer.send(&message_create(5, "hello")).await?;
    let data = events.next_named("MESSAGE_CREATE").await?;
    assert_eq!(data["content"], "hello");
    assert_eq!(session.sequence(), 5);

    // Heartbeat request is answered out of cadence with the latest sequence
    peer.send(&op(r#"{"op":1,"d":null}"#)).await?;
    let beat = peer.recv_op(OpCode::Heartbeat).await?;
    assert_eq!(beat.d, Some(json!(5)));

    session.close().await;
    assert_eq!(peer.recv_close().await?, Some(1000));
    assert!(!session.is_active());
    Ok(())
}

#[tokio::test]
async fn test_periodic_heartbeat_is_acknowledged() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, _events) = recorder();
    let session =
        GatewaySession::connect_to(gateway.url(), TOKEN, INTENTS, handler, test_options());

    let mut peer = gateway.accept().await?;
    peer.handshake(100).await?;
    peer.send(&ready(3, "abc", None)).await?;

    for _ in 0..3 {
        let beat = peer.recv_op(OpCode::Heartbeat).await?;
        assert_eq!(beat.d, Some(json!(3)));
        peer.send(&op(r#"{"op":11}"#)).await?;
    }

    assert!(session.last_heartbeat_ack().is_some());
    assert_eq!(session.phase(), ConnectionPhase::Connected);
    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_missing_ack_reconnects_and_resumes() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, _events) = recorder();
    let _session =
        GatewaySession::connect_to(gateway.url(), TOKEN, INTENTS, handler, test_options());

    let mut peer = gateway.accept().await?;
    peer.handshake(100).await?;
    peer.send(&ready(1, "abc", None)).await?;

    // Never acknowledged, so the next tick declares the connection dead
    peer.recv_op(OpCode::Heartbeat).await?;
    assert_eq!(peer.recv_close().await?, Some(4000));

    let mut peer = gateway.accept().await?;
    let resume = peer
        .handshake(QUIET_INTERVAL_MS)
        .await?
        .as_resume()
        .context("expected Resume")?;
    assert_eq!(resume.session_id, "abc");
    assert_eq!(resume.seq, 1);
    Ok(())
}

#[tokio::test]
async fn test_reconnect_request_resumes_at_resume_url() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, mut events) = recorder();
    let session =
        GatewaySession::connect_to(gateway.url(), TOKEN, INTENTS, handler, test_options());

    let resume_url = format!("{}/resume", gateway.url());
    let mut peer = gateway.accept().await?;
    peer.handshake(QUIET_INTERVAL_MS).await?;
    peer.send(&ready(1, "abc", Some(&resume_url))).await?;
    peer.send(&message_create(2, "before reconnect")).await?;
    events.next_named("MESSAGE_CREATE").await?;

    peer.send(&op(r#"{"op":7,"d":null}"#)).await?;

    let mut peer = gateway.accept().await?;
    assert!(peer.uri.starts_with("/resume/?v=10"), "connected to {}", peer.uri);
    let resume = peer
        .handshake(QUIET_INTERVAL_MS)
        .await?
        .as_resume()
        .context("expected Resume")?;
    assert_eq!(resume.token, TOKEN);
    assert_eq!(resume.session_id, "abc");
    assert_eq!(resume.seq, 2);

    peer.send(&GatewayMessage::dispatch("RESUMED", 3, json!({}))).await?;
    events.next_named("RESUMED").await?;
    assert_eq!(session.phase(), ConnectionPhase::Connected);
    assert_eq!(session.sequence(), 3);

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_invalid_session_identifies_fresh() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, _events) = recorder();
    let session =
        GatewaySession::connect_to(gateway.url(), TOKEN, INTENTS, handler, test_options());

    let mut peer = gateway.accept().await?;
    peer.handshake(QUIET_INTERVAL_MS).await?;
    peer.send(&ready(1, "abc", None)).await?;
    peer.send(&op(r#"{"op":9,"d":false}"#)).await?;

    let mut peer = gateway.accept().await?;
    let next = peer.handshake(QUIET_INTERVAL_MS).await?;
    assert_eq!(next.op, OpCode::Identify);
    assert_eq!(session.sequence(), 0);
    assert_eq!(session.session_id(), None);

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_server_close_codes_choose_resume_or_identify() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, _events) = recorder();
    let session =
        GatewaySession::connect_to(gateway.url(), TOKEN, INTENTS, handler, test_options());

    let mut peer = gateway.accept().await?;
    peer.handshake(QUIET_INTERVAL_MS).await?;
    peer.send(&ready(4, "abc", None)).await?;
    peer.close(4000).await?;

    let mut peer = gateway.accept().await?;
    assert_eq!(peer.handshake(QUIET_INTERVAL_MS).await?.op, OpCode::Resume);

    // Session timed out on the server side
    peer.close(4009).await?;

    let mut peer = gateway.accept().await?;
    assert_eq!(peer.handshake(QUIET_INTERVAL_MS).await?.op, OpCode::Identify);

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_fatal_close_ends_session() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, _events) = recorder();
    let options = test_options();
    let session = GatewaySession::connect_to(gateway.url(), "bad-token", INTENTS, handler, options);

    let mut peer = gateway.accept().await?;
    peer.handshake(QUIET_INTERVAL_MS).await?;
    peer.close(4004).await?;

    let result = timeout(WAIT, session.wait_closed()).await?;
    assert!(matches!(result, Err(GatewayError::FatalClose(4004))));
    assert_eq!(session.outcome(), Some(SessionOutcome::Fatal(4004)));
    assert!(!session.is_active());
    assert_eq!(session.phase(), ConnectionPhase::Disconnected);
    Ok(())
}

#[tokio::test]
async fn test_fatal_close_before_hello_ends_session() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, _events) = recorder();
    let options = test_options();
    let session = GatewaySession::connect_to(gateway.url(), "bad-token", INTENTS, handler, options);

    let mut peer = gateway.accept().await?;
    peer.close(4004).await?;

    let result = timeout(WAIT, session.wait_closed()).await?;
    assert!(matches!(result, Err(GatewayError::FatalClose(4004))));
    assert!(!session.is_active());
    Ok(())
}

#[tokio::test]
async fn test_frame_before_hello_retries_with_identify() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, _events) = recorder();
    let session =
        GatewaySession::connect_to(gateway.url(), TOKEN, INTENTS, handler, test_options());

    let mut peer = gateway.accept().await?;
    peer.send(&message_create(1, "early")).await?;
    assert_eq!(peer.recv_close().await?, Some(4000));

    let mut peer = gateway.accept().await?;
    assert_eq!(peer.handshake(QUIET_INTERVAL_MS).await?.op, OpCode::Identify);
    assert!(session.is_active());

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_malformed_ready_retries_with_identify() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let (handler, _events) = recorder();
    let session =
        GatewaySession::connect_to(gateway.url(), TOKEN, INTENTS, handler, test_options());

    let mut peer = gateway.accept().await?;
    peer.handshake(QUIET_INTERVAL_MS).await?;
    peer.send(&GatewayMessage::dispatch("READY", 1, json!({ "v": 10 }))).await?;
    assert_eq!(peer.recv_close().await?, Some(4000));

    let mut peer = gateway.accept().await?;
    assert_eq!(peer.handshake(QUIET_INTERVAL_MS).await?.op, OpCode::Identify);
    assert_eq!(session.session_id(), None);
    assert!(session.is_active());

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_connect_discovers_gateway_over_rest() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let api = MockApi::start(gateway.url()).await?;
    let rest = RequestDispatcher::new(
        TOKEN,
        RestOptions {
            transport: TransportOptions {
                api_base_url: api.base_url(),
                ..TransportOptions::default()
            },
            ..RestOptions::default()
        },
    )?;

    let (handler, _events) = recorder();
    let session =
        GatewaySession::connect(&rest, TOKEN, INTENTS, handler, test_options()).await?;

    let mut peer = gateway.accept().await?;
    assert_eq!(peer.handshake(QUIET_INTERVAL_MS).await?.op, OpCode::Identify);

    session.close().await;
    rest.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_failed_discovery_is_reported() -> Result<()> {
    let api = MockApi::start("ws://unused").await?;
    let rest = RequestDispatcher::new(
        "wrong-token",
        RestOptions {
            transport: TransportOptions {
                api_base_url: api.base_url(),
                ..TransportOptions::default()
            },
            ..RestOptions::default()
        },
    )?;

    let (handler, _events) = recorder();
    let result =
        GatewaySession::connect(&rest, "wrong-token", INTENTS, handler, test_options()).await;
    assert!(matches!(result, Err(GatewayError::Discovery(_))));
    Ok(())
}
