//! REST dispatcher tests against an in-process HTTP server
//!
//! Requests go through the real reqwest transport so header parsing and
//! bucket timing are exercised over the wire.
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::time::Duration;

use anyhow::Result;
use chat_rest::{
    RequestDispatcher, RestError, RestOptions, RestRequest, RetryPolicy, Route, TransportOptions,
};
use integration_tests::{
    MockApi, LIMITED_CHANNEL, RESET_AFTER, RETRY_AFTER, THROTTLED_CHANNEL, TOKEN,
};
use serde_json::{json, Value};

/// Scheduling slack allowed on measured gaps
const SLACK: Duration = Duration::from_millis(20);

fn dispatcher(api: &MockApi, token: &str) -> Result<RequestDispatcher> {
    Ok(RequestDispatcher::new(
        token,
        RestOptions {
            transport: TransportOptions {
                api_base_url: api.base_url(),
                ..TransportOptions::default()
            },
            ..RestOptions::default()
        },
    )?)
}

fn message(channel_id: u64, content: &str) -> Result<RestRequest> {
    Ok(RestRequest::post(Route::channel_messages(channel_id)).json(&json!({ "content": content }))?)
}

#[tokio::test]
async fn test_exhausted_bucket_waits_for_reset() -> Result<()> {
    let api = MockApi::start("ws://unused").await?;
    let rest = dispatcher(&api, TOKEN)?;

    let mut pending = Vec::new();
    for i in 0..3 {
        pending.push(rest.enqueue(message(LIMITED_CHANNEL, &i.to_string())?));
    }
    for rx in pending {
        assert!(rx.await??.is_success());
    }

    let hits = api.hits_for(LIMITED_CHANNEL);
    let order: Vec<_> = hits.iter().map(|h| h.content.as_str()).collect();
    assert_eq!(order, ["0", "1", "2"]);
    for pair in hits.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) + SLACK >= RESET_AFTER);
    }
    Ok(())
}

#[tokio::test]
async fn test_rate_limited_response_is_retried() -> Result<()> {
    let api = MockApi::start("ws://unused").await?;
    let rest = dispatcher(&api, TOKEN)?;

    let response = rest.execute(message(THROTTLED_CHANNEL, "hi")?).await?;
    assert!(response.is_success());
    assert_eq!(response.json::<Value>()?["content"], "hi");

    let hits = api.hits_for(THROTTLED_CHANNEL);
    let statuses: Vec<_> = hits.iter().map(|h| h.status).collect();
    assert_eq!(statuses, [429, 200]);
    assert!(hits[1].at.duration_since(hits[0].at) + SLACK >= RETRY_AFTER);
    Ok(())
}

#[tokio::test]
async fn test_buckets_progress_independently() -> Result<()> {
    let api = MockApi::start("ws://unused").await?;
    let rest = dispatcher(&api, TOKEN)?;

    let limited = vec![
        rest.enqueue(message(LIMITED_CHANNEL, "a")?),
        rest.enqueue(message(LIMITED_CHANNEL, "b")?),
    ];
    let other = rest.enqueue(message(3, "c")?);

    for result in futures::future::join_all(limited).await {
        result??;
    }
    other.await??;

    let limited = api.hits_for(LIMITED_CHANNEL);
    let other = api.hits_for(3);
    assert!(other[0].at < limited[1].at);
    assert_eq!(rest.registry().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_error_status_is_delivered_not_retried() -> Result<()> {
    let api = MockApi::start("ws://unused").await?;
    let rest = dispatcher(&api, "wrong-token")?;

    let response = rest.execute(message(3, "denied")?).await?;
    assert_eq!(response.status.as_u16(), 401);

    let err = rest.execute_json::<Value>(message(3, "denied")?).await.unwrap_err();
    assert!(matches!(err, RestError::Status { status: 401, .. }));
    assert_eq!(api.hits().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_gateway_discovery() -> Result<()> {
    let api = MockApi::start("ws://gateway.test").await?;
    let rest = dispatcher(&api, TOKEN)?;

    let info = rest.get_gateway_bot().await?;
    assert_eq!(info.url, "ws://gateway.test");
    assert_eq!(info.shards, 1);
    assert_eq!(info.session_start_limit.remaining, 999);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_host_exhausts_retries() -> Result<()> {
    let rest = RequestDispatcher::new(
        TOKEN,
        RestOptions {
            transport: TransportOptions {
                api_base_url: "http://127.0.0.1:9".to_string(),
                request_timeout: Duration::from_secs(2),
                ..TransportOptions::default()
            },
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
            },
        },
    )?;

    let err = rest.execute(RestRequest::get(Route::gateway_bot())).await.unwrap_err();
    assert!(matches!(err, RestError::RetriesExhausted { attempts: 3, .. }), "{err}");
    Ok(())
}

#[tokio::test]
async fn test_shutdown_fails_new_requests() -> Result<()> {
    let api = MockApi::start("ws://unused").await?;
    let rest = dispatcher(&api, TOKEN)?;
    rest.shutdown();

    let err = rest.execute(message(3, "late")?).await.unwrap_err();
    assert!(matches!(err, RestError::Shutdown));
    assert!(api.hits().is_empty());
    Ok(())
}
