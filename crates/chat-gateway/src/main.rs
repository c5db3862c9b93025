//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! BOT_TOKEN=... cargo run -p chat-gateway
//! ```
//!
//! Configuration is loaded from environment variables. The client logs
//! every dispatch event until Ctrl-C or a fatal close.

use async_trait::async_trait;
use chat_common::{
    try_init_tracing_with_config, AppError, AppResult, ClientConfig, GatewayConfig, RestConfig,
    TracingConfig,
};
use chat_core::Message;
use chat_gateway::connection::BackoffConfig;
use chat_gateway::{EventHandler, GatewayEventType, GatewayOptions, GatewaySession};
use chat_rest::{RequestDispatcher, RestOptions, RetryPolicy, TransportOptions};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, code = e.error_code(), "Gateway client stopped");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> AppResult<()> {
    info!(
        name = %config.app.name,
        env = ?config.app.env,
        intents = %config.intents,
        "Starting gateway client"
    );

    if !GatewayEventType::MessageCreate.is_delivered_with(config.intents) {
        warn!(
            intents = %config.intents,
            "Intents exclude MESSAGE_CREATE, no messages will be logged"
        );
    }

    let rest =
        RequestDispatcher::new(&config.token, rest_options(&config.rest)).map_err(AppError::rest)?;
    let session = GatewaySession::connect(
        &rest,
        config.token.clone(),
        config.intents,
        Arc::new(LoggingHandler),
        gateway_options(&config.gateway),
    )
    .await
    .map_err(AppError::gateway)?;

    let result = tokio::select! {
        closed = session.wait_closed() => closed.map_err(AppError::gateway),
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(AppError::internal)?;
            info!("Shutdown signal received");
            Ok(())
        }
    };

    session.close().await;
    rest.shutdown();
    info!(sequence = session.sequence(), "Gateway client stopped");
    result
}

fn rest_options(config: &RestConfig) -> RestOptions {
    RestOptions {
        transport: TransportOptions {
            api_base_url: config.api_base_url.clone(),
            user_agent: config.user_agent.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        },
        retry: RetryPolicy {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        },
    }
}

fn gateway_options(config: &GatewayConfig) -> GatewayOptions {
    GatewayOptions {
        version: config.version,
        connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        hello_timeout: Duration::from_secs(config.hello_timeout_secs),
        close_timeout: Duration::from_millis(config.close_timeout_ms),
        backoff: BackoffConfig {
            floor: Duration::from_millis(config.backoff_floor_ms),
            cap: Duration::from_millis(config.backoff_cap_ms),
            reset_after: Duration::from_secs(config.backoff_reset_secs),
        },
        ..GatewayOptions::default()
    }
}

struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn on_event(&self, event: &str, data: &Value) {
        match GatewayEventType::from_str(event) {
            Some(GatewayEventType::MessageCreate) => {
                match serde_json::from_value::<Message>(data.clone()) {
                    Ok(message) => info!(
                        channel = %message.channel_id,
                        author = %message.author.tag(),
                        content = message.preview(80),
                        "Message received"
                    ),
                    Err(e) => info!(error = %e, "MESSAGE_CREATE with an unexpected shape"),
                }
            }
            _ => info!(event, "Gateway event"),
        }
    }
}
