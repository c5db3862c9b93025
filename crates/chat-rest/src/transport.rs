//! HTTP transport seam
//!
//! Buckets talk to the network only through [`HttpTransport`], so tests can
//! substitute a scripted transport and drive the drain loop on a paused clock.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

use crate::error::{RestError, RestResult};
use crate::request::{RestRequest, RestResponse};

/// Executes one HTTP exchange
///
/// Any response, including 429 and other non-2xx statuses, is `Ok`. Only a
/// failure to complete the exchange is `Err`.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn execute(&self, request: &RestRequest) -> RestResult<RestResponse>;
}

/// Connection settings for [`ReqwestTransport`]
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Versioned API base, without trailing slash
    pub api_base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            api_base_url: "https://discord.com/api/v10".to_string(),
            user_agent: concat!("DiscordBot (chat-client, ", env!("CARGO_PKG_VERSION"), ")")
                .to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Production transport over a pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Build a client that sends `Authorization: Bot <token>` on every call
    pub fn new(token: &str, options: &TransportOptions) -> RestResult<Self> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|_| RestError::InvalidHeader("authorization".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let agent = HeaderValue::from_str(&options.user_agent)
            .map_err(|_| RestError::InvalidHeader("user-agent".to_string()))?;
        headers.insert(header::USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: options.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, request: &RestRequest) -> String {
        format!("{}{}", self.base_url, request.route.path())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &RestRequest) -> RestResult<RestResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(request));

        if !request.route.query_pairs().is_empty() {
            builder = builder.query(request.route.query_pairs());
        }
        if let Some(reason) = &request.reason {
            builder = builder.header("X-Audit-Log-Reason", reason.as_str());
        }
        if let Some(body) = &request.body {
            if let Some(content_type) = &request.content_type {
                builder = builder.header(header::CONTENT_TYPE, content_type.as_str());
            }
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        tracing::trace!(
            method = %request.method,
            path = %request.route,
            status = status.as_u16(),
            "REST exchange completed"
        );

        Ok(RestResponse::new(status, headers, body.to_vec()))
    }
}
