//! Request and response values exchanged with the transport

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RestError, RestResult};
use crate::route::{BucketKey, Route};

/// A REST call waiting in, or being executed from, a bucket queue
///
/// Cloned once per attempt so the queued original stays intact until a
/// terminal outcome is known.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    pub route: Route,
    pub body: Option<Vec<u8>>,
    pub content_type: Option<String>,
    /// Sent as `X-Audit-Log-Reason`
    pub reason: Option<String>,
}

impl RestRequest {
    pub fn new(method: Method, route: Route) -> Self {
        Self {
            method,
            route,
            body: None,
            content_type: None,
            reason: None,
        }
    }

    pub fn get(route: Route) -> Self {
        Self::new(Method::GET, route)
    }

    pub fn post(route: Route) -> Self {
        Self::new(Method::POST, route)
    }

    pub fn patch(route: Route) -> Self {
        Self::new(Method::PATCH, route)
    }

    pub fn put(route: Route) -> Self {
        Self::new(Method::PUT, route)
    }

    pub fn delete(route: Route) -> Self {
        Self::new(Method::DELETE, route)
    }

    /// Attach a raw body with its content type
    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> RestResult<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self.body("application/json", body))
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn bucket_key(&self) -> BucketKey {
        self.route.bucket_key()
    }
}

/// Raw response delivered to a request's result slot
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RestResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> RestResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn a non-2xx response into [`RestError::Status`]
    pub fn error_for_status(self) -> RestResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RestError::Status {
                status: self.status.as_u16(),
                body: self.text(),
            })
        }
    }
}
