//! Routes and rate-limit bucket keys
//!
//! The platform scopes quotas by the resource a route names (its *major*
//! parameters: channel, guild, webhook) and not by leaf ids such as a
//! message id. A [`BucketKey`] keeps major segments verbatim and collapses
//! every other id to a fixed token so that all requests sharing one
//! server-side quota share one bucket.

use std::fmt;

/// Token that replaces minor id segments in a bucket key
pub const MINOR_PLACEHOLDER: &str = ":id";

/// Collection names whose following id is a major parameter
const MAJOR_RESOURCES: [&str; 3] = ["channels", "guilds", "webhooks"];

/// Rate-limit bucket key derived from a route
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey(String);

impl BucketKey {
    /// Derive a key from a literal request path
    ///
    /// Numeric segments directly after `channels`, `guilds` or `webhooks`
    /// are kept; any other numeric segment becomes [`MINOR_PLACEHOLDER`].
    /// The query string never takes part in the key.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();

        let mut key = String::with_capacity(path.len());
        let mut previous = "";
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            key.push('/');
            if is_id(segment) && !MAJOR_RESOURCES.iter().any(|r| *r == previous) {
                key.push_str(MINOR_PLACEHOLDER);
            } else {
                key.push_str(segment);
            }
            previous = segment;
        }

        if key.is_empty() {
            key.push('/');
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Route builder
///
/// Tracks the concrete request path and its bucket key side by side:
///
/// ```
/// use chat_rest::Route;
///
/// let route = Route::new().channel(123).segment("messages").id(456);
/// assert_eq!(route.path(), "/channels/123/messages/456");
/// assert_eq!(route.bucket_key().as_str(), "/channels/123/messages/:id");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    path: String,
    bucket: String,
    query: Vec<(String, String)>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a literal segment, part of both path and key
    pub fn segment(mut self, segment: impl fmt::Display) -> Self {
        let segment = segment.to_string();
        self.push(&segment, &segment);
        self
    }

    /// Append a channel id as a major parameter
    pub fn channel(self, id: impl fmt::Display) -> Self {
        self.segment("channels").segment(id)
    }

    /// Append a guild id as a major parameter
    pub fn guild(self, id: impl fmt::Display) -> Self {
        self.segment("guilds").segment(id)
    }

    /// Append a webhook id as a major parameter
    pub fn webhook(self, id: impl fmt::Display) -> Self {
        self.segment("webhooks").segment(id)
    }

    /// Append a minor id: kept in the path, collapsed in the key
    pub fn id(mut self, id: impl fmt::Display) -> Self {
        let id = id.to_string();
        self.push(&id, MINOR_PLACEHOLDER);
        self
    }

    /// Add a query parameter (URL only)
    pub fn query(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    fn push(&mut self, path_segment: &str, key_segment: &str) {
        self.path.push('/');
        self.path.push_str(path_segment.trim_matches('/'));
        self.bucket.push('/');
        self.bucket.push_str(key_segment.trim_matches('/'));
    }

    /// Request path relative to the API base
    pub fn path(&self) -> &str {
        if self.path.is_empty() {
            "/"
        } else {
            &self.path
        }
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn bucket_key(&self) -> BucketKey {
        if self.bucket.is_empty() {
            BucketKey("/".to_string())
        } else {
            BucketKey(self.bucket.clone())
        }
    }

    /// Gateway endpoint discovery for bot accounts
    pub fn gateway_bot() -> Self {
        Self::new().segment("gateway").segment("bot")
    }

    /// Messages collection of a channel
    pub fn channel_messages(channel_id: impl fmt::Display) -> Self {
        Self::new().channel(channel_id).segment("messages")
    }

    /// A single message of a channel
    pub fn channel_message(channel_id: impl fmt::Display, message_id: impl fmt::Display) -> Self {
        Self::channel_messages(channel_id).id(message_id)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
