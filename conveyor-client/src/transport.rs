//! Request transport
//!
//! Every call to the server goes through [`Transport::request`], which
//! normalizes the response into an [`Envelope`]: a success flag, the decoded
//! JSON body and a message. Status codes never leave this module except as
//! the optional `status` carried for diagnostics.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ConveyorClient;
use crate::error::{ClientError, Result};

/// Normalized response
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub success: bool,
    /// Response body; `Null` when the body was empty or not JSON
    pub json: Value,
    /// Server message (`msg` or `error`), or the transport failure
    pub msg: String,
    /// HTTP status, when the server was reached
    pub status: Option<u16>,
}

impl Envelope {
    pub fn ok(json: Value) -> Self {
        let msg = message_of(&json);
        Self {
            success: true,
            json,
            msg,
            status: Some(200),
        }
    }

    pub fn failed(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            json: Value::Null,
            msg: msg.into(),
            status,
        }
    }

    /// The envelope as a result, keeping the body on success
    pub fn into_result(self) -> Result<Value> {
        if self.success {
            Ok(self.json)
        } else {
            Err(ClientError::api_error(self.status, self.msg))
        }
    }

    /// Decode the body of a successful response
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let json = self.into_result()?;
        serde_json::from_value(json)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Decode the body, treating an absent or `null` body as the default
    pub fn decode_or_default<T: DeserializeOwned + Default>(self) -> Result<T> {
        let json = self.into_result()?;
        if json.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(json)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Message of a successful response
    pub fn message(self) -> Result<String> {
        if self.success {
            Ok(self.msg)
        } else {
            Err(ClientError::api_error(self.status, self.msg))
        }
    }
}

fn message_of(json: &Value) -> String {
    ["msg", "error"]
        .iter()
        .find_map(|key| json.get(key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Sends a request and normalizes the response
///
/// `path` is absolute from the server root (`/api/...`) with path segments
/// already encoded.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Envelope;
}

#[async_trait]
impl Transport for ConveyorClient {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Envelope {
        let url = format!("{}{}", self.base_url(), path);
        debug!("{} {}", method, url);

        let mut builder = self.http().request(method, &url);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to {} failed: {}", url, e);
                return Envelope::failed(None, e.to_string());
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let json = serde_json::from_str(&text).unwrap_or(Value::Null);

        if status.is_success() {
            return Envelope::ok(json);
        }

        let mut msg = message_of(&json);
        if msg.is_empty() {
            msg = if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                text
            };
        }
        debug!("{} answered {}: {}", url, status, msg);

        Envelope {
            success: false,
            json,
            msg,
            status: Some(status.as_u16()),
        }
    }
}

/// Scripted transport for tests: replays queued envelopes and records calls
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Call {
        pub method: Method,
        pub path: String,
        pub body: Option<Value>,
    }

    #[derive(Default)]
    pub struct FakeTransport {
        replies: Mutex<VecDeque<Envelope>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeTransport {
        pub fn new(replies: impl IntoIterator<Item = Envelope>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: Mutex::default(),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Envelope {
            self.calls.lock().unwrap().push(Call {
                method,
                path: path.to_string(),
                body,
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Envelope::failed(None, "no reply scripted"))
        }
    }
}
