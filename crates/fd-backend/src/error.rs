//! Classified failures of a remote exchange.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::credential::AuthError;

const MAX_SERVER_MESSAGE: usize = 300;

/// Coarse failure class, used by callers to pick user-facing wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Auth,
    Network,
    Timeout,
    Server,
    Parse,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
    #[error("no response within {}s", .after.as_secs())]
    Timeout { after: Duration },
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("unreadable response: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyPrompt => ErrorKind::Input,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Server { .. } => ErrorKind::Server,
            Self::Parse { .. } => ErrorKind::Parse,
        }
    }

    /// Classify a transport failure. `bound` is the wait limit that was in force.
    ///
    /// A failed connect is a network failure even when it failed by timing
    /// out; nothing reached the server.
    pub fn from_transport(err: reqwest::Error, bound: Duration) -> Self {
        if err.is_connect() {
            Self::Network {
                message: err.to_string(),
                source: Some(err),
            }
        } else if err.is_timeout() {
            Self::Timeout { after: bound }
        } else if err.is_decode() {
            Self::Parse {
                message: err.to_string(),
                source: Some(err),
            }
        } else {
            Self::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }

    /// Build a server error from a non-2xx status and its body. The message
    /// prefers an `error` or `message` field of a JSON body.
    pub fn server(status: StatusCode, body: &str) -> Self {
        let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
            ["error", "message", "Message"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        });
        let message = match from_json {
            Some(m) => m,
            None if !body.trim().is_empty() => truncate(body.trim(), MAX_SERVER_MESSAGE),
            None => status.canonical_reason().unwrap_or("no details").to_string(),
        };
        Self::Server {
            status: status.as_u16(),
            message,
        }
    }

    /// Text suitable for showing to the operator. Each failure ends only the
    /// current exchange, so the wording always invites another attempt.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyPrompt => "Type a question before sending.".to_string(),
            Self::Auth(_) => {
                "Your session could not be verified. Please retry, or sign in again.".to_string()
            }
            Self::Network { .. } => {
                "Could not reach the fleet assistant. Check your connection and try again."
                    .to_string()
            }
            Self::Timeout { after } => format!(
                "The assistant did not answer within {} seconds. It may still be working on your request; try again shortly.",
                after.as_secs()
            ),
            Self::Server { status, message } => {
                format!("The assistant reported an error ({status}): {message}")
            }
            Self::Parse { .. } => "The assistant's reply could not be read.".to_string(),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
