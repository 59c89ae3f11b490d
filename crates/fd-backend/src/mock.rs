//! Mock agent for testing.
//!
//! Answers prompts from a scripted queue with the same reply and error
//! shapes as the real gateway, so higher layers can be tested without HTTP.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fd_protocol::AgentReply;
use tokio::time::sleep;

use crate::credential::AuthError;
use crate::error::GatewayError;
use crate::gateway::AgentClient;

/// Configurable mock responses for testing.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Reply with this body, interpreted exactly like an HTTP response body.
    Body { body: String },
    /// Fail as if the credential was refused twice.
    AuthFailure,
    /// Fail as if the connection was refused.
    NetworkFailure,
    /// Fail as if the agent never answered within `after`.
    Timeout { after: Duration },
    /// Fail with a server status and message.
    ServerFailure { status: u16, message: String },
}

/// Configuration for the mock agent.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Responses handed out in order, one per prompt.
    pub responses: Vec<MockResponse>,
    /// Optional delay before each answer (ms).
    pub reply_delay_ms: Option<u64>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(mut self, responses: Vec<MockResponse>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_reply_delay(mut self, ms: u64) -> Self {
        self.reply_delay_ms = Some(ms);
        self
    }
}

/// Scripted [`AgentClient`]. Once the script runs out every prompt fails with
/// a network error.
pub struct MockAgent {
    responses: Mutex<VecDeque<MockResponse>>,
    reply_delay_ms: Option<u64>,
    prompts: Mutex<Vec<String>>,
}

impl MockAgent {
    pub fn new(config: MockConfig) -> Self {
        Self {
            responses: Mutex::new(config.responses.into()),
            reply_delay_ms: config.reply_delay_ms,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, trimmed, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AgentClient for MockAgent {
    async fn send(&self, prompt: &str) -> Result<AgentReply, GatewayError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GatewayError::EmptyPrompt);
        }
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(delay_ms) = self.reply_delay_ms {
            sleep(Duration::from_millis(delay_ms)).await;
        }

        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());

        match next {
            Some(MockResponse::Body { body }) => Ok(AgentReply::from_body(&body)),
            Some(MockResponse::AuthFailure) => Err(AuthError::Rejected(
                "401 Unauthorized: credential refused after refresh".to_string(),
            )
            .into()),
            Some(MockResponse::NetworkFailure) => Err(GatewayError::Network {
                message: "connection refused".to_string(),
                source: None,
            }),
            Some(MockResponse::Timeout { after }) => Err(GatewayError::Timeout { after }),
            Some(MockResponse::ServerFailure { status, message }) => {
                Err(GatewayError::Server { status, message })
            }
            None => Err(GatewayError::Network {
                message: "mock agent has no scripted response left".to_string(),
                source: None,
            }),
        }
    }
}

/// Built-in test fixtures for common scenarios.
pub mod fixtures {
    use super::*;

    /// A `{ "response": ... }` body with plain prose.
    pub fn prose(text: &str) -> MockResponse {
        MockResponse::Body {
            body: serde_json::json!({ "response": text }).to_string(),
        }
    }

    /// Prose with a vehicles payload embedded between `intro` and `outro`,
    /// the way the agent echoes its tool output.
    pub fn prose_with_vehicles(intro: &str, vehicle_ids: &[&str], outro: &str) -> MockResponse {
        let vehicles: Vec<_> = vehicle_ids
            .iter()
            .map(|id| serde_json::json!({ "vehicle_id": id, "status": "available" }))
            .collect();
        let payload = serde_json::json!({ "count": vehicles.len(), "vehicles": vehicles });
        prose(&format!("{intro} {payload} {outro}"))
    }

    /// A config that answers each prompt with the given prose in order.
    pub fn conversation(replies: &[&str]) -> MockConfig {
        MockConfig::new().with_responses(replies.iter().map(|r| prose(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn answers_in_script_order() {
        let agent = MockAgent::new(fixtures::conversation(&["first", "second"]));
        let a = agent.send("one").await.unwrap();
        let b = agent.send("two").await.unwrap();
        assert_eq!(a.response_text(), Some("first"));
        assert_eq!(b.response_text(), Some("second"));
        assert_eq!(agent.prompts(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn exhausted_script_is_network_error() {
        let agent = MockAgent::new(MockConfig::new());
        let err = agent.send("anyone?").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn scripted_failures_keep_their_kind() {
        let agent = MockAgent::new(MockConfig::new().with_responses(vec![
            MockResponse::AuthFailure,
            MockResponse::Timeout {
                after: Duration::from_secs(60),
            },
            MockResponse::ServerFailure {
                status: 502,
                message: "bad gateway".to_string(),
            },
        ]));
        assert_eq!(agent.send("a").await.unwrap_err().kind(), ErrorKind::Auth);
        assert_eq!(agent.send("b").await.unwrap_err().kind(), ErrorKind::Timeout);
        assert_eq!(agent.send("c").await.unwrap_err().kind(), ErrorKind::Server);
    }

    #[tokio::test]
    async fn empty_prompt_does_not_consume_script() {
        let agent = MockAgent::new(fixtures::conversation(&["kept"]));
        assert_eq!(agent.send("  ").await.unwrap_err().kind(), ErrorKind::Input);
        let reply = agent.send("now").await.unwrap();
        assert_eq!(reply.response_text(), Some("kept"));
    }

    #[tokio::test]
    async fn vehicles_fixture_embeds_payload_in_prose() {
        let agent = MockAgent::new(MockConfig::new().with_responses(vec![
            fixtures::prose_with_vehicles("Found:", &["V1", "V2"], "Anything else?"),
        ]));
        let reply = agent.send("find").await.unwrap();
        let text = reply.response_text().unwrap();
        assert!(text.starts_with("Found: {"));
        assert!(text.contains(r#""vehicle_id":"V2""#));
        assert!(text.ends_with("Anything else?"));
    }
}
