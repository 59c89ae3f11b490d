//! Agent endpoint client: one prompt in, one raw reply out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fd_protocol::AgentReply;
use log::{debug, info};
use reqwest::Client;
use serde::Serialize;

use crate::credential::CredentialProvider;
use crate::error::GatewayError;
use crate::transport::{bounded, with_reauth};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const PROMPT_PREVIEW_CHARS: usize = 80;

/// Anything that can answer a prompt. Implemented by [`AgentGateway`] and by
/// the mock agent used in tests.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn send(&self, prompt: &str) -> Result<AgentReply, GatewayError>;
}

/// HTTP client for the remote agent.
///
/// Exactly one request is in flight per [`send`](AgentClient::send). Timeouts
/// are not retried: the agent may still be working and a repeat could run
/// its tools twice.
pub struct AgentGateway {
    http: Client,
    endpoint: String,
    timeout: Duration,
    credentials: Arc<CredentialProvider>,
}

#[derive(Serialize)]
struct PromptBody<'a> {
    prompt: &'a str,
}

impl AgentGateway {
    pub fn new(
        http: Client,
        endpoint: impl Into<String>,
        credentials: Arc<CredentialProvider>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
            credentials,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AgentClient for AgentGateway {
    async fn send(&self, prompt: &str) -> Result<AgentReply, GatewayError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GatewayError::EmptyPrompt);
        }

        debug!(
            "sending prompt (endpoint={}, prompt={:?})",
            self.endpoint,
            preview(prompt)
        );

        let body = with_reauth(&self.credentials, self.timeout, |credential| {
            let request = self
                .http
                .post(&self.endpoint)
                .header("authorization", credential.authorization_header())
                .header("content-type", "application/json")
                .json(&PromptBody { prompt });
            bounded(request, self.timeout)
        })
        .await?;

        info!("agent replied (bytes={})", body.len());
        Ok(AgentReply::from_body(&body))
    }
}

fn preview(prompt: &str) -> String {
    let mut shown: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
    if prompt.chars().count() > PROMPT_PREVIEW_CHARS {
        shown.push_str("...");
    }
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{
        AuthError, CognitoPasswordSource, Credential, CredentialSource, StaticSource,
    };
    use crate::error::ErrorKind;
    use crate::testing::{
        closed_port_url, spawn_one_shot_server, spawn_scripted_server, spawn_silent_server,
    };
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn static_provider(token: &str) -> Arc<CredentialProvider> {
        Arc::new(CredentialProvider::new(StaticSource::new(Credential::bearer(
            token,
            Utc::now() + chrono::Duration::hours(1),
        ))))
    }

    struct Rotating {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CredentialSource for Rotating {
        async fn exchange(&self) -> Result<Credential, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credential::bearer(
                format!("tok-{n}"),
                Utc::now() + chrono::Duration::hours(1),
            ))
        }
    }

    fn ok(body: &str) -> (String, String) {
        ("200 OK".to_string(), body.to_string())
    }

    #[tokio::test]
    async fn sends_prompt_with_bearer_and_json_body() {
        let (url, requests) = spawn_scripted_server(vec![ok(
            r#"{"response":"Two Camrys in 90001","session_id":"abc"}"#,
        )]);
        let gateway = AgentGateway::new(Client::new(), url, static_provider("tok-xyz"));

        let reply = gateway.send("  any camrys?  ").await.unwrap();
        assert_eq!(reply.response_text(), Some("Two Camrys in 90001"));
        assert_eq!(reply.session_id(), Some("abc"));

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].head.starts_with("POST "));
        assert_eq!(
            requests[0].header("authorization").as_deref(),
            Some("Bearer tok-xyz")
        );
        assert_eq!(
            requests[0].header("content-type").as_deref(),
            Some("application/json")
        );
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body, serde_json::json!({"prompt": "any camrys?"}));
    }

    #[tokio::test]
    async fn bare_string_reply() {
        let url = spawn_one_shot_server("200 OK", r#""hello there""#);
        let gateway = AgentGateway::new(Client::new(), url, static_provider("t"));
        let reply = gateway.send("hi").await.unwrap();
        assert_eq!(reply, AgentReply::Text("hello there".to_string()));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_dispatch() {
        let gateway = AgentGateway::new(Client::new(), closed_port_url(), static_provider("t"));
        let err = gateway.send("   \n").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (url, _listener) = spawn_silent_server();
        let gateway = AgentGateway::new(Client::new(), url, static_provider("t"))
            .with_timeout(Duration::from_millis(300));
        let err = gateway.send("are you there?").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn silent_identity_service_does_not_stall_send() {
        let (identity_url, _identity) = spawn_silent_server();
        let (agent_url, _requests) = spawn_scripted_server(vec![ok(r#"{"response":"hi"}"#)]);
        let source = CognitoPasswordSource::new(Client::new(), "us-east-1", "c", "u", "p")
            .with_endpoint(identity_url);
        let gateway = AgentGateway::new(
            Client::new(),
            agent_url,
            Arc::new(CredentialProvider::new(source)),
        )
        .with_timeout(Duration::from_millis(300));

        let started = std::time::Instant::now();
        let err = gateway.send("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let gateway = AgentGateway::new(Client::new(), closed_port_url(), static_provider("t"));
        let err = gateway.send("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn connect_timeout_is_network_error() {
        // Non-routable address: the connect attempt hangs until the client gives up.
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let gateway = AgentGateway::new(http, "http://10.255.255.1:81/", static_provider("t"))
            .with_timeout(Duration::from_secs(10));
        let err = gateway.send("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn server_failure_carries_status_and_message() {
        let url = spawn_one_shot_server(
            "500 Internal Server Error",
            r#"{"error":"Failed to authenticate"}"#,
        );
        let gateway = AgentGateway::new(Client::new(), url, static_provider("t"));
        let err = gateway.send("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        let text = err.to_string();
        assert!(text.contains("500"));
        assert!(text.contains("Failed to authenticate"));
    }

    #[tokio::test]
    async fn unauthorized_refreshes_credential_once_and_retries() {
        let (url, requests) = spawn_scripted_server(vec![
            ("401 Unauthorized".to_string(), r#"{"message":"expired"}"#.to_string()),
            ok(r#"{"response":"ok"}"#),
        ]);
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CredentialProvider::new(Rotating {
            calls: Arc::clone(&calls),
        }));
        let gateway = AgentGateway::new(Client::new(), url, provider);

        let reply = gateway.send("hello").await.unwrap();
        assert_eq!(reply.response_text(), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0].header("authorization").as_deref(), Some("Bearer tok-0"));
        assert_eq!(requests[1].header("authorization").as_deref(), Some("Bearer tok-1"));
    }

    #[tokio::test]
    async fn repeated_unauthorized_is_reported_as_auth() {
        let (url, requests) = spawn_scripted_server(vec![
            ("401 Unauthorized".to_string(), String::new()),
            ("403 Forbidden".to_string(), String::new()),
            ok(r#"{"response":"never reached"}"#),
        ]);
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Arc::new(CredentialProvider::new(Rotating {
            calls: Arc::clone(&calls),
        }));
        let gateway = AgentGateway::new(Client::new(), url, provider);

        let err = gateway.send("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[test]
    fn preview_truncates_long_prompts() {
        let long = "a".repeat(200);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), PROMPT_PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
