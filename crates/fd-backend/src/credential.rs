//! Bearer credential acquisition and caching.
//!
//! A [`CredentialProvider`] owns the one cached credential of a session. The
//! cache sits behind an async mutex that is held across the exchange, so
//! concurrent callers wait for the single in-flight refresh and then share
//! its result instead of racing to the identity service.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;

pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

const COGNITO_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const COGNITO_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity service rejected the request: {0}")]
    Rejected(String),
    #[error("malformed identity response: {0}")]
    Malformed(String),
    #[error("credential command failed: {0}")]
    Command(String),
    #[error("identity exchange gave no answer within {}s", .after.as_secs_f32())]
    TimedOut { after: Duration },
}

/// Short-lived access credential.
///
/// The bearer `token` is what the agent and the record store accept. The
/// optional key triple is carried for sources that federate into scoped
/// cloud keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub session_token: Option<String>,
    pub expiry: DateTime<Utc>,
}

impl Credential {
    pub fn bearer(token: impl Into<String>, expiry: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            access_key: None,
            secret_key: None,
            session_token: None,
            expiry,
        }
    }

    /// True while `now` is more than `margin` ahead of expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        // A margin too large to represent means nothing is ever fresh enough.
        chrono::Duration::from_std(margin)
            .ok()
            .and_then(|margin| now.checked_add_signed(margin))
            .is_some_and(|deadline| deadline < self.expiry)
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("has_keys", &self.access_key.is_some())
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Something that can mint a fresh credential.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn exchange(&self) -> Result<Credential, AuthError>;
}

/// Caching front for a [`CredentialSource`].
pub struct CredentialProvider {
    source: Box<dyn CredentialSource>,
    margin: Duration,
    exchange_timeout: Duration,
    cache: Mutex<Option<Arc<Credential>>>,
}

impl CredentialProvider {
    pub fn new(source: impl CredentialSource + 'static) -> Self {
        Self::from_boxed(Box::new(source))
    }

    /// Build from a source chosen at runtime (e.g. from configuration).
    pub fn from_boxed(source: Box<dyn CredentialSource>) -> Self {
        Self {
            source,
            margin: DEFAULT_REFRESH_MARGIN,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            cache: Mutex::new(None),
        }
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Bound on a single exchange with the source. The cache lock is held
    /// for at most this long.
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Return the cached credential while valid, otherwise exchange for a new one.
    pub async fn acquire(&self) -> Result<Arc<Credential>, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(current) = cache.as_ref() {
            if current.is_valid_at(Utc::now(), self.margin) {
                return Ok(Arc::clone(current));
            }
            debug!("cached credential expired (expiry={})", current.expiry);
        }
        self.refresh_locked(&mut cache).await
    }

    /// Replace a credential that a downstream service refused.
    ///
    /// If another caller already swapped in a newer valid credential, that one
    /// is returned without a second exchange.
    pub async fn reacquire(&self, stale: &Arc<Credential>) -> Result<Arc<Credential>, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(current) = cache.as_ref() {
            if !Arc::ptr_eq(current, stale) && current.is_valid_at(Utc::now(), self.margin) {
                return Ok(Arc::clone(current));
            }
        }
        self.refresh_locked(&mut cache).await
    }

    /// Drop the cached credential; the next `acquire` exchanges again.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    async fn refresh_locked(
        &self,
        cache: &mut Option<Arc<Credential>>,
    ) -> Result<Arc<Credential>, AuthError> {
        *cache = None;
        let exchanged = tokio::time::timeout(self.exchange_timeout, self.source.exchange())
            .await
            .map_err(|_| {
                warn!(
                    "identity exchange timed out (after_ms={})",
                    self.exchange_timeout.as_millis()
                );
                AuthError::TimedOut {
                    after: self.exchange_timeout,
                }
            })??;
        let fresh = Arc::new(exchanged);
        info!("credential acquired (expiry={})", fresh.expiry);
        *cache = Some(Arc::clone(&fresh));
        Ok(fresh)
    }
}

// ---------------------------------------------------------------------------
// Cognito USER_PASSWORD_AUTH
// ---------------------------------------------------------------------------

/// Signs in against a Cognito user pool app client with a user name and
/// password and uses the returned access token as the bearer credential.
pub struct CognitoPasswordSource {
    http: Client,
    endpoint: String,
    client_id: String,
    username: String,
    password: String,
}

impl CognitoPasswordSource {
    pub fn new(
        http: Client,
        region: &str,
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: format!("https://cognito-idp.{region}.amazonaws.com/"),
            client_id: client_id.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Override the identity endpoint (private endpoints, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: AuthParameters<'a>,
}

#[derive(Serialize)]
struct AuthParameters<'a> {
    #[serde(rename = "USERNAME")]
    username: &'a str,
    #[serde(rename = "PASSWORD")]
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct CognitoFault {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(default, alias = "Message")]
    message: String,
}

#[async_trait]
impl CredentialSource for CognitoPasswordSource {
    async fn exchange(&self) -> Result<Credential, AuthError> {
        let body = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &self.client_id,
            auth_parameters: AuthParameters {
                username: &self.username,
                password: &self.password,
            },
        };

        debug!("initiating identity sign-in (endpoint={})", self.endpoint);
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-amz-target", COGNITO_TARGET)
            .header("content-type", COGNITO_CONTENT_TYPE)
            .body(serde_json::to_vec(&body).map_err(|e| AuthError::Malformed(e.to_string()))?)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<CognitoFault>(&text) {
                Ok(fault) if !fault.message.is_empty() => format!("{}: {}", fault.kind, fault.message),
                _ => text.trim().to_string(),
            };
            return Err(AuthError::Rejected(format!("{status}: {detail}")));
        }

        let parsed: InitiateAuthResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::Malformed(e.to_string()))?;
        match (parsed.authentication_result, parsed.challenge_name) {
            (Some(result), _) => {
                let expiry = chrono::Duration::try_seconds(result.expires_in)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AuthError::Malformed(format!("ExpiresIn out of range: {}", result.expires_in))
                    })?;
                Ok(Credential::bearer(result.access_token, expiry))
            }
            (None, Some(challenge)) => Err(AuthError::Rejected(format!(
                "sign-in requires unsupported challenge {challenge}"
            ))),
            (None, None) => Err(AuthError::Malformed(
                "no authentication result in response".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Token command
// ---------------------------------------------------------------------------

/// Runs a shell command (via `sh -c`) that prints a bearer token, e.g. a
/// keychain lookup or an SSO helper. The token is trusted for `ttl`.
pub struct CommandTokenSource {
    command: String,
    ttl: Duration,
}

impl CommandTokenSource {
    pub fn new(command: impl Into<String>, ttl: Duration) -> Self {
        Self {
            command: command.into(),
            ttl,
        }
    }
}

#[async_trait]
impl CredentialSource for CommandTokenSource {
    async fn exchange(&self) -> Result<Credential, AuthError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AuthError::Command(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AuthError::Command(format!("{}: {stderr}", output.status)));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AuthError::Command("command printed no token".to_string()));
        }

        let now = Utc::now();
        let expiry = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok(Credential::bearer(token, expiry))
    }
}

/// Hands out a fixed credential. For local development against unsecured
/// endpoints and for tests.
pub struct StaticSource {
    credential: Credential,
}

impl StaticSource {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialSource for StaticSource {
    async fn exchange(&self) -> Result<Credential, AuthError> {
        Ok(self.credential.clone())
    }
}
