//! Shared HTTP plumbing: bounded exchanges and the single re-auth retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use reqwest::{Client, RequestBuilder, StatusCode};

use crate::credential::{AuthError, Credential, CredentialProvider};
use crate::error::GatewayError;

/// Result of one HTTP attempt that got a response.
pub(crate) enum Outcome {
    Body(String),
    /// 401/403: the credential was refused.
    Unauthorized(StatusCode),
}

/// Ceiling on any single request made with the shared client, identity
/// exchanges included. Callers apply tighter bounds of their own.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Build an HTTP client with appropriate timeouts and connection limits.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(CLIENT_TIMEOUT)
        .pool_max_idle_per_host(2)
        .build()
}

/// Send `request` and read the whole body, abandoning the call after `bound`.
pub(crate) async fn bounded(
    request: RequestBuilder,
    bound: Duration,
) -> Result<Outcome, GatewayError> {
    let exchange = async {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok::<_, reqwest::Error>((status, body))
    };

    let (status, body) = match tokio::time::timeout(bound, exchange).await {
        Ok(result) => result.map_err(|e| GatewayError::from_transport(e, bound))?,
        Err(_) => return Err(GatewayError::Timeout { after: bound }),
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Ok(Outcome::Unauthorized(status));
    }
    if !status.is_success() {
        return Err(GatewayError::server(status, &body));
    }
    Ok(Outcome::Body(body))
}

/// Run `attempt` under a credential. A refused credential is replaced once
/// and the attempt repeated once; a second refusal is reported, not retried.
///
/// `bound` covers the whole call: credential exchanges and both attempts.
pub(crate) async fn with_reauth<F, Fut>(
    credentials: &CredentialProvider,
    bound: Duration,
    attempt: F,
) -> Result<String, GatewayError>
where
    F: FnMut(Arc<Credential>) -> Fut,
    Fut: Future<Output = Result<Outcome, GatewayError>>,
{
    match tokio::time::timeout(bound, authorized(credentials, attempt)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("exchange abandoned (after_ms={})", bound.as_millis());
            Err(GatewayError::Timeout { after: bound })
        }
    }
}

async fn authorized<F, Fut>(
    credentials: &CredentialProvider,
    mut attempt: F,
) -> Result<String, GatewayError>
where
    F: FnMut(Arc<Credential>) -> Fut,
    Fut: Future<Output = Result<Outcome, GatewayError>>,
{
    let credential = credentials.acquire().await?;
    match attempt(Arc::clone(&credential)).await? {
        Outcome::Body(body) => Ok(body),
        Outcome::Unauthorized(status) => {
            warn!("credential refused, refreshing once (status={status})");
            let fresh = credentials.reacquire(&credential).await?;
            match attempt(fresh).await? {
                Outcome::Body(body) => Ok(body),
                Outcome::Unauthorized(status) => {
                    credentials.invalidate().await;
                    Err(AuthError::Rejected(format!(
                        "{status}: credential refused after refresh"
                    ))
                    .into())
                }
            }
        }
    }
}
