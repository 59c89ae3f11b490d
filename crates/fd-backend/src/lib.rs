//! fd-backend: remote service clients for fleetdesk.
//!
//! Credential acquisition, the agent gateway, the record store reader, and
//! interpretation of agent replies into text and fleet records.

pub mod credential;
pub mod error;
pub mod gateway;
pub mod interpret;
pub mod mock;
pub mod store;
mod transport;

#[cfg(test)]
mod testing;

pub use credential::{
    AuthError, CognitoPasswordSource, CommandTokenSource, Credential, CredentialProvider,
    CredentialSource, StaticSource,
};
pub use error::{ErrorKind, GatewayError};
pub use gateway::{AgentClient, AgentGateway};
pub use interpret::{RecordKeyMatcher, ResponseInterpreter};
pub use mock::{MockAgent, MockConfig, MockResponse};
pub use store::RecordStore;
pub use transport::build_http_client;
