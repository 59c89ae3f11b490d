//! fd-core: application logic for fleetdesk.
//!
//! The chat session, the in-memory record query engine, configuration and
//! terminal rendering. Exposed as a library for integration testing.

pub mod app;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod render;
pub mod session;
pub mod style;

pub use conversation::ConversationLog;
pub use engine::{FleetSummary, RecordQueryEngine};
pub use session::ChatSession;
