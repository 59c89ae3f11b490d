//! fd-protocol: Shared types for fleetdesk.
//!
//! Fleet records, conversation messages, agent reply shapes, and the query
//! specification consumed by the record query engine.

pub mod message;
pub mod query;
pub mod record;

pub use message::{AgentReply, ChatMessage, InterpretedReply, Role};
pub use query::{
    FieldKind, PageSpec, QueryResult, QuerySpec, RecordField, SortSpec, DEFAULT_PAGE_SIZE,
};
pub use record::{FleetRecord, LooseNumber, VehicleStatus};
