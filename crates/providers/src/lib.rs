//! Backend transports for the assistant panel.
//!
//! Three adapters behind one polymorphic call contract: a cloud streaming
//! API with grounding, a template-driven custom HTTP endpoint, and the
//! remote orchestration server's SSE protocol.

pub mod custom;
pub mod gemini;
pub mod orchestrator;
pub mod selector;
pub mod template;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use selector::ProviderSelector;
pub use traits::{
    AssistantTransport, DeltaCallback, ResponseSink, StatusCallback, TurnReply, TurnRequest,
};
