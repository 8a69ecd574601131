use fp_domain::error::Result;
use fp_domain::message::{ChatMessage, Language};
use fp_domain::stream::StatusUpdate;
use fp_domain::workflow::GroundingSource;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Reply types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One conversational turn, assembled by the session coordinator.
///
/// Every adapter receives the full request and uses the fields its wire
/// protocol knows about: the custom adapter uses prompt + system
/// instruction, the cloud adapter additionally replays history, and the
/// orchestration adapter forwards workflow/session/error-log context.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// The user's current prompt.
    pub prompt: String,
    /// System instruction, when the surface supplies one.
    pub system_instruction: Option<String>,
    /// Trimmed recent conversation history (most recent last).
    pub history: Vec<ChatMessage>,
    /// The active workflow graph, read-only, as the canvas serializes it.
    pub workflow: Option<serde_json::Value>,
    pub session_id: String,
    /// Recent execution errors from the host, for diagnosis.
    pub error_log: Option<String>,
    pub language: Language,
    /// The provider profile id this turn was resolved against.
    pub profile_id: String,
}

/// What a transport returns: the fully accumulated text plus any grounding
/// sources the backend attached.  Structured extraction happens later, over
/// the final text.
#[derive(Debug, Clone, Default)]
pub struct TurnReply {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Callback channels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type DeltaCallback<'a> = &'a mut (dyn FnMut(&str) + Send);
pub type StatusCallback<'a> = &'a mut (dyn FnMut(&StatusUpdate) + Send);

/// The two caller-supplied callback channels of the uniform call contract.
///
/// Both channels are optional; adapters invoke them synchronously within
/// the chunk-read continuation, strictly in receive order.  Delta callbacks
/// receive only the new fragment, never the cumulative text.
#[derive(Default)]
pub struct ResponseSink<'a> {
    on_delta: Option<DeltaCallback<'a>>,
    on_status: Option<StatusCallback<'a>>,
}

impl<'a> ResponseSink<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delta(mut self, on_delta: DeltaCallback<'a>) -> Self {
        self.on_delta = Some(on_delta);
        self
    }

    pub fn with_status(mut self, on_status: StatusCallback<'a>) -> Self {
        self.on_status = Some(on_status);
        self
    }

    /// Deliver one incremental text fragment.
    pub fn delta(&mut self, fragment: &str) {
        if let Some(cb) = self.on_delta.as_mut() {
            cb(fragment);
        }
    }

    /// Deliver one status update.
    pub fn status(&mut self, update: &StatusUpdate) {
        if let Some(cb) = self.on_status.as_mut() {
            cb(update);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core transport trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every backend adapter implements.
///
/// Implementations translate the uniform turn request into one of three
/// incompatible wire protocols (cloud streaming, single-shot custom HTTP,
/// orchestration SSE) and normalize their output into the incremental
/// callback contract plus one final [`TurnReply`].
#[async_trait::async_trait]
pub trait AssistantTransport: Send + Sync + std::fmt::Debug {
    /// Run one turn against the backend, forwarding fragments and status
    /// updates to the sink as they arrive.
    async fn call(&self, req: &TurnRequest, sink: &mut ResponseSink<'_>) -> Result<TurnReply>;

    /// A short identifier for logging.
    fn transport_id(&self) -> &str;
}
