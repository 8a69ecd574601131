use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for incremental provider responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events decoded from the orchestration server's SSE stream.
///
/// `Content` carries a text fragment; `Status` and `Meta` both surface on
/// the status callback channel, with `Meta` additionally carrying arbitrary
/// step-level detail from the server's agent graph.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A fragment of assistant text.
    #[serde(rename = "content")]
    Content { chunk: String },

    /// The server entered a new processing phase.
    #[serde(rename = "status_update")]
    Status(StatusUpdate),

    /// Phase metadata (e.g. search previews) from a server node.
    #[serde(rename = "meta_update")]
    Meta(StatusUpdate),
}

/// The value delivered on the status callback channel.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    /// Server-side node that produced the update.
    pub node: String,
    /// Human-readable phase text.
    pub display_text: String,
    pub status: PhaseStatus,
    /// Arbitrary step detail (meta updates only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_data: Option<serde_json::Value>,
}

/// Machine-readable phase state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Processing,
    Done,
    Error,
}

impl PhaseStatus {
    /// Parse the wire string, defaulting to `Processing` for anything
    /// unrecognized or absent.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("done") => PhaseStatus::Done,
            Some("error") => PhaseStatus::Error,
            _ => PhaseStatus::Processing,
        }
    }
}
