//! Workflow-facing value objects.
//!
//! The workflow graph itself is an external collaborator owned by the host
//! canvas; the core only reads it as opaque JSON and produces these values
//! when interpreting a model response.

use serde::{Deserialize, Serialize};

/// A diagnosed problem in the user's workflow graph.
///
/// Constructed fresh per response, never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowIssue {
    /// Generated unique identifier.
    pub id: String,
    /// Referenced graph node, when the model named one.
    #[serde(default)]
    pub node_id: Option<i64>,
    pub severity: IssueSeverity,
    pub message: String,
    #[serde(default)]
    pub fix_suggestion: Option<String>,
}

impl WorkflowIssue {
    pub fn new(
        node_id: Option<i64>,
        severity: IssueSeverity,
        message: impl Into<String>,
        fix_suggestion: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node_id,
            severity,
            message: message.into(),
            fix_suggestion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    #[default]
    Warning,
    Info,
}

impl IssueSeverity {
    /// Parse the wire string, defaulting to `Warning` for anything
    /// unrecognized or absent.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("error") => IssueSeverity::Error,
            Some("info") => IssueSeverity::Info,
            _ => IssueSeverity::Warning,
        }
    }
}

/// A citation a cloud provider attached to generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

/// The fully interpreted result of one assistant turn: the raw assembled
/// text, grounding sources, and the structured payloads recovered from the
/// tagged regions of the text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssembledResponse {
    /// Raw accumulated text, exactly as streamed.
    pub text: String,
    /// Grounding sources, de-duplicated by uri in first-seen order.
    pub sources: Vec<GroundingSource>,
    /// Text with extracted regions removed or replaced, for display.
    pub display_text: String,
    /// Replacement workflow graph, when the model produced one.
    pub replacement_graph: Option<serde_json::Value>,
    pub issues: Vec<WorkflowIssue>,
    pub suggested_actions: Vec<String>,
    pub related_questions: Vec<String>,
}
