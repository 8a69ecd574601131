//! Structured extraction over the final assembled response text.
//!
//! Model output may carry up to four tagged regions: a fenced ```json
//! block with a full replacement workflow, an `ISSUES_JSON` array, a
//! `SUGGESTED_ACTIONS` list, and a `RELATED_QUESTIONS` array.  Each region
//! is probed independently over the same text: there is no shared cursor,
//! and a malformed region degrades to an absent payload without touching
//! the others.  Model-written JSON is repaired defensively before parsing:
//! line and block comments are stripped, as are trailing commas.

use fp_domain::workflow::{IssueSeverity, WorkflowIssue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Replaces the replacement-graph block in the display text.
const GRAPH_PLACEHOLDER: &str = "[An updated workflow is attached to this reply.]";

static GRAPH_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.+?)\s*```").unwrap());
static ISSUES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)ISSUES_JSON:?\s*(?:```(?:json)?\s*)?(\[.*?\])(?:\s*```)?").unwrap()
});
static ACTIONS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SUGGESTED_ACTIONS:?\s*\[([^\]]*)\]").unwrap());
static QUESTIONS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)RELATED_QUESTIONS:?\s*(?:```(?:json)?\s*)?(\[.*?\])(?:\s*```)?").unwrap()
});

static BLOCK_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
// `//` only counts as a comment at line start or after whitespace, so
// `https://` inside string values survives.
static LINE_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)(^|\s)//[^\n]*").unwrap());
static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Structured payloads recovered from one response text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    /// The text with the graph block replaced by a placeholder and the
    /// three tagged regions removed.
    pub display_text: String,
    pub replacement_graph: Option<Value>,
    pub issues: Vec<WorkflowIssue>,
    pub suggested_actions: Vec<String>,
    pub related_questions: Vec<String>,
}

/// Run all probes over the fully assembled text.
///
/// Pure and one-shot: call it once per completed response, never on
/// partial streamed text.
pub fn extract(full_text: &str) -> Extraction {
    let replacement_graph = extract_replacement_graph(full_text);
    let issues = extract_issues(full_text);
    let suggested_actions = extract_suggested_actions(full_text);
    let related_questions = extract_related_questions(full_text);
    let display_text = build_display_text(full_text, replacement_graph.is_some());

    Extraction {
        display_text,
        replacement_graph,
        issues,
        suggested_actions,
        related_questions,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Individual probes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Repair model-written JSON: strip comments and trailing commas.
fn clean_json_text(raw: &str) -> String {
    let no_block = BLOCK_COMMENT_RE.replace_all(raw, "");
    let no_line = LINE_COMMENT_RE.replace_all(&no_block, "$1");
    TRAILING_COMMA_RE.replace_all(&no_line, "$1").into_owned()
}

/// The first fenced ```json block, when it parses to a graph object.
fn extract_replacement_graph(text: &str) -> Option<Value> {
    let raw = GRAPH_BLOCK_RE.captures(text)?.get(1)?.as_str();
    let cleaned = clean_json_text(raw);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(v) if v.is_object() => Some(v),
        Ok(_) => {
            tracing::warn!("first fenced json block is not a graph object, ignoring");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable replacement graph block");
            None
        }
    }
}

fn extract_issues(text: &str) -> Vec<WorkflowIssue> {
    let raw = match ISSUES_RE.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => return Vec::new(),
    };
    let cleaned = clean_json_text(raw);
    let parsed: Value = match serde_json::from_str(&cleaned) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable issues region");
            return Vec::new();
        }
    };

    parsed
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    WorkflowIssue::new(
                        item.get("nodeId").and_then(|v| v.as_i64()),
                        IssueSeverity::parse(item.get("severity").and_then(|v| v.as_str())),
                        item.get("message")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default(),
                        item.get("fixSuggestion")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `SUGGESTED_ACTIONS: [Action1, Action2]` -- simple bracket-content
/// extraction, not JSON-strict.
fn extract_suggested_actions(text: &str) -> Vec<String> {
    let inner = match ACTIONS_RE.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => return Vec::new(),
    };

    inner
        .split(',')
        .map(|item| {
            item.trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

fn extract_related_questions(text: &str) -> Vec<String> {
    let raw = match QUESTIONS_RE.captures(text).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => return Vec::new(),
    };
    let cleaned = clean_json_text(raw);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable related questions region");
            Vec::new()
        }
    }
}

/// Rewrite the raw text for display: swap the recognized graph block for a
/// placeholder and drop each tagged region independently.
fn build_display_text(text: &str, graph_recognized: bool) -> String {
    let mut display = if graph_recognized {
        GRAPH_BLOCK_RE.replace(text, GRAPH_PLACEHOLDER).into_owned()
    } else {
        text.to_string()
    };

    display = ISSUES_RE.replace_all(&display, "").into_owned();
    display = ACTIONS_RE.replace_all(&display, "").into_owned();
    display = QUESTIONS_RE.replace_all(&display, "").into_owned();

    display.trim().to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
