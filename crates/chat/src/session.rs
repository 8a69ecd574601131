//! Session coordination for the conversation surface.
//!
//! Owns the surface's session identity, the message history, and the
//! in-flight guard, and drives one full turn: assemble the request, stream
//! it through the selected provider, reconcile deltas into a growing
//! assistant message, and run structured extraction over the final text.

use crate::extract::{extract, Extraction};
use fp_domain::error::{Error, Result};
use fp_domain::message::{ChatMessage, Language};
use fp_domain::profile::ProviderProfile;
use fp_domain::workflow::AssembledResponse;
use fp_providers::{DeltaCallback, ProviderSelector, ResponseSink, StatusCallback, TurnRequest};
use serde_json::Value;

/// How many recent messages ride along on each request.
const HISTORY_WINDOW: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A stable identity for one conversation surface.
///
/// Starts as a random token at surface load.  The first time a persisted
/// identity is discoverable from the active workflow graph, the token is
/// promoted to it, a one-way transition: once promoted, the identity
/// never reverts and never re-promotes, so every later request carries the
/// same final value.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    token: String,
    promoted: bool,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            promoted: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.token
    }

    /// Promote to the graph-carried id, once.
    pub fn observe_graph(&mut self, graph: &Value) {
        if self.promoted {
            return;
        }
        if let Some(id) = graph_session_id(graph) {
            tracing::debug!(from = %self.token, to = %id, "session identity promoted from graph");
            self.token = id;
            self.promoted = true;
        }
    }
}

/// Look up a persisted session id carried on the workflow graph:
/// `extra.session_id` first, then a top-level `id`.
fn graph_session_id(graph: &Value) -> Option<String> {
    graph
        .get("extra")
        .and_then(|e| e.get("session_id"))
        .and_then(|v| v.as_str())
        .or_else(|| graph.get("id").and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delta reconciliation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One growing assistant message record per turn.
///
/// Fragments append to the same record as they stream in; when the turn
/// completes, the record is sealed with the cleaned display text.
#[derive(Debug)]
pub struct TurnTranscript {
    message: ChatMessage,
}

impl Default for TurnTranscript {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnTranscript {
    pub fn new() -> Self {
        Self {
            message: ChatMessage::ai(String::new()),
        }
    }

    /// Append one streamed fragment.
    pub fn apply_delta(&mut self, fragment: &str) {
        self.message.text.push_str(fragment);
    }

    /// The record as accumulated so far.
    pub fn message(&self) -> &ChatMessage {
        &self.message
    }

    /// Seal the record with the extraction's cleaned display text.
    pub fn seal(mut self, extraction: &Extraction) -> ChatMessage {
        if !extraction.display_text.is_empty() {
            self.message.text = extraction.display_text.clone();
        }
        self.message
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Coordinator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Drives conversation turns for one surface.
pub struct SessionCoordinator {
    identity: SessionIdentity,
    history: Vec<ChatMessage>,
    language: Language,
    system_instruction: Option<String>,
    in_flight: bool,
}

impl SessionCoordinator {
    pub fn new(language: Language) -> Self {
        Self {
            identity: SessionIdentity::new(),
            history: Vec::new(),
            language,
            system_instruction: None,
            in_flight: false,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn session_id(&self) -> &str {
        self.identity.id()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Run one full turn: guard, assemble, stream, extract.
    ///
    /// On success the assistant message joins the history with its cleaned
    /// display text.  On failure the history keeps only the user's message
    /// (any text already delivered through `on_delta` is the surface's
    /// concern) and the error propagates.
    pub async fn run_turn(
        &mut self,
        selector: &ProviderSelector,
        profile: &ProviderProfile,
        prompt: &str,
        workflow: Option<&Value>,
        error_log: Option<&str>,
        on_delta: Option<DeltaCallback<'_>>,
        on_status: Option<StatusCallback<'_>>,
    ) -> Result<AssembledResponse> {
        if self.in_flight {
            return Err(Error::Other(
                "a previous send is still in flight for this session".into(),
            ));
        }

        if let Some(graph) = workflow {
            self.identity.observe_graph(graph);
        }

        // History rides along without the current prompt; adapters carry
        // the prompt separately.
        let history = self.recent_history();
        self.history.push(ChatMessage::user(prompt));

        let req = TurnRequest {
            prompt: prompt.to_string(),
            system_instruction: self.system_instruction.clone(),
            history,
            workflow: workflow.cloned(),
            session_id: self.identity.id().to_string(),
            error_log: error_log.map(str::to_string),
            language: self.language,
            profile_id: profile.id.clone(),
        };

        self.in_flight = true;
        let mut transcript = TurnTranscript::new();
        let result = {
            let transcript_ref = &mut transcript;
            let mut on_delta = on_delta;
            let mut forward = move |fragment: &str| {
                transcript_ref.apply_delta(fragment);
                if let Some(cb) = on_delta.as_mut() {
                    cb(fragment);
                }
            };
            let mut sink = ResponseSink::new().with_delta(&mut forward);
            if let Some(cb) = on_status {
                sink = sink.with_status(cb);
            }
            selector.call(profile, &req, &mut sink).await
        };
        self.in_flight = false;

        let reply = result?;
        let extraction = extract(&reply.text);
        self.history.push(transcript.seal(&extraction));

        Ok(assemble(reply.text, reply.sources, extraction))
    }

    /// The most recent messages, oldest first.
    fn recent_history(&self) -> Vec<ChatMessage> {
        let skip = self.history.len().saturating_sub(HISTORY_WINDOW);
        self.history[skip..].to_vec()
    }
}

fn assemble(
    text: String,
    sources: Vec<fp_domain::workflow::GroundingSource>,
    extraction: Extraction,
) -> AssembledResponse {
    AssembledResponse {
        text,
        sources,
        display_text: extraction.display_text,
        replacement_graph: extraction.replacement_graph,
        issues: extraction.issues,
        suggested_actions: extraction.suggested_actions,
        related_questions: extraction.related_questions,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_starts_random_and_unique() {
        let a = SessionIdentity::new();
        let b = SessionIdentity::new();
        assert_ne!(a.id(), b.id());
        assert!(!a.id().is_empty());
    }

    #[test]
    fn identity_promotes_from_graph_extra() {
        let mut identity = SessionIdentity::new();
        let graph = json!({"extra": {"session_id": "persisted-1"}, "nodes": []});
        identity.observe_graph(&graph);
        assert_eq!(identity.id(), "persisted-1");
    }

    #[test]
    fn identity_promotion_is_one_way() {
        let mut identity = SessionIdentity::new();
        identity.observe_graph(&json!({"extra": {"session_id": "first"}}));
        identity.observe_graph(&json!({"extra": {"session_id": "second"}}));
        assert_eq!(identity.id(), "first");
    }

    #[test]
    fn identity_keeps_random_token_until_graph_carries_an_id() {
        let mut identity = SessionIdentity::new();
        let before = identity.id().to_string();
        identity.observe_graph(&json!({"nodes": [], "extra": {}}));
        assert_eq!(identity.id(), before);

        // Still promotable later.
        identity.observe_graph(&json!({"id": "top-level"}));
        assert_eq!(identity.id(), "top-level");
    }

    #[test]
    fn graph_extra_wins_over_top_level_id() {
        let graph = json!({"id": "outer", "extra": {"session_id": "inner"}});
        assert_eq!(graph_session_id(&graph).as_deref(), Some("inner"));
    }

    #[test]
    fn empty_graph_id_is_ignored() {
        assert!(graph_session_id(&json!({"id": ""})).is_none());
        assert!(graph_session_id(&json!({"id": 42})).is_none());
    }

    #[test]
    fn transcript_grows_one_record() {
        let mut transcript = TurnTranscript::new();
        let id = transcript.message().id.clone();
        transcript.apply_delta("Hel");
        transcript.apply_delta("lo");
        assert_eq!(transcript.message().text, "Hello");
        assert_eq!(transcript.message().id, id);
    }

    #[test]
    fn seal_swaps_in_display_text() {
        let mut transcript = TurnTranscript::new();
        transcript.apply_delta("raw ISSUES_JSON: []");
        let extraction = Extraction {
            display_text: "raw".into(),
            ..Default::default()
        };
        let message = transcript.seal(&extraction);
        assert_eq!(message.text, "raw");
    }

    #[test]
    fn recent_history_trims_to_window() {
        let mut coordinator = SessionCoordinator::new(Language::En);
        for i in 0..15 {
            coordinator.history.push(ChatMessage::user(format!("m{i}")));
        }
        let recent = coordinator.recent_history();
        assert_eq!(recent.len(), HISTORY_WINDOW);
        assert_eq!(recent.first().unwrap().text, "m5");
        assert_eq!(recent.last().unwrap().text, "m14");
    }

    #[test]
    fn short_history_passes_through_whole() {
        let mut coordinator = SessionCoordinator::new(Language::En);
        coordinator.history.push(ChatMessage::user("only"));
        assert_eq!(coordinator.recent_history().len(), 1);
    }

    #[tokio::test]
    async fn second_send_rejected_while_in_flight() {
        let mut coordinator = SessionCoordinator::new(Language::En);
        coordinator.in_flight = true;

        let profile = ProviderProfile {
            id: "p".into(),
            kind: fp_domain::profile::ProviderKind::Orchestration,
            name: "t".into(),
            api_key: None,
            model: None,
            base_url: Some("http://127.0.0.1:9".into()),
            request_template: None,
        };
        let err = coordinator
            .run_turn(
                &ProviderSelector::new(),
                &profile,
                "hi",
                None,
                None,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("in flight"));
        // The rejected send must not touch the history.
        assert!(coordinator.history().is_empty());
    }
}
