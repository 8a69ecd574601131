//! Orchestration-server adapter.
//!
//! Opens one POST to `{remote}/api/chat/stream` and consumes the server's
//! SSE event protocol: `data: <json>` lines carrying content chunks and
//! phase updates from the server's agent graph, terminated by a `[DONE]`
//! sentinel.  Content chunks feed the delta channel; status and meta
//! events feed the status channel.  Grounding is not supported by this
//! transport, so the source list is always empty.

use crate::sse::sse_event_stream;
use crate::traits::{AssistantTransport, ResponseSink, TurnReply, TurnRequest};
use crate::util::from_reqwest;
use fp_domain::error::{Error, Result};
use fp_domain::profile::ProviderProfile;
use fp_domain::stream::{PhaseStatus, StatusUpdate, StreamEvent};
use futures_util::StreamExt;
use serde_json::Value;

const STREAM_PATH: &str = "/api/chat/stream";
const DONE_SENTINEL: &str = "[DONE]";
/// Shown when a status event carries no display text of its own.
const GENERIC_PHASE_TEXT: &str = "Processing...";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for the remote orchestration server's streaming protocol.
#[derive(Debug)]
pub struct OrchestratorProvider {
    id: String,
    base_url: String,
    client: reqwest::Client,
}

impl OrchestratorProvider {
    /// Create the adapter from a resolved profile.  Fails with a
    /// configuration error when the remote address is missing.
    pub fn from_profile(profile: &ProviderProfile) -> Result<Self> {
        let base_url = profile
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "profile '{}': orchestration provider requires a remote address",
                    profile.id
                ))
            })?
            .trim_end_matches('/')
            .to_string();

        // No request timeout: the agent graph can legitimately run for
        // minutes while streaming phase updates.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: profile.id.clone(),
            base_url,
            client,
        })
    }

    fn build_body(req: &TurnRequest) -> Value {
        serde_json::json!({
            "message": req.prompt,
            "workflow": req.workflow,
            "session_id": req.session_id,
            "error_log": req.error_log,
            "language": req.language,
            "config_id": req.profile_id,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse one `data:` payload into stream events.
///
/// The `[DONE]` sentinel is consumed silently, and a malformed payload is
/// logged and skipped; one bad event never aborts the stream.
fn parse_stream_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data == DONE_SENTINEL {
        return Vec::new();
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, payload = %data, "skipping malformed stream event");
            return Vec::new();
        }
    };

    decode_stream_event(&v).map(Ok).into_iter().collect()
}

/// Dispatch a decoded event object on its `type` field.
///
/// `status_update` and `meta_update` become status events.  `content`
/// events become content deltas, as do events with no type at all but a
/// non-empty `chunk` field (how the server reports terminal errors).
/// Any other type is ignored.
fn decode_stream_event(v: &Value) -> Option<StreamEvent> {
    let chunk = v.get("chunk").and_then(|c| c.as_str()).unwrap_or("");

    match v.get("type").and_then(|t| t.as_str()) {
        Some("status_update") => Some(StreamEvent::Status(decode_status(v))),
        Some("meta_update") => Some(StreamEvent::Meta(decode_status(v))),
        Some("content") => {
            if chunk.is_empty() {
                None
            } else {
                Some(StreamEvent::Content {
                    chunk: chunk.to_string(),
                })
            }
        }
        Some(_) => None,
        None => {
            if chunk.is_empty() {
                None
            } else {
                Some(StreamEvent::Content {
                    chunk: chunk.to_string(),
                })
            }
        }
    }
}

fn decode_status(v: &Value) -> StatusUpdate {
    let metadata = v.get("metadata");
    let get = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    StatusUpdate {
        node: get("node").unwrap_or_default(),
        display_text: get("display_text").unwrap_or_else(|| GENERIC_PHASE_TEXT.into()),
        status: PhaseStatus::parse(
            metadata
                .and_then(|m| m.get("status"))
                .and_then(|v| v.as_str()),
        ),
        step_data: metadata.and_then(|m| m.get("step_data")).cloned(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl AssistantTransport for OrchestratorProvider {
    async fn call(&self, req: &TurnRequest, sink: &mut ResponseSink<'_>) -> Result<TurnReply> {
        let url = format!("{}{STREAM_PATH}", self.base_url);
        let body = Self::build_body(req);

        tracing::debug!(provider = %self.id, url = %url, session_id = %req.session_id, "orchestration stream request");

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let reason = resp.text().await.unwrap_or_default();
            return Err(Error::Transport {
                url,
                status: status.as_u16(),
                body: reason,
            });
        }

        let mut stream = sse_event_stream(resp, parse_stream_data);
        let mut text = String::new();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Content { chunk } => {
                    text.push_str(&chunk);
                    sink.delta(&chunk);
                }
                StreamEvent::Status(update) | StreamEvent::Meta(update) => {
                    sink.status(&update);
                }
            }
        }

        Ok(TurnReply {
            text,
            sources: Vec::new(),
        })
    }

    fn transport_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::drain_data_lines;
    use fp_domain::message::Language;

    fn collect_events(payload: &str) -> Vec<StreamEvent> {
        let mut buf = String::from(payload);
        drain_data_lines(&mut buf)
            .iter()
            .flat_map(|data| parse_stream_data(data))
            .map(|e| e.unwrap())
            .collect()
    }

    #[test]
    fn content_chunks_accumulate_in_order() {
        let payload = "data: {\"type\":\"content\",\"chunk\":\"Hel\"}\n\
                       data: {\"type\":\"content\",\"chunk\":\"lo\"}\n\
                       data: [DONE]\n";
        let events = collect_events(payload);
        assert_eq!(events.len(), 2);

        let text: String = events
            .iter()
            .map(|e| match e {
                StreamEvent::Content { chunk } => chunk.as_str(),
                _ => panic!("expected content"),
            })
            .collect();
        assert_eq!(text, "Hello");
    }

    #[test]
    fn done_sentinel_is_silent() {
        assert!(parse_stream_data("[DONE]").is_empty());
    }

    #[test]
    fn malformed_event_is_skipped_not_fatal() {
        assert!(parse_stream_data("{truncated").is_empty());
    }

    #[test]
    fn status_update_defaults() {
        let v: Value =
            serde_json::from_str(r#"{"chunk":"","type":"status_update","metadata":{"node":"search_solutions"}}"#)
                .unwrap();
        match decode_stream_event(&v) {
            Some(StreamEvent::Status(update)) => {
                assert_eq!(update.node, "search_solutions");
                assert_eq!(update.display_text, GENERIC_PHASE_TEXT);
                assert_eq!(update.status, PhaseStatus::Processing);
                assert!(update.step_data.is_none());
            }
            other => panic!("expected status event, got {other:?}"),
        }
    }

    #[test]
    fn status_update_with_full_metadata() {
        let v: Value = serde_json::from_str(
            r#"{"chunk":"","type":"status_update","metadata":{"node":"analyze_workflow","display_text":"Analyzing...","status":"done"}}"#,
        )
        .unwrap();
        match decode_stream_event(&v) {
            Some(StreamEvent::Status(update)) => {
                assert_eq!(update.display_text, "Analyzing...");
                assert_eq!(update.status, PhaseStatus::Done);
            }
            other => panic!("expected status event, got {other:?}"),
        }
    }

    #[test]
    fn meta_update_carries_step_data() {
        let v: Value = serde_json::from_str(
            r#"{"chunk":"","type":"meta_update","metadata":{"node":"search_solutions","step_data":{"search_previews":["a","b"]}}}"#,
        )
        .unwrap();
        match decode_stream_event(&v) {
            Some(StreamEvent::Meta(update)) => {
                let previews = update.step_data.unwrap();
                assert_eq!(previews["search_previews"][0], "a");
            }
            other => panic!("expected meta event, got {other:?}"),
        }
    }

    #[test]
    fn bare_chunk_without_type_is_content() {
        let v: Value =
            serde_json::from_str(r#"{"chunk":"Error: upstream failed","is_complete":true}"#)
                .unwrap();
        match decode_stream_event(&v) {
            Some(StreamEvent::Content { chunk }) => {
                assert_eq!(chunk, "Error: upstream failed");
            }
            other => panic!("expected content event, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_type_is_ignored() {
        let v: Value =
            serde_json::from_str(r#"{"chunk":"","is_complete":true,"type":"end"}"#).unwrap();
        assert!(decode_stream_event(&v).is_none());

        let v: Value = serde_json::from_str(r#"{"type":"telemetry","chunk":"x"}"#).unwrap();
        assert!(decode_stream_event(&v).is_none());
    }

    #[test]
    fn empty_content_chunk_is_dropped() {
        let v: Value = serde_json::from_str(r#"{"type":"content","chunk":""}"#).unwrap();
        assert!(decode_stream_event(&v).is_none());
    }

    #[test]
    fn request_body_carries_turn_context() {
        let req = TurnRequest {
            prompt: "fix it".into(),
            workflow: Some(serde_json::json!({"nodes": []})),
            session_id: "s-1".into(),
            error_log: Some("KSampler failed".into()),
            language: Language::En,
            profile_id: "cfg-9".into(),
            ..Default::default()
        };
        let body = OrchestratorProvider::build_body(&req);
        assert_eq!(body["message"], "fix it");
        assert_eq!(body["session_id"], "s-1");
        assert_eq!(body["error_log"], "KSampler failed");
        assert_eq!(body["language"], "en");
        assert_eq!(body["config_id"], "cfg-9");
        assert!(body["workflow"]["nodes"].is_array());
    }

    /// Arbitrary chunk boundaries must not change the dispatched events:
    /// the orchestration transport's core line-buffering property.
    #[test]
    fn chunk_boundaries_do_not_change_events() {
        let payload = "data: {\"type\":\"status_update\",\"metadata\":{\"node\":\"a\"}}\n\
                       data: {\"type\":\"content\",\"chunk\":\"one\"}\n\
                       data: {\"type\":\"content\",\"chunk\":\" two\"}\n\
                       data: [DONE]\n";
        let expected = collect_events(payload);
        assert_eq!(expected.len(), 3);

        for split_at in 1..payload.len() {
            let mut buf = String::new();
            let mut events = Vec::new();
            for part in [&payload[..split_at], &payload[split_at..]] {
                buf.push_str(part);
                for data in drain_data_lines(&mut buf) {
                    events.extend(parse_stream_data(&data).into_iter().map(|e| e.unwrap()));
                }
            }
            let expected_debug: Vec<String> =
                expected.iter().map(|e| format!("{e:?}")).collect();
            let events_debug: Vec<String> = events.iter().map(|e| format!("{e:?}")).collect();
            assert_eq!(events_debug, expected_debug, "split at byte {split_at}");
        }
    }
}
