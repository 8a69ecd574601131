//! Cloud streaming adapter (Google Gemini).
//!
//! Drives the Gemini `streamGenerateContent` API with search grounding
//! enabled, forwarding text deltas as they arrive and collecting grounding
//! citations from the side channel.  Auth is via an API key passed as a
//! query parameter (`key={api_key}`).

use crate::sse::sse_event_stream;
use crate::traits::{AssistantTransport, ResponseSink, TurnReply, TurnRequest};
use crate::util::{dedup_sources, from_reqwest};
use fp_domain::error::{Error, Result};
use fp_domain::message::Sender;
use fp_domain::profile::ProviderProfile;
use fp_domain::workflow::GroundingSource;
use futures_util::StreamExt;
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
/// Process-wide fallback when the profile carries no key.
const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Sampling temperature is fixed at the adapter; the surface exposes no knob.
const SAMPLING_TEMPERATURE: f64 = 0.7;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for the Gemini streaming generation API.
#[derive(Debug)]
pub struct GeminiProvider {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

/// Events decoded from the Gemini stream: text fragments on the main
/// channel, grounding citations on the side channel.
#[derive(Debug, Clone)]
enum CloudEvent {
    Text(String),
    Source(GroundingSource),
}

impl GeminiProvider {
    /// Create the adapter from a resolved profile.
    ///
    /// The API key comes from the profile or the process-wide
    /// `GEMINI_API_KEY` fallback; a missing key fails here, before any
    /// network call.
    pub fn from_profile(profile: &ProviderProfile) -> Result<Self> {
        let api_key = profile
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
            .ok_or_else(|| {
                Error::Config(format!(
                    "profile '{}': cloud provider requires an API key \
                     (set one on the profile or via {API_KEY_ENV})",
                    profile.id
                ))
            })?;

        let base_url = profile
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: profile.id.clone(),
            base_url,
            api_key,
            model: profile
                .model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
            client,
        })
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        )
    }

    /// Build the generation request: replayed history plus the current
    /// prompt, the system instruction, the search-grounding tool, and the
    /// fixed sampling temperature.
    fn build_body(&self, req: &TurnRequest) -> Value {
        let mut contents: Vec<Value> = Vec::new();
        for msg in &req.history {
            let role = match msg.sender {
                Sender::User => "user",
                Sender::Ai => "model",
                Sender::System => continue,
            };
            contents.push(serde_json::json!({
                "role": role,
                "parts": [{"text": msg.text}],
            }));
        }
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{"text": req.prompt}],
        }));

        let mut body = serde_json::json!({
            "contents": contents,
            "tools": [{"google_search": {}}],
            "generationConfig": {"temperature": SAMPLING_TEMPERATURE},
        });

        if let Some(system) = req.system_instruction.as_deref().filter(|s| !s.is_empty()) {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{"text": system}]
            });
        }

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse a single Gemini streaming SSE data payload into text fragments
/// and grounding citations.
fn parse_stream_data(data: &str) -> Vec<Result<CloudEvent>> {
    let mut events = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    let candidate = match v
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
    {
        Some(c) => c,
        None => return events,
    };

    if let Some(parts) = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                if !text.is_empty() {
                    events.push(Ok(CloudEvent::Text(text.to_string())));
                }
            }
        }
    }

    // Grounding citations ride on a side channel of the same chunk; only
    // entries carrying both uri and title are kept.
    if let Some(chunks) = candidate
        .get("groundingMetadata")
        .and_then(|g| g.get("groundingChunks"))
        .and_then(|c| c.as_array())
    {
        for chunk in chunks {
            let web = match chunk.get("web") {
                Some(w) => w,
                None => continue,
            };
            let uri = web.get("uri").and_then(|v| v.as_str());
            let title = web.get("title").and_then(|v| v.as_str());
            if let (Some(uri), Some(title)) = (uri, title) {
                events.push(Ok(CloudEvent::Source(GroundingSource {
                    uri: uri.to_string(),
                    title: title.to_string(),
                })));
            }
        }
    }

    events
}

/// Redact the API key from a URL for safe logging.
fn redact_url_key(url: &str) -> String {
    if let Some(idx) = url.find("key=") {
        let prefix = &url[..idx + 4];
        let rest = &url[idx + 4..];
        let end = rest.find('&').unwrap_or(rest.len());
        format!("{prefix}[REDACTED]{}", &rest[end..])
    } else {
        url.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl AssistantTransport for GeminiProvider {
    async fn call(&self, req: &TurnRequest, sink: &mut ResponseSink<'_>) -> Result<TurnReply> {
        let url = self.stream_url();
        let body = self.build_body(req);

        tracing::debug!(provider = %self.id, url = %redact_url_key(&url), "gemini stream request");

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
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Transport {
                url: redact_url_key(&url),
                status: status.as_u16(),
                body: err_text,
            });
        }

        let mut stream = sse_event_stream(resp, parse_stream_data);
        let mut text = String::new();
        let mut sources: Vec<GroundingSource> = Vec::new();

        while let Some(event) = stream.next().await {
            match event? {
                CloudEvent::Text(fragment) => {
                    text.push_str(&fragment);
                    sink.delta(&fragment);
                }
                CloudEvent::Source(source) => sources.push(source),
            }
        }

        Ok(TurnReply {
            text,
            sources: dedup_sources(sources),
        })
    }

    fn transport_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
