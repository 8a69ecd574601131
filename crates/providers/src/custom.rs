//! Custom-API adapter.
//!
//! Works with any OpenAI-style HTTP endpoint: the profile's request
//! template shapes the endpoint path, headers, and body, so the same
//! adapter covers OpenAI, Azure, Ollama, and vendor-specific clones
//! without per-vendor code.
//!
//! There is no true incremental streaming on this transport; when a delta
//! callback is supplied it is invoked exactly once with the entire reply,
//! preserving the uniform streaming contract for callers.

use crate::template;
use crate::traits::{AssistantTransport, ResponseSink, TurnReply, TurnRequest};
use crate::util::from_reqwest;
use fp_domain::error::{Error, Result, TemplateArtifact};
use fp_domain::profile::{ProviderProfile, RequestTemplate};
use serde_json::{Map, Value};

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECS: u64 = 2;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for template-driven custom HTTP APIs.
#[derive(Debug)]
pub struct CustomApiProvider {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    template: RequestTemplate,
    client: reqwest::Client,
}

impl CustomApiProvider {
    /// Create the adapter from a resolved profile.
    ///
    /// Fails with a configuration error when the base address or request
    /// template is missing, before any network activity.
    pub fn from_profile(profile: &ProviderProfile) -> Result<Self> {
        let base_url = profile
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "profile '{}': custom provider requires a base address",
                    profile.id
                ))
            })?
            .trim_end_matches('/')
            .to_string();

        let template = profile.request_template.clone().ok_or_else(|| {
            Error::Config(format!(
                "profile '{}': custom provider requires a request template",
                profile.id
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: profile.id.clone(),
            base_url,
            api_key: profile.api_key.clone().unwrap_or_default(),
            model: profile.model.clone().unwrap_or_default(),
            template,
            client,
        })
    }

    // ── Internal: request assembly ─────────────────────────────────

    /// Resolve the full request URL: an endpoint that already carries a
    /// scheme is used verbatim, otherwise it is joined onto the base
    /// address with exactly one slash between them.
    fn resolve_url(&self) -> String {
        let endpoint = self.template.endpoint.trim();
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Build the per-request template variables.
    ///
    /// `apiKey` is always a string (empty when unset), and `messages` is a
    /// composite `{role, content}` list: system instruction first, then
    /// the user prompt.
    fn template_vars(&self, req: &TurnRequest) -> Map<String, Value> {
        let mut messages = Vec::new();
        if let Some(system) = req.system_instruction.as_deref().filter(|s| !s.is_empty()) {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": req.prompt}));

        let mut vars = Map::new();
        vars.insert("model".into(), Value::String(self.model.clone()));
        vars.insert("apiKey".into(), Value::String(self.api_key.clone()));
        vars.insert("messages".into(), Value::Array(messages));
        // Scalar conveniences for templates that skip the messages shape.
        vars.insert("prompt".into(), Value::String(req.prompt.clone()));
        vars.insert(
            "system".into(),
            Value::String(req.system_instruction.clone().unwrap_or_default()),
        );
        vars.insert("user_prompt".into(), Value::String(req.prompt.clone()));
        vars
    }

    /// Resolve the header and body templates.  Each must independently
    /// parse as JSON; a failure names the offending artifact and nothing
    /// is sent.
    fn build_request(&self, req: &TurnRequest) -> Result<(Value, Value)> {
        let vars = self.template_vars(req);

        let headers_str = template::resolve(&self.template.headers, &vars);
        let headers: Value = serde_json::from_str(&headers_str).map_err(|e| {
            Error::MalformedTemplate {
                artifact: TemplateArtifact::Headers,
                detail: format!("{e}: {headers_str}"),
            }
        })?;

        let body_str = template::resolve(&self.template.body, &vars);
        let body: Value = serde_json::from_str(&body_str).map_err(|e| {
            Error::MalformedTemplate {
                artifact: TemplateArtifact::Body,
                detail: format!("{e}: {body_str}"),
            }
        })?;

        Ok((headers, body))
    }

    // ── Internal: one HTTP attempt ─────────────────────────────────

    async fn send_once(&self, url: &str, headers: &Value, body: &Value) -> Result<String> {
        let mut request = self.client.post(url);
        if let Some(map) = headers.as_object() {
            for (name, value) in map {
                if let Some(v) = value.as_str() {
                    request = request.header(name.as_str(), v);
                }
            }
        }

        let resp = request.json(body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Transport {
                url: url.to_string(),
                status: status.as_u16(),
                body: resp_text,
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        Ok(extract_reply_text(&resp_json))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response shape fallbacks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pull the reply text out of whatever shape the endpoint returned.
///
/// Priority: chat-completion style (`choices[0].message.content`, then
/// `choices[0].text`), then a flat `content` field, then a flat `response`
/// field.  When nothing matches, the full serialized body is returned so
/// the caller never sees a silently empty reply.
fn extract_reply_text(body: &Value) -> String {
    if let Some(choice) = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
    {
        if let Some(text) = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
        {
            return text.to_string();
        }
        if let Some(text) = choice.get("text").and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }

    if let Some(text) = body.get("content").and_then(|v| v.as_str()) {
        return text.to_string();
    }
    if let Some(text) = body.get("response").and_then(|v| v.as_str()) {
        return text.to_string();
    }

    body.to_string()
}

/// Transient failures worth another attempt: connection-level errors,
/// timeouts, and 5xx statuses.  4xx means the request itself is wrong.
fn is_retriable(err: &Error) -> bool {
    match err {
        Error::Http(_) | Error::Timeout(_) => true,
        Error::Transport { status, .. } => *status >= 500,
        _ => false,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl AssistantTransport for CustomApiProvider {
    async fn call(&self, req: &TurnRequest, sink: &mut ResponseSink<'_>) -> Result<TurnReply> {
        let url = self.resolve_url();
        let (headers, body) = self.build_request(req)?;

        tracing::debug!(provider = %self.id, url = %url, "custom api request");

        let mut delay = std::time::Duration::from_secs(RETRY_DELAY_SECS);
        let mut attempt = 0;
        let text = loop {
            attempt += 1;
            match self.send_once(&url, &headers, &body).await {
                Ok(text) => break text,
                Err(e) if attempt < MAX_RETRIES && is_retriable(&e) => {
                    tracing::warn!(
                        provider = %self.id,
                        attempt,
                        error = %e,
                        "custom api request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        };

        sink.delta(&text);
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
