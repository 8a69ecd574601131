//! Provider profiles.
//!
//! A profile is one resolved backend configuration handed to the core by the
//! host's configuration store: which transport to use, credentials, model,
//! and, for the custom variant, the request template that shapes the
//! outbound HTTP call.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub kind: ProviderKind,
    pub name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Required for (and only allowed on) the custom variant.
    #[serde(default)]
    pub request_template: Option<RequestTemplate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Cloud streaming API with search grounding.
    Cloud,
    /// Arbitrary OpenAI-style HTTP endpoint shaped by a request template.
    Custom,
    /// Remote orchestration server speaking the SSE event protocol.
    Orchestration,
}

/// Templates for the custom variant's endpoint, headers, and body.
///
/// The header and body strings carry `$name` placeholders resolved against
/// per-request variables; after substitution each must parse as valid JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTemplate {
    #[serde(default = "d_endpoint")]
    pub endpoint: String,
    #[serde(default = "d_headers")]
    pub headers: String,
    #[serde(default = "d_body")]
    pub body: String,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            endpoint: d_endpoint(),
            headers: d_headers(),
            body: d_body(),
        }
    }
}

impl ProviderProfile {
    /// Check the profile's structural invariant: a request template is
    /// present if and only if the profile is the custom variant.
    pub fn validate(&self) -> Result<()> {
        match (self.kind, &self.request_template) {
            (ProviderKind::Custom, None) => Err(Error::Config(format!(
                "profile '{}': custom provider requires a request template",
                self.id
            ))),
            (ProviderKind::Custom, Some(_)) => Ok(()),
            (_, Some(_)) => Err(Error::Config(format!(
                "profile '{}': request template is only allowed for custom providers",
                self.id
            ))),
            (_, None) => Ok(()),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_endpoint() -> String {
    "/chat/completions".into()
}
fn d_headers() -> String {
    r#"{"Content-Type": "application/json", "Authorization": "Bearer $apiKey"}"#.into()
}
fn d_body() -> String {
    r#"{"model": "$model", "messages": $messages, "temperature": 0.5}"#.into()
}
