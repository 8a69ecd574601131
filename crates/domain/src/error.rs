use std::fmt;

/// Shared error type used across all FlowPilot crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    /// A resolved header or body template did not parse as JSON.
    /// Raised before any request is sent.
    #[error("malformed {artifact} template: {detail}")]
    MalformedTemplate {
        artifact: TemplateArtifact,
        detail: String,
    },

    /// A non-success HTTP status from a provider endpoint.  Carries the
    /// resolved URL and the raw response body for diagnosability.
    #[error("transport {url}: HTTP {status} - {body}")]
    Transport {
        url: String,
        status: u16,
        body: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Which request artifact a template error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateArtifact {
    Headers,
    Body,
}

impl fmt::Display for TemplateArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateArtifact::Headers => write!(f, "headers"),
            TemplateArtifact::Body => write!(f, "body"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
