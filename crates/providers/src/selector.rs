//! Provider selection.
//!
//! Chooses exactly one transport adapter per call from the profile's
//! variant and runs it behind the uniform call contract, with a timeout
//! wrapper around the whole call.  Adapters are constructed per call:
//! there is no cross-call cache or connection pool.

use crate::custom::CustomApiProvider;
use crate::gemini::GeminiProvider;
use crate::orchestrator::OrchestratorProvider;
use crate::traits::{AssistantTransport, ResponseSink, TurnReply, TurnRequest};
use fp_domain::error::{Error, Result};
use fp_domain::profile::{ProviderKind, ProviderProfile};
use std::time::Duration;

/// Whole-call ceiling.  Generous because the orchestration variant streams
/// phase updates from a multi-minute agent run.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Dispatches each turn to the adapter matching the profile's variant.
pub struct ProviderSelector {
    call_timeout: Duration,
}

impl Default for ProviderSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderSelector {
    pub fn new() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Validate the profile and construct the adapter for its variant.
    ///
    /// Configuration errors (missing address, key, or template) surface
    /// here, before any network activity.
    pub fn transport_for(profile: &ProviderProfile) -> Result<Box<dyn AssistantTransport>> {
        profile.validate()?;
        match profile.kind {
            ProviderKind::Cloud => {
                GeminiProvider::from_profile(profile).map(|p| Box::new(p) as _)
            }
            ProviderKind::Custom => {
                CustomApiProvider::from_profile(profile).map(|p| Box::new(p) as _)
            }
            ProviderKind::Orchestration => {
                OrchestratorProvider::from_profile(profile).map(|p| Box::new(p) as _)
            }
        }
    }

    /// Run one turn through the adapter matching the profile.
    pub async fn call(
        &self,
        profile: &ProviderProfile,
        req: &TurnRequest,
        sink: &mut ResponseSink<'_>,
    ) -> Result<TurnReply> {
        let transport = Self::transport_for(profile)?;
        match tokio::time::timeout(self.call_timeout, transport.call(req, sink)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "provider '{}' did not complete within {:?}",
                profile.id, self.call_timeout
            ))),
        }
    }
}
