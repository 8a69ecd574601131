//! Shared utility functions for provider adapters.

use fp_domain::error::Error;
use fp_domain::workflow::GroundingSource;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// De-duplicate grounding sources by uri, keeping the first-seen title and
/// preserving first-seen order.
pub(crate) fn dedup_sources(sources: Vec<GroundingSource>) -> Vec<GroundingSource> {
    let mut seen = std::collections::HashSet::new();
    sources
        .into_iter()
        .filter(|s| seen.insert(s.uri.clone()))
        .collect()
}
