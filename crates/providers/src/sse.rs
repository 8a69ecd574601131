//! Shared SSE streaming infrastructure for the streaming adapters.
//!
//! Both streaming backends follow the same pattern: receive a
//! `reqwest::Response`, buffer chunks, split on line boundaries, extract
//! `data:` payloads, and feed each payload to a backend-specific parser
//! that returns `Vec<Result<E>>`.
//!
//! This module extracts that shared logic into two functions:
//! - [`drain_data_lines`] -- pull complete `data:` payloads from a buffer
//! - [`sse_event_stream`] -- build a `BoxStream` from a response + parser closure

use crate::util::from_reqwest;
use fp_domain::error::Result;
use fp_domain::stream::BoxStream;

/// Extract complete `data:` payloads from a line buffer.
///
/// The buffer is drained in-place: consumed bytes are removed and any
/// trailing partial line remains for the next call, so a line split across
/// two reads is never dropped or double-counted.  Lines without the `data:`
/// prefix (comments, blank keep-alives) are discarded.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find('\n') {
        let line: String = buffer.drain(..=pos).collect();
        let line = line.trim();
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            if !data.is_empty() {
                data_lines.push(data.to_string());
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] of parsed events from an SSE `reqwest::Response`
/// and a backend-specific parser closure.
///
/// The closure receives each `data:` payload string and returns zero or
/// more events.  It is `FnMut` so parsers may keep state across payloads.
///
/// The stream automatically:
/// 1. Buffers incoming chunks and drains complete `data:` lines
/// 2. Flushes a trailing unterminated line when the response body closes
/// 3. Surfaces transport read errors as a final `Err` item
pub(crate) fn sse_event_stream<E, F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<E>>
where
    E: Send + 'static,
    F: FnMut(&str) -> Vec<Result<E>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    for data in drain_data_lines(&mut buffer) {
                        for event in parse_data(&data) {
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    // Stream ended -- flush any unterminated final line.
                    if !buffer.trim().is_empty() {
                        buffer.push('\n');
                        for data in drain_data_lines(&mut buffer) {
                            for event in parse_data(&data) {
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_single_complete_line() {
        let mut buf = String::from("data: {\"hello\":\"world\"}\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["{\"hello\":\"world\"}"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_multiple_lines() {
        let mut buf = String::from("data: first\ndata: second\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["first", "second"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_partial_line_stays_in_buffer() {
        let mut buf = String::from("data: complete\ndata: part");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["complete"]);
        assert_eq!(buf, "data: part");
    }

    #[test]
    fn drain_empty_buffer() {
        let mut buf = String::new();
        assert!(drain_data_lines(&mut buf).is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_skips_blank_and_non_data_lines() {
        let mut buf = String::from("\n: keep-alive\nevent: ping\ndata: payload\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["payload"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_done_sentinel_preserved_as_payload() {
        let mut buf = String::from("data: [DONE]\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["[DONE]"]);
    }

    #[test]
    fn drain_handles_whitespace_after_prefix() {
        let mut buf = String::from("data:   {\"key\":\"val\"}  \n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["{\"key\":\"val\"}"]);
    }

    /// Splitting one payload across arbitrary chunk boundaries must yield
    /// the same drained lines as delivering it in one piece.
    #[test]
    fn drain_is_invariant_under_chunk_boundaries() {
        let payload = "data: {\"type\":\"content\",\"chunk\":\"Hel\"}\n\
                       data: {\"type\":\"content\",\"chunk\":\"lo\"}\n\
                       data: [DONE]\n";

        let mut whole = String::from(payload);
        let expected = drain_data_lines(&mut whole);
        assert_eq!(expected.len(), 3);

        for split_at in 1..payload.len() {
            if !payload.is_char_boundary(split_at) {
                continue;
            }
            let mut buf = String::new();
            let mut lines = Vec::new();
            buf.push_str(&payload[..split_at]);
            lines.extend(drain_data_lines(&mut buf));
            buf.push_str(&payload[split_at..]);
            lines.extend(drain_data_lines(&mut buf));
            assert_eq!(lines, expected, "split at byte {split_at}");
        }
    }

    #[test]
    fn drain_incremental_buffering() {
        let mut buf = String::from("data: chunk1");
        assert!(drain_data_lines(&mut buf).is_empty());
        assert_eq!(buf, "data: chunk1");

        buf.push_str("\ndata: chunk2\n");
        let lines = drain_data_lines(&mut buf);
        assert_eq!(lines, vec!["chunk1", "chunk2"]);
        assert!(buf.is_empty());
    }
}
